//! Customer subscription command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use relay_client::{
    mount, scoped_url, sink_fn, CustomerStore, EventFilter, FileStore, ListenerHandle, MemoryStore,
};
use relay_core::config::{to_ws_url, RelayConfig};
use std::path::PathBuf;

use super::DEFAULT_CUSTOMER_STORE;
use crate::output;

#[derive(Args)]
pub struct ListenArgs {
    /// Hub address (overrides ORDER_RELAY_SOCKET_URL / ORDER_RELAY_API_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Customer identifier to listen as (defaults to the stored one)
    #[arg(long)]
    pub customer_id: Option<String>,

    /// File holding the persisted customer identifier
    #[arg(long, default_value = DEFAULT_CUSTOMER_STORE)]
    pub store: PathBuf,

    /// Ask the hub to send only this customer's events
    #[arg(long)]
    pub scoped: bool,
}

pub async fn execute(args: ListenArgs, config: RelayConfig) -> Result<()> {
    let base_url = match &args.url {
        Some(url) => to_ws_url(url),
        None => config.client.hub_ws_url(),
    };

    let (customer_id, url, mut handle) = match &args.customer_id {
        Some(id) => {
            let url = listen_url(&base_url, id, args.scoped);
            let handle = mount_with(&url, MemoryStore::new(id.clone())).await?;
            (id.clone(), url, handle)
        }
        None => {
            let store = FileStore::new(&args.store);
            let id = store
                .ensure_identifier()
                .with_context(|| format!("Failed to read {}", args.store.display()))?;
            let url = listen_url(&base_url, &id, args.scoped);
            let handle = mount_with(&url, store).await?;
            (id, url, handle)
        }
    };

    println!();
    println!("  {} {}", "Listening".cyan().bold(), url);
    println!("  {}  {}", "Customer".green(), customer_id);
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = handle.closed() => false,
    };

    if interrupted {
        handle.unmount().await;
    } else {
        println!("{}", "Hub closed the connection".yellow());
    }

    Ok(())
}

fn listen_url(base_url: &str, customer_id: &str, scoped: bool) -> String {
    if scoped {
        scoped_url(base_url, customer_id)
    } else {
        base_url.to_string()
    }
}

async fn mount_with<S>(url: &str, store: S) -> Result<ListenerHandle>
where
    S: CustomerStore + 'static,
{
    mount(url, EventFilter::new(store), sink_fn(output::print_notification))
        .await
        .with_context(|| format!("Failed to connect to hub at {}", url))
}
