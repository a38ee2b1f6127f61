//! Local customer identifier command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use relay_client::FileStore;
use std::path::PathBuf;

use super::DEFAULT_CUSTOMER_STORE;

#[derive(Args)]
pub struct CustomerIdArgs {
    /// File holding the persisted customer identifier
    #[arg(long, default_value = DEFAULT_CUSTOMER_STORE)]
    pub store: PathBuf,

    /// Replace the stored identifier
    #[arg(long)]
    pub set: Option<String>,
}

pub fn execute(args: CustomerIdArgs) -> Result<()> {
    let store = FileStore::new(&args.store);

    let id = match args.set {
        Some(id) => {
            store
                .store(&id)
                .with_context(|| format!("Failed to write {}", args.store.display()))?;
            id
        }
        None => store
            .ensure_identifier()
            .with_context(|| format!("Failed to read {}", args.store.display()))?,
    };

    println!("{} {}", "Customer".green(), id);
    println!("{}", args.store.display().to_string().dimmed());
    Ok(())
}
