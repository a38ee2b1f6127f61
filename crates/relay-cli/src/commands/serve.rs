//! Hub server command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use relay_core::config::RelayConfig;
use relay_hub::Hub;
use relay_redis::RedisBridge;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Allowed CORS origin
    #[arg(long)]
    pub origin: Option<String>,

    /// Redis URL for fan-out across hub instances
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (defaults to .order-relay/serve.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(origin) = &self.origin {
            config.cors.origin = origin.clone();
        }
        if let Some(url) = &self.redis_url {
            config.redis.url = Some(url.clone());
        }
    }
}

pub async fn execute(args: ServeArgs, mut config: RelayConfig) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let mut hub = Hub::new(config.server.channel_capacity);
    let shutdown = CancellationToken::new();

    let bridge_task = match &config.redis.url {
        Some(url) => {
            let bridge = RedisBridge::connect(url, &config.redis.channel)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", url))?;
            let (egress_tx, egress_rx) = mpsc::unbounded_channel();
            hub = hub.with_egress(egress_tx);

            let bridge_hub = hub.clone();
            let token = shutdown.clone();
            Some(tokio::spawn(bridge.run(bridge_hub, egress_rx, token)))
        }
        None => None,
    };

    print_banner(&config);

    let result = relay_hub::run_server(hub, &config.server, &config.cors).await;

    shutdown.cancel();
    if let Some(task) = bridge_task {
        let _ = task.await;
    }

    result
}

fn print_banner(config: &RelayConfig) {
    let host = &config.server.host;
    let port = config.server.port;

    println!();
    println!("  {} {}", "Order Relay".cyan().bold(), "Hub".bold());
    println!();
    println!("  {}  ws://{}:{}/ws", "WebSocket".green(), host, port);
    println!("  {}       http://{}:{}/internal/emit", "Emit".green(), host, port);
    println!("  {}     http://{}:{}/health", "Health".green(), host, port);
    println!("  {}     {}", "Origin".green(), config.cors.origin);
    if let Some(url) = &config.redis.url {
        println!("  {}      {} ({})", "Redis".green(), url, config.redis.channel);
    }
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = ServeArgs {
            port: Some(9000),
            host: None,
            origin: Some("https://shop.example".into()),
            redis_url: None,
            log: false,
            log_file: None,
        };
        let mut config = RelayConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.cors.origin, "https://shop.example");
        assert!(config.redis.url.is_none());
    }
}
