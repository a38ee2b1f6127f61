//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_core::config::RelayConfig;
use std::path::PathBuf;

pub mod customer;
pub mod emit;
pub mod listen;
pub mod serve;

/// Default location of the locally persisted customer identifier.
pub const DEFAULT_CUSTOMER_STORE: &str = ".order-relay/customer-id";

/// Order Relay - real-time order status notifications
#[derive(Parser)]
#[command(name = "order-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "ORDER_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the broadcast hub
    Serve(serve::ServeArgs),

    /// Subscribe as a customer and print order notifications
    Listen(listen::ListenArgs),

    /// Send an order event to the hub as the order service would
    Emit(emit::EmitArgs),

    /// Show or change the local customer identifier
    CustomerId(customer::CustomerIdArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = RelayConfig::load(self.config.as_deref()).context("Failed to load configuration")?;

        match self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Listen(args) => listen::execute(args, config).await,
            Commands::Emit(args) => emit::execute(args, config).await,
            Commands::CustomerId(args) => customer::execute(args),
        }
    }
}
