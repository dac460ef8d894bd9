//! lifeline - Session lifecycle CLI
//!
//! Starts, inspects and archives per-user sessions kept in a local data
//! directory.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("lifeline=info".parse()?)
                .add_directive("lifeline_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Status { json } => commands::status::execute(json, &config).await,
        Commands::Session(cmd) => commands::session::execute(cmd, &config).await,
        Commands::Metrics { user_id, json } => {
            commands::metrics::execute(&user_id, json, &config).await
        }
        Commands::Export { user_id, output } => {
            commands::export::execute(&user_id, output.as_deref(), &config).await
        }
        Commands::Forget { user_id } => commands::forget::execute(&user_id, &config).await,
        Commands::Sweep => commands::sweep::execute(&config).await,
        Commands::Version => {
            println!("lifeline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
