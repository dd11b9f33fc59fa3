//! Ticketry CLI - operator tools for trace context and audit state.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Trace(args) => commands::trace::run(&args),
        Commands::Diff(args) => commands::diff::run(&args),
        Commands::Sanitize(args) => commands::sanitize::run(&args),
        Commands::Version => {
            println!("ticketry {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
