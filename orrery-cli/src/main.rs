//! Orrery CLI - Command-line interface
//!
//! Starts the streaming server or runs a simulation headless.

mod commands;

use clap::Parser;
use orrery_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "orrery")]
#[command(about = "Streams an N-body gravity simulation to browser clients")]
struct Cli {
    /// Console log level (RUST_LOG overrides it)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;

    commands::handle_command(cli.command).await
}
