//! Temper - self-cleaning temporary storage agent.

use clap::Parser;
use temper_cli::Cli;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    temper_cli::init_tracing();

    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = cli.root_dir()?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, stopping temper");
            shutdown.cancel();
        }
    });

    temper_cli::run_agent(&root, token).await
}
