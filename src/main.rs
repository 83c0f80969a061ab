mod cli;
mod config;
mod error;
mod logging;
mod model;
mod providers;
mod sync;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose)?;

    // Ctrl-C stops the run before its next remote change
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            on_signal.cancel();
        }
    });

    cli::run(cli, cancel).await
}
