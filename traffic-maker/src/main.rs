mod args;
mod generator;
mod stream;

use args::CliArgs;
use clap::Parser;
use stream::run_traffic;
use tokio::{signal, task};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    info!(
        streams = args.streams(),
        rate = args.rate(),
        host = %args.target(),
        "Starting traffic streams"
    );

    let client = reqwest::Client::new();
    for stream_id in 0..*args.streams() {
        let client = client.clone();
        let target = args.target().clone();
        let (rate, batch_size) = (*args.rate(), *args.batch_size());
        task::spawn(async move {
            if let Err(e) = run_traffic(client, target, rate, batch_size, None).await {
                error!(stream_id, error = %e, "Traffic stream stopped");
            }
        });
    }

    // Wait for CTRL+C
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Stopping traffic generation");
}
