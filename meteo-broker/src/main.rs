/**
 * METEONET BROKER - binary entry point
 *
 * ROLE : loads broker.yaml, starts the broadcast listener and hands stdin
 * to the operator console. EXIT stops the listener cleanly.
 */

use anyhow::{Context, Result};
use meteo_broker::config::load_config;
use meteo_broker::console::{self, ConsoleExit};
use meteo_broker::Broker;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meteo_broker=info")))
        .init();

    let config = load_config().await;
    let port = config.broadcast_port;
    let mut broker = Broker::start(config)
        .await
        .with_context(|| format!("Failed to bind broadcast port {port}"))?;

    let stdin = BufReader::new(tokio::io::stdin());
    let exit = console::run(&broker, stdin, tokio::io::stdout())
        .await
        .context("Console failed")?;

    if exit == ConsoleExit::Closed {
        info!("console input closed, running until interrupted");
        tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    }

    broker.shutdown();
    broker.join().await;
    info!("broker stopped");
    Ok(())
}
