//! Meteonet Station binary
//!
//! `meteo-station <serverId> <controlPort> [<variableName> <unit>]...`

use anyhow::{Context, Result};
use meteo_station::config::USAGE;
use meteo_station::StationConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meteo_station=info")))
        .init();

    let config = match StationConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };
    if config.variables.len() < 3 {
        warn!("station {} manages only {} variable(s)", config.server_id, config.variables.len());
    }

    info!("🌦️ Meteonet station {} starting...", config.server_id);

    let mut station = meteo_station::start(config)
        .await
        .context("Failed to start station")?;

    tokio::select! {
        _ = station.wait() => info!("station {} stopped", station.server_id()),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("interrupted, shutting down");
            station.abort();
        }
    }

    Ok(())
}
