//! Clusterix CLI - Monitor the spots of a DX cluster node.

use anyhow::{Result, anyhow};
use clap::Parser;
use clusterix::{
    Client, Config, ConnectionListener, Observer, SpotListener, SpotRecord, SpotStats,
    config::parse_host_port, metrics::start_metrics_server,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Clusterix - Connect to a DX cluster node and print incoming spots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster node as host[:port]
    #[arg(long, env = "CLUSTERIX_HOST")]
    host: Option<String>,

    /// Username for login, usually your callsign
    #[arg(short, long, env = "CLUSTERIX_USERNAME")]
    username: Option<String>,

    /// Password for nodes that ask for one
    #[arg(short, long, env = "CLUSTERIX_PASSWORD")]
    password: Option<String>,

    /// Reconnect whenever the connection is lost
    #[arg(long)]
    reconnect: bool,

    /// Seconds between reconnection attempts
    #[arg(long)]
    retry_interval: Option<u64>,

    /// Trace the communication with the node
    #[arg(long)]
    trace: bool,

    /// Print spots as JSON lines
    #[arg(long)]
    json: bool,

    /// Print statistics every N seconds (0 = never)
    #[arg(short, long)]
    stats_interval: Option<u64>,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Prints every spot to stdout.
struct SpotPrinter {
    json: bool,
}

impl SpotListener for SpotPrinter {
    fn on_spot(&self, spot: &SpotRecord) {
        if self.json {
            match spot_json(spot) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Cannot serialize spot: {}", e),
            }
        } else {
            println!("{}", spot);
        }
    }
}

/// JSON line for a spot, with the center of its locator when known.
fn spot_json(spot: &SpotRecord) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(spot)?;
    if let (Some(locator), Some(fields)) = (spot.locator.as_ref(), value.as_object_mut()) {
        let (latitude, longitude) = locator.center();
        fields.insert("latitude".to_string(), latitude.into());
        fields.insert("longitude".to_string(), longitude.into());
    }
    serde_json::to_string(&value)
}

impl ConnectionListener for SpotPrinter {
    fn on_connection_state(&self, connected: bool) {
        if connected {
            info!("Connected to cluster");
        } else {
            warn!("Disconnected from cluster");
        }
    }
}

impl Observer for SpotPrinter {
    fn as_spot_listener(&self) -> Option<&dyn SpotListener> {
        Some(self)
    }

    fn as_connection_listener(&self) -> Option<&dyn ConnectionListener> {
        Some(self)
    }
}

/// Merge command line arguments over the config file.
fn apply_args(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(ref host) = args.host {
        let (host, port) = parse_host_port(host).map_err(|e| anyhow!(e))?;
        config.host = host;
        config.port = port;
    }
    if let Some(ref username) = args.username {
        config.username = username.clone();
    }
    if let Some(ref password) = args.password {
        config.password = password.clone();
    }
    if let Some(retry_interval) = args.retry_interval {
        config.retry_interval = retry_interval;
    }
    if let Some(stats_interval) = args.stats_interval {
        config.stats_interval = stats_interval;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_enabled = true;
        config.metrics_port = port;
    }
    config.reconnect |= args.reconnect;
    config.trace |= args.trace;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    apply_args(&mut config, &args)?;

    info!("Clusterix starting...");

    let stats = Arc::new(SpotStats::new());

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
        let _ = shutdown_tx_clone.send(true);
    });

    if config.metrics_enabled {
        let stats_clone = Arc::clone(&stats);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port, stats_clone).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    if config.stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        let stats_interval = Duration::from_secs(config.stats_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(stats_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                eprintln!("\n{}", stats_clone.summary());
            }
        });
    }

    let client = Client::new(config.client_config());
    info!("Server: {}", client.config().address());
    client.register(stats.clone());
    client.register(Arc::new(SpotPrinter { json: args.json }));

    if config.reconnect {
        client.keep_connected();
    } else {
        client.connect().await?;
        // Single-shot mode ends with the connection.
        let shutdown_tx_clone = shutdown_tx.clone();
        client.when_disconnected(move || {
            let _ = shutdown_tx_clone.send(true);
        });
    }

    let _ = shutdown_rx.wait_for(|shutdown| *shutdown).await;
    client.disconnect();
    client.disconnected().await;

    if config.stats_interval > 0 {
        eprintln!("\n\nFINAL STATISTICS");
        eprintln!("{}", stats.summary());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("clusterix").chain(extra.iter().copied()))
    }

    #[test]
    fn test_args_override_config() {
        let mut config = Config::default();
        apply_args(
            &mut config,
            &args(&[
                "--host",
                "dxc.example.net:7300",
                "--username",
                "DL1ABC",
                "--reconnect",
                "--metrics-port",
                "9100",
            ]),
        )
        .unwrap();

        assert_eq!(config.host, "dxc.example.net");
        assert_eq!(config.port, 7300);
        assert_eq!(config.username, "DL1ABC");
        assert!(config.reconnect);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_port, 9100);
    }

    #[test]
    fn test_config_kept_without_args() {
        let mut config = Config {
            host: "dxc.example.net".to_string(),
            reconnect: true,
            ..Default::default()
        };
        apply_args(&mut config, &args(&[])).unwrap();

        assert_eq!(config.host, "dxc.example.net");
        assert!(config.reconnect);
    }

    #[test]
    fn test_invalid_host_arg() {
        let mut config = Config::default();
        assert!(apply_args(&mut config, &args(&["--host", "x:99999"])).is_err());
    }

    #[test]
    fn test_spot_json_adds_locator_center() {
        let spots = clusterix::parser::extract_spots(
            "dx de rx7k:  7154.0  rk7r  cq  1650z kn75\r\ndx de a1bc:  7000.0  dl1abc  cq  1650z",
        )
        .unwrap();

        let with_locator: serde_json::Value =
            serde_json::from_str(&spot_json(&spots[0]).unwrap()).unwrap();
        assert_eq!(with_locator["frequency_hz"], 7_154_000);
        assert_eq!(with_locator["latitude"], 45.5);
        assert_eq!(with_locator["longitude"], 35.0);

        let without: serde_json::Value =
            serde_json::from_str(&spot_json(&spots[1]).unwrap()).unwrap();
        assert!(without.get("latitude").is_none());
    }
}
