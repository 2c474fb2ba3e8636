//! Prometheus metrics HTTP server.
//!
//! Exposes cluster client statistics in Prometheus text format.

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::stats::SpotStats;

/// Start the Prometheus metrics HTTP server.
///
/// Serves metrics at `/metrics` and a health check at `/health`.
/// Returns an error if the server fails to bind to the port.
pub async fn start_metrics_server(port: u16, stats: Arc<SpotStats>) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(stats);

    let listener = TcpListener::bind(addr).await?;
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler(State(stats): State<Arc<SpotStats>>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

fn metric_header(out: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Format statistics as Prometheus text format.
fn format_prometheus_metrics(stats: &SpotStats) -> String {
    let summary = stats.summary();
    let mut out = String::with_capacity(2048);

    metric_header(
        &mut out,
        "clusterix_uptime_seconds",
        "gauge",
        "Time since the client started",
    );
    let _ = writeln!(out, "clusterix_uptime_seconds {:.3}", summary.elapsed_secs);

    metric_header(
        &mut out,
        "clusterix_connected",
        "gauge",
        "Whether the cluster connection is up",
    );
    let _ = writeln!(out, "clusterix_connected {}", u8::from(summary.connected));

    metric_header(
        &mut out,
        "clusterix_connections_total",
        "counter",
        "Connections established",
    );
    let _ = writeln!(out, "clusterix_connections_total {}", summary.connections);

    metric_header(
        &mut out,
        "clusterix_disconnections_total",
        "counter",
        "Connections lost or closed",
    );
    let _ = writeln!(
        out,
        "clusterix_disconnections_total {}",
        summary.disconnections
    );

    metric_header(
        &mut out,
        "clusterix_spots_total",
        "counter",
        "Spots received",
    );
    let _ = writeln!(out, "clusterix_spots_total {}", summary.total_spots);

    metric_header(
        &mut out,
        "clusterix_spots_by_band_total",
        "counter",
        "Spots broken down by amateur band",
    );
    for (band, count) in &summary.spots_by_band {
        let _ = writeln!(
            out,
            "clusterix_spots_by_band_total{{band=\"{}\"}} {}",
            band, count
        );
    }

    if let Some(ref age) = summary.age_percentiles {
        metric_header(
            &mut out,
            "clusterix_spot_age_seconds",
            "summary",
            "Delay between spot time and receipt",
        );
        let _ = writeln!(
            out,
            "clusterix_spot_age_seconds{{quantile=\"0.5\"}} {}",
            age.p50
        );
        let _ = writeln!(
            out,
            "clusterix_spot_age_seconds{{quantile=\"0.9\"}} {}",
            age.p90
        );
        let _ = writeln!(
            out,
            "clusterix_spot_age_seconds{{quantile=\"0.99\"}} {}",
            age.p99
        );
        let _ = writeln!(
            out,
            "clusterix_spot_age_seconds_count {}",
            summary.total_spots
        );
    }

    out
}
