//! Statistics tracking for cluster spots.
//!
//! [`SpotStats`] is an observer: register it with a client and it counts
//! connections, spots per band and per spotter, and keeps a histogram of spot
//! age (how long after the reported time a spot reached us).

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::dispatch::{ConnectionListener, Observer, SpotListener};
use crate::spot::SpotRecord;

/// Upper bound of the spot age histogram, one day in seconds.
const MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Thread-safe statistics collector for cluster spots.
#[derive(Debug)]
pub struct SpotStats {
    /// Total number of spots received
    pub total_spots: AtomicU64,

    /// Number of successful connections
    pub connections: AtomicU64,

    /// Number of lost or closed connections
    pub disconnections: AtomicU64,

    /// Whether the client is currently connected
    connected: AtomicBool,

    /// Histogram of spot age in seconds
    age_histogram: RwLock<Histogram<u64>>,

    /// Spots per band
    spots_by_band: RwLock<HashMap<String, u64>>,

    /// Top spotters
    top_spotters: RwLock<HashMap<String, u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl SpotStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            total_spots: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            // Age histogram: 1 second to 1 day, 3 significant figures
            age_histogram: RwLock::new(
                Histogram::new_with_bounds(1, MAX_AGE_SECS, 3)
                    .expect("Failed to create age histogram"),
            ),
            spots_by_band: RwLock::new(HashMap::new()),
            top_spotters: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a spot received at `now`.
    pub fn record_spot(&self, spot: &SpotRecord, now: DateTime<Utc>) {
        self.total_spots.fetch_add(1, Ordering::Relaxed);

        // Spots stamped shortly before midnight arrive dated on the next day.
        let age = (now - spot.time).num_seconds();
        if (0..MAX_AGE_SECS as i64).contains(&age)
            && let Ok(mut hist) = self.age_histogram.write()
        {
            let _ = hist.record((age as u64).max(1));
        }

        if let Some(band) = spot.band()
            && let Ok(mut map) = self.spots_by_band.write()
        {
            *map.entry(band.to_string()).or_insert(0) += 1;
        }

        if let Ok(mut map) = self.top_spotters.write() {
            *map.entry(spot.spotter.clone()).or_insert(0) += 1;
        }
    }

    /// Record a connection state change.
    pub fn record_connection_state(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        if connected {
            self.connections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.disconnections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the current spots per second rate.
    pub fn spots_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_spots.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let age_percentiles = self
            .age_histogram
            .read()
            .ok()
            .filter(|h| h.len() > 0)
            .map(|h| HistogramPercentiles {
                p50: h.value_at_quantile(0.50),
                p90: h.value_at_quantile(0.90),
                p99: h.value_at_quantile(0.99),
                min: h.min(),
                max: h.max(),
                mean: h.mean(),
            });

        let spots_by_band = self
            .spots_by_band
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        // Get top 10 spotters
        let top_spotters = self
            .top_spotters
            .read()
            .map(|m| {
                let mut vec: Vec<_> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
                vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                vec.truncate(10);
                vec
            })
            .unwrap_or_default();

        StatsSummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            connected: self.connected.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            disconnections: self.disconnections.load(Ordering::Relaxed),
            total_spots: self.total_spots.load(Ordering::Relaxed),
            spots_per_second: self.spots_per_second(),
            age_percentiles,
            spots_by_band,
            top_spotters,
        }
    }
}

impl Default for SpotStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionListener for SpotStats {
    fn on_connection_state(&self, connected: bool) {
        self.record_connection_state(connected);
    }
}

impl SpotListener for SpotStats {
    fn on_spot(&self, spot: &SpotRecord) {
        self.record_spot(spot, Utc::now());
    }
}

impl Observer for SpotStats {
    fn as_connection_listener(&self) -> Option<&dyn ConnectionListener> {
        Some(self)
    }

    fn as_spot_listener(&self) -> Option<&dyn SpotListener> {
        Some(self)
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub connected: bool,
    pub connections: u64,
    pub disconnections: u64,
    pub total_spots: u64,
    pub spots_per_second: f64,
    pub age_percentiles: Option<HistogramPercentiles>,
    pub spots_by_band: HashMap<String, u64>,
    pub top_spotters: Vec<(String, u64)>,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                 CLUSTER SPOT STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(
            f,
            "Connected: {} ({} connects, {} disconnects)",
            if self.connected { "yes" } else { "no" },
            self.connections,
            self.disconnections
        )?;
        writeln!(f, "Total spots: {}", self.total_spots)?;
        writeln!(f, "Rate: {:.2} spots/sec", self.spots_per_second)?;
        writeln!(f)?;

        if let Some(ref p) = self.age_percentiles {
            writeln!(f, "Spot Age (seconds):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        if !self.spots_by_band.is_empty() {
            writeln!(f, "Spots by Band:")?;
            let mut bands: Vec<_> = self.spots_by_band.iter().collect();
            bands.sort_by(|a, b| b.1.cmp(a.1));
            for (band, count) in bands {
                writeln!(f, "  {}: {}", band, count)?;
            }
            writeln!(f)?;
        }

        if !self.top_spotters.is_empty() {
            writeln!(f, "Top 10 Spotters:")?;
            for (i, (spotter, count)) in self.top_spotters.iter().enumerate() {
                writeln!(f, "  {}. {}: {}", i + 1, spotter, count)?;
            }
        }

        Ok(())
    }
}
