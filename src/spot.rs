//! Domain records decoded from a cluster feed.
//!
//! These are the values handed to observers by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::callsign::Callsign;
use crate::locator::Locator;

/// A parsed DX spot.
///
/// A raw spot like:
/// ```text
/// DX de RX7K:       7154.0  RK7R         cq                             1650Z KN75
/// ```
///
/// is decoded into:
/// - `spotter`: "rx7k"
/// - `call`: RK7R
/// - `frequency_hz`: 7154000
/// - `time`: today 16:50 UTC
/// - `locator`: KN75
/// - `text`: "cq"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRecord {
    /// The station being spotted.
    pub call: Callsign,

    /// Frequency in Hz.
    pub frequency_hz: u64,

    /// UTC time of the spot. The date is the receiving day.
    pub time: DateTime<Utc>,

    /// Grid locator, if the node sent a valid one.
    pub locator: Option<Locator>,

    /// Free-text comment.
    pub text: String,

    /// Whoever reported the spot, as sent by the node (skimmers carry a `-#` suffix).
    pub spotter: String,
}

impl SpotRecord {
    /// Returns the amateur radio band for this spot's frequency.
    ///
    /// Returns `None` if the frequency doesn't fall within a recognized band.
    pub fn band(&self) -> Option<&'static str> {
        match self.frequency_hz / 1000 {
            135..=138 => Some("2200m"),
            472..=479 => Some("630m"),
            1800..=2000 => Some("160m"),
            3500..=4000 => Some("80m"),
            5330..=5410 => Some("60m"),
            7000..=7300 => Some("40m"),
            10100..=10150 => Some("30m"),
            14000..=14350 => Some("20m"),
            18068..=18168 => Some("17m"),
            21000..=21450 => Some("15m"),
            24890..=24990 => Some("12m"),
            28000..=29700 => Some("10m"),
            50000..=54000 => Some("6m"),
            144000..=148000 => Some("2m"),
            _ => None,
        }
    }

    /// Frequency in kHz, as clusters display it.
    pub fn frequency_khz(&self) -> f64 {
        self.frequency_hz as f64 / 1000.0
    }
}

impl fmt::Display for SpotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DX de {}: {:>8.1} {} {} {}",
            self.spotter,
            self.frequency_khz(),
            self.call,
            self.text,
            self.time.format("%H%MZ")
        )?;
        if let Some(locator) = &self.locator {
            write!(f, " {}", locator)?;
        }
        Ok(())
    }
}

/// A propagation (WWV) bulletin.
///
/// Carries no fields yet; decoding of bulletins is not wired up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct WwvRecord {}

/// A free-text announcement or talk message.
///
/// Carries no fields yet; decoding of announcements is not wired up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TextRecord {}
