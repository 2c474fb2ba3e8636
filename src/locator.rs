//! Maidenhead grid locators.
//!
//! Accepts the four-character square (`KN75`) and the six-character
//! subsquare (`JO62qm`) forms.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("locator must have 4 or 6 characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid locator: {0}")]
    InvalidFormat(String),
}

/// A validated grid locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    field: [u8; 2],
    square: [u8; 2],
    subsquare: Option<[u8; 2]>,
}

impl Locator {
    /// Approximate position of the locator's center as (latitude, longitude) in degrees.
    pub fn center(&self) -> (f64, f64) {
        let mut lon = f64::from(self.field[0] - b'A') * 20.0 - 180.0;
        let mut lat = f64::from(self.field[1] - b'A') * 10.0 - 90.0;
        lon += f64::from(self.square[0] - b'0') * 2.0;
        lat += f64::from(self.square[1] - b'0');
        match self.subsquare {
            Some([x, y]) => {
                lon += f64::from(x - b'A') * (2.0 / 24.0) + 1.0 / 24.0;
                lat += f64::from(y - b'A') * (1.0 / 24.0) + 0.5 / 24.0;
            }
            None => {
                lon += 1.0;
                lat += 0.5;
            }
        }
        (lat, lon)
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = s.to_ascii_uppercase().into_bytes();
        if bytes.len() != 4 && bytes.len() != 6 {
            return Err(LocatorError::InvalidLength(s.len()));
        }

        let in_range = |b: u8, lo: u8, hi: u8| (lo..=hi).contains(&b);
        let field_ok = bytes[..2].iter().all(|&b| in_range(b, b'A', b'R'));
        let square_ok = bytes[2..4].iter().all(u8::is_ascii_digit);
        let subsquare_ok = bytes[4..].iter().all(|&b| in_range(b, b'A', b'X'));
        if !(field_ok && square_ok && subsquare_ok) {
            return Err(LocatorError::InvalidFormat(s.to_string()));
        }

        Ok(Self {
            field: [bytes[0], bytes[1]],
            square: [bytes[2], bytes[3]],
            subsquare: (bytes.len() == 6).then(|| [bytes[4], bytes[5]]),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.field[0] as char,
            self.field[1] as char,
            self.square[0] as char,
            self.square[1] as char
        )?;
        if let Some([x, y]) = self.subsquare {
            write!(
                f,
                "{}{}",
                x.to_ascii_lowercase() as char,
                y.to_ascii_lowercase() as char
            )?;
        }
        Ok(())
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square() {
        let loc: Locator = "kn75".parse().unwrap();
        assert_eq!(loc.to_string(), "KN75");
        assert_eq!(loc, "KN75".parse().unwrap());
    }

    #[test]
    fn test_subsquare() {
        let loc: Locator = "JO62QM".parse().unwrap();
        assert_eq!(loc.to_string(), "JO62qm");
    }

    #[test]
    fn test_invalid() {
        assert_eq!("kn7".parse::<Locator>(), Err(LocatorError::InvalidLength(3)));
        for s in ["zz75", "kn7a", "75kn", "jo62zz", ""] {
            assert!(s.parse::<Locator>().is_err(), "{s} should be invalid");
        }
    }

    #[test]
    fn test_center() {
        let (lat, lon) = "JO62".parse::<Locator>().unwrap().center();
        assert!((lat - 52.5).abs() < 1e-9);
        assert!((lon - 13.0).abs() < 1e-9);
    }
}
