//! Amateur radio callsigns.
//!
//! A callsign is a base call with an optional location prefix and an optional
//! operating suffix, separated by slashes: `PJ2/K5PI`, `DL1ABC/P`,
//! `EA8/DL1ABC/QRP`. Parsing is case-insensitive; the canonical form is
//! uppercase.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a callsign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallsignError {
    #[error("empty callsign")]
    Empty,

    #[error("invalid character {0:?} in callsign")]
    InvalidCharacter(char),

    #[error("invalid callsign: {0}")]
    InvalidFormat(String),
}

/// A validated callsign.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Callsign {
    prefix: Option<String>,
    base: String,
    suffix: Option<String>,
}

impl Callsign {
    /// The base call without prefix or suffix, e.g. `K5PI` for `PJ2/K5PI`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }
}

/// A base call: at least three characters, ending in a letter, with a digit
/// that has a letter somewhere before it.
fn is_base_call(s: &str) -> bool {
    let bytes = s.as_bytes();
    if !(3..=10).contains(&bytes.len()) || !bytes[bytes.len() - 1].is_ascii_alphabetic() {
        return false;
    }
    match bytes.iter().rposition(u8::is_ascii_digit) {
        Some(i) if i > 0 => bytes[..i].iter().any(u8::is_ascii_alphabetic),
        _ => false,
    }
}

fn is_affix(s: &str) -> bool {
    (1..=4).contains(&s.len())
}

impl FromStr for Callsign {
    type Err = CallsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CallsignError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '/') {
            return Err(CallsignError::InvalidCharacter(c));
        }

        let upper = s.to_ascii_uppercase();
        let parts: Vec<&str> = upper.split('/').collect();
        let invalid = || CallsignError::InvalidFormat(s.to_string());
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let (prefix, base, suffix) = match parts.as_slice() {
            [base] => (None, *base, None),
            [first, second] if is_base_call(second) && first.len() <= second.len() => {
                (Some(*first), *second, None)
            }
            [first, second] => (None, *first, Some(*second)),
            [prefix, base, suffix] => (Some(*prefix), *base, Some(*suffix)),
            _ => return Err(invalid()),
        };

        if !is_base_call(base)
            || prefix.is_some_and(|p| !is_affix(p))
            || suffix.is_some_and(|p| !is_affix(p))
        {
            return Err(invalid());
        }

        Ok(Self {
            prefix: prefix.map(str::to_string),
            base: base.to_string(),
            suffix: suffix.map(str::to_string),
        })
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, "{}/", prefix)?;
        }
        write!(f, "{}", self.base)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "/{}", suffix)?;
        }
        Ok(())
    }
}

impl Serialize for Callsign {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Callsign {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
