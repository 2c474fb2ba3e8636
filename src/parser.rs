//! Parser for DX cluster spot lines.
//!
//! This module uses the `nom` parsing library to pull spot records out of a
//! decoded text unit. A unit may hold any number of spot lines mixed with
//! other node output, so the parser scans for every `dx de` announcement
//! instead of expecting one line per call.
//!
//! # Spot Format
//!
//! ```text
//! DX de SPOTTER:  FREQ  CALLSIGN  COMMENT ...  HHMMZ [LOCATOR]
//! ```
//!
//! Examples:
//! ```text
//! DX de RX7K:       7154.0  RK7R         cq                             1650Z KN75
//! DX de DL8LAS-#:  14040.1  SV1RRV         20 dB  18 WPM  CQ            1711Z
//! ```
//!
//! Field problems (a bad callsign, an out-of-range frequency or time) drop
//! only the affected record. The locator is optional and never drops a record.

use chrono::{DateTime, Utc};
use nom::{
    IResult, Parser,
    bytes::complete::{tag_no_case, take_till1, take_while_m_n, take_while1},
    character::complete::{char, digit1, multispace1, satisfy},
    combinator::{opt, peek, recognize, value},
    sequence::{preceded, terminated},
};
use thiserror::Error;
use tracing::debug;

use crate::callsign::CallsignError;
use crate::locator::Locator;
use crate::spot::SpotRecord;

/// Marker that opens every spot announcement.
const SPOT_MARKER: &str = "dx de ";

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A structural match produced inconsistent fields. This is a parser bug,
    /// not bad input.
    #[error("parser contract violation: {0}")]
    ContractViolation(String),
}

/// Reasons a single structurally matched spot is dropped.
#[derive(Debug, Error)]
pub enum SpotFieldError {
    #[error("invalid callsign: {0}")]
    InvalidCallsign(#[from] CallsignError),

    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The raw fields of one structural match.
#[derive(Debug, PartialEq, Eq)]
struct SpotMatch<'a> {
    spotter: &'a str,
    frequency: &'a str,
    call: &'a str,
    comment: &'a str,
    time: &'a str,
    locator: Option<&'a str>,
}

impl SpotMatch<'_> {
    fn check(&self) -> ParseResult<()> {
        let consistent = self.time.len() == 4
            && self.frequency.contains('.')
            && !self.call.is_empty()
            && self.locator.is_none_or(|l| l.len() == 4);
        if consistent {
            Ok(())
        } else {
            Err(ParseError::ContractViolation(format!("{:?}", self)))
        }
    }

    fn to_record(&self, now: DateTime<Utc>) -> Result<SpotRecord, SpotFieldError> {
        Ok(SpotRecord {
            call: self.call.parse()?,
            frequency_hz: parse_frequency_hz(self.frequency)?,
            time: parse_spot_time(now, self.time)?,
            locator: self.locator.and_then(|l| l.parse::<Locator>().ok()),
            text: self.comment.trim().to_string(),
            spotter: self.spotter.to_string(),
        })
    }
}

/// Check if a character can appear in the spotted callsign field.
fn is_callsign_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '/'
}

/// Parse the "DX de " prefix that starts every spot line.
fn parse_dx_de_prefix(input: &str) -> IResult<&str, ()> {
    value(
        (),
        (
            tag_no_case("dx"),
            multispace1,
            tag_no_case("de"),
            multispace1,
        ),
    )
    .parse(input)
}

/// Parse everything up to and including the spotted callsign.
///
/// Leaves the whitespace that must follow the callsign in the input.
fn parse_spot_head(input: &str) -> IResult<&str, (&str, &str, &str)> {
    (
        preceded(
            parse_dx_de_prefix,
            terminated(take_till1(|c: char| c == ':'), char(':')),
        ),
        preceded(multispace1, recognize((digit1, char('.'), digit1))),
        preceded(
            multispace1,
            terminated(take_while1(is_callsign_char), peek(satisfy(char::is_whitespace))),
        ),
    )
        .parse(input)
}

/// Parse a single whitespace, the `HHMMz` time tag and an optional ` LL00` locator.
fn parse_time_tag(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    (
        preceded(
            satisfy(char::is_whitespace),
            terminated(take_while_m_n(4, 4, |c: char| c.is_ascii_digit()), char('z')),
        ),
        opt(preceded(
            char(' '),
            recognize((
                take_while_m_n(2, 2, |c: char| c.is_ascii_alphabetic()),
                take_while_m_n(2, 2, |c: char| c.is_ascii_digit()),
            )),
        )),
    )
        .parse(input)
}

/// Split the text after the callsign into comment, time and locator.
///
/// The comment runs up to the last time tag on the line and is never empty.
fn split_comment(rest: &str) -> Option<(&str, &str, Option<&str>)> {
    rest.char_indices()
        .rev()
        .filter(|&(i, c)| i >= 2 && c.is_whitespace())
        .find_map(|(i, _)| {
            parse_time_tag(&rest[i..])
                .ok()
                .map(|(_, (time, locator))| (&rest[..i], time, locator))
        })
}

fn match_spot(segment: &str) -> Option<SpotMatch<'_>> {
    let (rest, (spotter, frequency, call)) = parse_spot_head(segment).ok()?;
    let (comment, time, locator) = split_comment(rest)?;
    Some(SpotMatch {
        spotter,
        frequency,
        call,
        comment,
        time,
        locator,
    })
}

/// Cut the text into candidate segments, one per spot head on each line.
///
/// A `dx de` that does not open a complete head stays part of the comment.
fn segments(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').flat_map(|line| {
        let starts: Vec<usize> = line
            .match_indices(SPOT_MARKER)
            .map(|(i, _)| i)
            .filter(|&i| parse_spot_head(&line[i..]).is_ok())
            .collect();
        let ends: Vec<usize> = starts.iter().skip(1).copied().chain([line.len()]).collect();
        starts
            .into_iter()
            .zip(ends)
            .map(move |(start, end)| &line[start..end])
    })
}

/// Convert a decimal kHz reading into Hz without going through floating point.
///
/// Digits beyond 1 Hz resolution are truncated.
pub fn parse_frequency_hz(khz: &str) -> Result<u64, SpotFieldError> {
    let invalid = || SpotFieldError::InvalidFrequency(khz.to_string());
    let (whole, fraction) = khz.split_once('.').unwrap_or((khz, ""));
    if whole.is_empty() || !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    let hz: u64 = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0, |acc, b| acc * 10 + u64::from(b - b'0'));

    whole
        .checked_mul(1000)
        .and_then(|v| v.checked_add(hz))
        .ok_or_else(invalid)
}

/// Build a UTC timestamp on the current day from an `HHMM` field.
pub fn parse_spot_time(now: DateTime<Utc>, hhmm: &str) -> Result<DateTime<Utc>, SpotFieldError> {
    let invalid = || SpotFieldError::InvalidTime(hhmm.to_string());
    if hhmm.len() != 4 || !hhmm.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hour: u32 = hhmm[0..2].parse().map_err(|_| invalid())?;
    let minute: u32 = hhmm[2..4].parse().map_err(|_| invalid())?;

    now.date_naive()
        .and_hms_opt(hour, minute, 0)
        .map(|t| t.and_utc())
        .ok_or_else(invalid)
}

/// Check if a text unit may contain spots (quick pre-filter).
#[inline]
pub fn looks_like_spot(text: &str) -> bool {
    text.len() > 20 && text.to_ascii_lowercase().contains(SPOT_MARKER)
}

/// Extract all spots from a decoded text unit, dated today (UTC).
///
/// # Example
///
/// ```
/// use clusterix::parser::extract_spots;
///
/// let text = "dx de rx7k:       7154.0  rk7r         cq                             1650z kn75";
/// let spots = extract_spots(text).unwrap();
/// assert_eq!(spots.len(), 1);
/// assert_eq!(spots[0].spotter, "rx7k");
/// assert_eq!(spots[0].frequency_hz, 7_154_000);
/// ```
pub fn extract_spots(text: &str) -> ParseResult<Vec<SpotRecord>> {
    extract_spots_at(text, Utc::now())
}

/// Extract all spots from a decoded text unit, dated on the UTC day of `now`.
pub fn extract_spots_at(text: &str, now: DateTime<Utc>) -> ParseResult<Vec<SpotRecord>> {
    if !looks_like_spot(text) {
        return Ok(Vec::new());
    }

    let text = text.to_lowercase();
    let mut records = Vec::new();
    for spot in segments(&text).filter_map(match_spot) {
        spot.check()?;
        match spot.to_record(now) {
            Ok(record) => records.push(record),
            Err(e) => debug!("Dropping spot from {}: {}", spot.spotter, e),
        }
    }

    Ok(records)
}
