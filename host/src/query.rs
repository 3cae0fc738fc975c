//! ==============================================================================
//! query.rs - historical queries over the snapshot log
//! ==============================================================================
//!
//! purpose:
//!     answers "what did NODE07 read on 18/10/2026 between 06:00 and 09:30".
//!     reads the log file only, never the live state, so a query can never
//!     hold up ingestion.
//!
//! matching rules:
//!     - node and date are compared as plain strings against the stored columns
//!     - the time window is inclusive on both ends, in minutes since midnight
//!     - results come back in file order (flush order), unsorted
//!     - a missing or unreadable log is an empty result, a broken line is skipped
//!
//! ==============================================================================

use crate::record::{LogRecord, DATE_FORMAT};

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const LAST_MINUTE: u32 = 23 * 60 + 59;

/// one point of a history series
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryPoint {
    /// stored time of day, as written in the log
    pub time: String,
    pub battery: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub conductivity: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
}

impl From<LogRecord> for HistoryPoint {
    fn from(r: LogRecord) -> Self {
        Self {
            time: r.time,
            battery: r.battery,
            temperature: r.temperature,
            ph: r.ph,
            conductivity: r.conductivity,
            dissolved_oxygen: r.dissolved_oxygen,
        }
    }
}

/// inclusive [from, to] window in minutes since midnight
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: u32,
    pub to: u32,
}

impl TimeWindow {
    /// build a window from `HH:MM` bounds
    ///
    /// a missing or unreadable bound widens to the start/end of the day.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            from: from.and_then(minutes_of_day).unwrap_or(0),
            to: to.and_then(minutes_of_day).unwrap_or(LAST_MINUTE),
        }
    }

    pub fn whole_day() -> Self {
        Self { from: 0, to: LAST_MINUTE }
    }

    pub fn contains(&self, minute: u32) -> bool {
        self.from <= minute && minute <= self.to
    }
}

#[derive(Clone, Debug)]
pub struct QueryEngine {
    path: PathBuf,
}

impl QueryEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// every distinct node id present in the log, sorted
    pub fn nodes(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|r| r.node)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// records of `node` on `date` whose time falls inside `window`
    pub fn history(&self, node: &str, date: &str, window: TimeWindow) -> Vec<HistoryPoint> {
        self.records()
            .into_iter()
            .filter(|r| r.node == node && r.date == date)
            .filter(|r| minutes_of_day(&r.time).is_some_and(|m| window.contains(m)))
            .map(HistoryPoint::from)
            .collect()
    }

    /// convenience form taking `HH:MM` strings
    pub fn query(&self, node: &str, date: &str, from: &str, to: &str) -> Vec<HistoryPoint> {
        self.history(node, date, TimeWindow::parse(Some(from), Some(to)))
    }

    fn records(&self) -> Vec<LogRecord> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("[QUERY] Cannot read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        parse_log(&bytes)
    }
}

/// every record in a raw log, header excluded
///
/// lines are decoded one by one so a stray invalid byte only affects its own
/// line. a final line without its newline is an append that did not finish
/// and is left out.
fn parse_log(bytes: &[u8]) -> Vec<LogRecord> {
    let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    // split leaves "" after a trailing newline, or the unterminated tail
    if let Some(tail) = lines.pop() {
        if !tail.is_empty() {
            debug!("[QUERY] Skipping unterminated last line ({} bytes)", tail.len());
        }
    }

    lines
        .into_iter()
        .filter_map(|line| LogRecord::parse(&String::from_utf8_lossy(line)))
        .collect()
}

/// `HH:MM` (optionally with a meridiem marker) to minutes since midnight
///
/// the log is written in 24-hour form; 12-hour inputs such as `3:05 p. m.`
/// or `11:40 AM` still parse so hand-edited files stay queryable.
pub fn minutes_of_day(text: &str) -> Option<u32> {
    let (clock, meridiem) = strip_meridiem(text);
    let (h, m) = clock.trim().split_once(':')?;
    let mut hour: u32 = h.trim().parse().ok()?;
    // tolerate seconds, "14:05:30"
    let minute: u32 = m.split(':').next()?.trim().parse().ok()?;
    if minute > 59 {
        return None;
    }

    // converted, not just stripped, so "3:05 pm" lands at 15:05
    match meridiem {
        Some(Meridiem::Am) if hour == 12 => hour = 0,
        Some(Meridiem::Pm) if hour < 12 => hour += 12,
        _ => {}
    }
    if hour > 23 {
        return None;
    }
    Some(hour * 60 + minute)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// split a trailing `am`/`pm` marker (any case, dotted or spaced) off a time
fn strip_meridiem(text: &str) -> (&str, Option<Meridiem>) {
    let letters: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_alphabetic())
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let meridiem = match letters.as_str() {
        "am" => Meridiem::Am,
        "pm" => Meridiem::Pm,
        _ => return (text, None),
    };
    let end = text.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(text.len());
    (&text[..end], Some(meridiem))
}

/// accept `YYYY-MM-DD` (html date inputs) as well as the stored `DD/MM/YYYY`
///
/// anything else is passed through untouched and simply will not match.
pub fn normalize_date(date: &str) -> String {
    let date = date.trim();
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => d.format(DATE_FORMAT).to_string(),
        Err(_) => date.to_string(),
    }
}
