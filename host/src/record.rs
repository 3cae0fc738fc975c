//! log line format
//!
//! one record per line, `"; "` separated, positional:
//!
//! ```text
//!     Fecha; Hora; Nodo; Bat; Temp; pH; EC; DO; Lat; Lon; Sat
//!     18/10/2026; 14:05; NODE07; Bat=3.95; Tmp=21.5; pH=7.1; EC=; DO=8.2; Lat=4.6; Lon=-74.08; Sat=7
//! ```
//!
//! a measurement that was never known is written with an empty value.

use crate::domain::Snapshot;
use chrono::{DateTime, Local};

/// header line, always the first line of the log file
pub const LOG_HEADER: &str = "Fecha; Hora; Nodo; Bat; Temp; pH; EC; DO; Lat; Lon; Sat";
/// how the header is recognised when repairing a file
pub const HEADER_PREFIX: &str = "Fecha;";

/// stored calendar date, zero padded day/month/year
pub const DATE_FORMAT: &str = "%d/%m/%Y";
/// stored time of day, 24-hour
pub const TIME_FORMAT: &str = "%H:%M";

const FIELD_SEPARATOR: &str = "; ";
const COLUMN_COUNT: usize = 11;

/// one persisted line
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub date: String,
    pub time: String,
    pub node: String,
    pub battery: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub conductivity: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: u32,
}

/// the (date, time) pair shared by every record of one flush tick
pub fn stamp(now: DateTime<Local>) -> (String, String) {
    (
        now.format(DATE_FORMAT).to_string(),
        now.format(TIME_FORMAT).to_string(),
    )
}

impl LogRecord {
    pub fn from_snapshot(snapshot: &Snapshot, date: &str, time: &str) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            node: snapshot.node.to_string(),
            battery: snapshot.battery_voltage,
            temperature: snapshot.temperature,
            ph: snapshot.ph,
            conductivity: snapshot.conductivity,
            dissolved_oxygen: snapshot.dissolved_oxygen,
            latitude: snapshot.latitude,
            longitude: snapshot.longitude,
            satellites: snapshot.satellites,
        }
    }

    /// serialize without the trailing newline
    pub fn to_line(&self) -> String {
        let columns = [
            self.date.clone(),
            self.time.clone(),
            self.node.clone(),
            format!("Bat={}", optional(self.battery)),
            format!("Tmp={}", optional(self.temperature)),
            format!("pH={}", optional(self.ph)),
            format!("EC={}", optional(self.conductivity)),
            format!("DO={}", optional(self.dissolved_oxygen)),
            format!("Lat={}", self.latitude),
            format!("Lon={}", self.longitude),
            format!("Sat={}", self.satellites),
        ];
        columns.join(FIELD_SEPARATOR)
    }

    /// parse a stored line back
    ///
    /// returns None for blank lines, the header, and lines that do not even
    /// carry date, time and node. missing or unparsable measurement columns
    /// come back as None; gps falls back to zero.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(HEADER_PREFIX) {
            return None;
        }

        let cols: Vec<&str> = line.split(';').map(str::trim).collect();
        if cols.len() < 3 || cols[..3].iter().any(|c| c.is_empty()) {
            return None;
        }
        if cols.len() != COLUMN_COUNT {
            log::debug!("[QUERY] record with {} columns: {}", cols.len(), line);
        }

        let col = |i: usize, key: &str| cols.get(i).map(|c| c.strip_prefix(key).unwrap_or(*c));
        let number = |i: usize, key: &str| col(i, key).and_then(|v| v.parse::<f64>().ok());

        Some(Self {
            date: cols[0].to_string(),
            time: cols[1].to_string(),
            node: cols[2].to_string(),
            battery: number(3, "Bat="),
            temperature: number(4, "Tmp="),
            ph: number(5, "pH="),
            conductivity: number(6, "EC="),
            dissolved_oxygen: number(7, "DO="),
            latitude: number(8, "Lat=").unwrap_or(0.0),
            longitude: number(9, "Lon=").unwrap_or(0.0),
            satellites: col(10, "Sat=").and_then(|v| v.parse().ok()).unwrap_or(0),
        })
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
