//! ==============================================================================
//! flusher.rs - periodic snapshot writer
//! ==============================================================================
//!
//! purpose:
//!     once per interval, append one line per node that reported since the
//!     previous tick. nodes that stayed silent leave a gap, which is expected.
//!
//! file rules:
//!     - the header is always line 1; a missing, empty or whitespace-only
//!       file is rewritten as header plus records
//!     - otherwise the file is only appended to, each tick in a single write,
//!       and a cut-off last line is closed before new records follow
//!     - a failed write is logged and the tick's data is dropped, the dirty set
//!       is cleared either way (at most once)
//!
//! ==============================================================================

use crate::aggregator::StateAggregator;
use crate::record::{self, LogRecord, HEADER_PREFIX, LOG_HEADER};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub struct LogFlusher {
    path: PathBuf,
    aggregator: StateAggregator,
}

impl LogFlusher {
    pub fn new(path: impl Into<PathBuf>, aggregator: StateAggregator) -> Self {
        Self {
            path: path.into(),
            aggregator,
        }
    }

    /// make sure the log starts with the header before the first tick
    ///
    /// creates the file (and its directory) if needed, resets a blank file,
    /// and prepends the header to a file that lost it (hand edits, old logs).
    pub fn ensure_header(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };

        if content.starts_with(HEADER_PREFIX) {
            return Ok(());
        }

        let repaired = if content.trim().is_empty() {
            info!("[FLUSH] Writing header to {}", self.path.display());
            format!("{}\n", LOG_HEADER)
        } else {
            info!("[FLUSH] Header missing in {}, prepending it", self.path.display());
            format!("{}\n{}", LOG_HEADER, content)
        };
        fs::write(&self.path, repaired)
            .with_context(|| format!("failed to write header to {}", self.path.display()))
    }

    /// flush at the current local time, returns how many records were written
    pub async fn tick(&self) -> usize {
        self.tick_at(Local::now()).await
    }

    /// flush every pending snapshot with one shared date/time stamp
    pub async fn tick_at(&self, now: DateTime<Local>) -> usize {
        // taking the dirty set clears it, even if the write below fails
        let pending = self.aggregator.drain_pending().await;
        let (date, time) = record::stamp(now);

        let records: Vec<LogRecord> = pending
            .iter()
            .map(|snapshot| LogRecord::from_snapshot(snapshot, &date, &time))
            .collect();

        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || append_tick(&path, &records)).await;

        match written {
            Ok(Ok(nodes)) => {
                for node in &nodes {
                    debug!("[FLUSH] Saved {}", node);
                }
                if !nodes.is_empty() {
                    info!("[FLUSH] {} record(s) at {} {}", nodes.len(), date, time);
                }
                nodes.len()
            }
            Ok(Err(e)) => {
                error!("[FLUSH] Write failed, {} record(s) lost: {:#}", pending.len(), e);
                0
            }
            Err(e) => {
                error!("[FLUSH] Flush task failed: {}", e);
                0
            }
        }
    }

    /// run forever, one tick per `every`
    pub async fn run(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately, nothing to flush yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

/// how the log looks before a tick writes to it
#[derive(Debug, PartialEq)]
enum LogShape {
    /// missing, zero-length or only whitespace: rewritten from the header
    Blank,
    /// last line is complete
    Terminated,
    /// last line was cut short by an interrupted write
    Unterminated,
}

/// leading bytes read to tell a blank log from a real one
const HEAD_BYTES: u64 = 512;

fn log_shape(path: &Path) -> Result<LogShape> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogShape::Blank),
        Err(e) => return Err(e).with_context(|| format!("failed to open {}", path.display())),
    };

    let mut head = Vec::new();
    (&mut file)
        .take(HEAD_BYTES)
        .read_to_end(&mut head)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if head.iter().all(u8::is_ascii_whitespace) {
        let mut rest = Vec::new();
        file.read_to_end(&mut rest)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(LogShape::Blank);
        }
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .with_context(|| format!("failed to read the end of {}", path.display()))?;
    Ok(if last[0] == b'\n' {
        LogShape::Terminated
    } else {
        LogShape::Unterminated
    })
}

/// write one tick worth of records
///
/// a blank log is rewritten as header plus records, anything else is appended
/// to, after closing a cut-off last line. returns the node ids written.
fn append_tick(path: &Path, records: &[LogRecord]) -> Result<Vec<String>> {
    let shape = log_shape(path)?;
    if records.is_empty() && shape != LogShape::Blank {
        return Ok(Vec::new());
    }

    let mut buf = String::new();
    match shape {
        LogShape::Blank => {
            buf.push_str(LOG_HEADER);
            buf.push('\n');
        }
        LogShape::Unterminated => {
            warn!("[FLUSH] Last line of {} is incomplete, closing it", path.display());
            buf.push('\n');
        }
        LogShape::Terminated => {}
    }
    for record in records {
        buf.push_str(&record.to_line());
        buf.push('\n');
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if shape == LogShape::Blank {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(buf.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))?;

    Ok(records.iter().map(|r| r.node.clone()).collect())
}
