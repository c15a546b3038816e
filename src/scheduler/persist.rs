//! The on-disk schedule document.
//!
//! ```json
//! {
//!   "queue": [
//!     { "time": "asap", "tstr": "asap", "action": "refresh", "arguments": [] },
//!     { "time": 1718000000.0, "tstr": "Mon Jun 10 06:13:20 2024",
//!       "action": "rename_file", "arguments": ["/downloads/a.mkv"] }
//!   ]
//! }
//! ```
//!
//! Records are written ASAP first, then lazy, then timed by due time. That
//! order is for people reading the file; on load each record goes back to the
//! queue named by its `time` field.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tvnab_common::Value;

use super::error::Result;
use super::events::QueueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FifoTag {
    Asap,
    Lazy,
}

/// When a persisted task should run: one of the FIFO tiers, or a Unix
/// timestamp for the timed queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DueTime {
    Queue(FifoTag),
    At(f64),
}

impl DueTime {
    pub fn queue(&self) -> QueueKind {
        match self {
            DueTime::Queue(FifoTag::Asap) => QueueKind::Asap,
            DueTime::Queue(FifoTag::Lazy) => QueueKind::Lazy,
            DueTime::At(_) => QueueKind::Timed,
        }
    }

    /// Human-readable form written next to the authoritative `time` field.
    pub fn describe(&self) -> String {
        match self {
            DueTime::Queue(FifoTag::Asap) => "asap".to_string(),
            DueTime::Queue(FifoTag::Lazy) => "lazy".to_string(),
            DueTime::At(secs) => format_timestamp(*secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub time: DueTime,
    #[serde(default)]
    pub tstr: String,
    pub action: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl ScheduleRecord {
    pub fn new(time: DueTime, action: &str, arguments: &[Value]) -> Self {
        Self {
            time,
            tstr: time.describe(),
            action: action.to_string(),
            arguments: arguments.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleFile {
    pub queue: Vec<ScheduleRecord>,
}

fn format_timestamp(secs: f64) -> String {
    let millis = (secs * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%a %b %e %H:%M:%S %Y")
                .to_string()
        })
        .unwrap_or_else(|| secs.to_string())
}

/// Read a schedule file. A missing file is not an error and yields `None`.
pub fn read_schedule(path: &Path) -> Result<Option<ScheduleFile>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let schedule: ScheduleFile = serde_json::from_str(&content)?;
    Ok(Some(schedule))
}

/// Write a schedule file atomically: the document goes to a temporary file in
/// the same directory which then replaces `path`.
pub fn write_schedule(path: &Path, schedule: &ScheduleFile) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, schedule)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
