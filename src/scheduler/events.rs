use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tvnab_common::Value;

/// The queue a task waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Asap,
    Timed,
    Lazy,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKind::Asap => f.write_str("asap"),
            QueueKind::Timed => f.write_str("timed"),
            QueueKind::Lazy => f.write_str("lazy"),
        }
    }
}

/// Scheduler activity, broadcast to any subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Started,
    Stopped,
    TaskQueued {
        action: String,
        arguments: Vec<Value>,
        queue: QueueKind,
        due: Option<f64>,
    },
    TaskStarted {
        action: String,
        arguments: Vec<Value>,
    },
    TaskCompleted {
        action: String,
        arguments: Vec<Value>,
    },
    TaskFailed {
        action: String,
        arguments: Vec<Value>,
        error: String,
    },
    ScheduleSaved {
        path: PathBuf,
        entries: usize,
    },
}
