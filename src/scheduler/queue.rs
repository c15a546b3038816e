//! Insertion-ordered task queue with duplicate suppression.
//!
//! Used for both the ASAP and the lazy tier. A task is "the same pending
//! work" as another when its action and encoded arguments are equal, and at
//! most one copy of it may wait in a given queue.

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tvnab_common::Value;

/// A unit of pending work: the registered action name plus its encoded
/// arguments. Doubles as the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScheduledTask {
    pub action: String,
    pub arguments: Vec<Value>,
}

impl ScheduledTask {
    pub fn new(action: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            action: action.into(),
            arguments,
        }
    }
}

impl fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.action)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Default)]
pub struct FifoQueue {
    queue: VecDeque<ScheduledTask>,
    keys: HashSet<ScheduledTask>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task` unless an identical task is already waiting.
    ///
    /// Returns `false` when the push was suppressed as a duplicate.
    pub fn push(&mut self, task: ScheduledTask) -> bool {
        if self.keys.contains(&task) {
            return false;
        }
        self.keys.insert(task.clone());
        self.queue.push_back(task);
        true
    }

    pub fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn pop(&mut self) -> Option<ScheduledTask> {
        let task = self.queue.pop_front()?;
        self.keys.remove(&task);
        Some(task)
    }

    pub fn contains(&self, task: &ScheduledTask) -> bool {
        self.keys.contains(task)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pending tasks, front first.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.queue.iter()
    }
}
