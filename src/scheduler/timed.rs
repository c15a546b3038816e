//! Time-ordered task queue.
//!
//! Entries become eligible once their absolute due time has passed. The same
//! task may only wait once; pushing it again can pull it forward to an
//! earlier due time but never push it back.

use super::queue::ScheduledTask;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone)]
struct TimedEntry {
    due: f64,
    task: ScheduledTask,
}

// Reversed so that `BinaryHeap` (a max-heap) yields the earliest due time.
impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.task.cmp(&self.task))
    }
}

impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimedEntry {}

#[derive(Debug, Default)]
pub struct TimedQueue {
    heap: BinaryHeap<TimedEntry>,
    due_times: HashMap<ScheduledTask, f64>,
}

impl TimedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run at `due` (Unix seconds).
    ///
    /// If the task is already waiting, it is moved to `due` only when that is
    /// strictly earlier than its current due time. Returns `false` when the
    /// push changed nothing.
    pub fn push(&mut self, due: f64, task: ScheduledTask) -> bool {
        if let Some(&existing) = self.due_times.get(&task) {
            if existing <= due {
                return false;
            }
            self.heap.retain(|entry| entry.task != task);
        }
        self.due_times.insert(task.clone(), due);
        self.heap.push(TimedEntry { due, task });
        true
    }

    /// True if the earliest entry is due at `now`.
    pub fn has_next(&self, now: f64) -> bool {
        self.heap.peek().is_some_and(|entry| entry.due <= now)
    }

    /// Remove the earliest entry regardless of whether it is due yet.
    /// Callers check [`has_next`](Self::has_next) first.
    pub fn pop(&mut self) -> Option<ScheduledTask> {
        let entry = self.heap.pop()?;
        self.due_times.remove(&entry.task);
        Some(entry.task)
    }

    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.due)
    }

    pub fn due_time(&self, task: &ScheduledTask) -> Option<f64> {
        self.due_times.get(task).copied()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending entries sorted by due time.
    pub fn sorted(&self) -> Vec<(f64, &ScheduledTask)> {
        let mut entries: Vec<_> = self.heap.iter().map(|e| (e.due, &e.task)).collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        entries
    }
}
