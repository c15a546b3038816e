use std::collections::HashMap;
use std::sync::Arc;

use super::codec::Arg;
use super::{Priority, Scheduler};

/// What a task sees while it runs.
pub struct TaskContext<'a> {
    pub(crate) scheduler: &'a Scheduler,
    pub(crate) action: &'a str,
}

impl<'a> TaskContext<'a> {
    /// The scheduler running this task, for queueing follow-up work.
    pub fn scheduler(&self) -> &Scheduler {
        self.scheduler
    }

    /// Name the running task was registered under.
    pub fn action(&self) -> &str {
        self.action
    }

    /// Queue this task again.
    pub fn reschedule(&self, priority: Priority, args: &[Arg]) -> bool {
        self.scheduler.enqueue(self.action, priority, args)
    }
}

/// A registered callable. Errors are logged by the scheduler; they never stop
/// the worker.
pub type TaskFn = Arc<dyn Fn(&TaskContext<'_>, &[Arg]) -> anyhow::Result<()> + Send + Sync>;

/// Action name to callable.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskFn>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `task` under `name`, returning whatever it replaced.
    pub fn insert(&mut self, name: &str, task: TaskFn) -> Option<TaskFn> {
        self.tasks.insert(name.to_string(), task)
    }

    pub fn get(&self, name: &str) -> Option<TaskFn> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
