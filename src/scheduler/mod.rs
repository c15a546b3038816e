//! Single-worker, priority-tiered, persistent task scheduler.
//!
//! Every piece of background work in tvnab (refreshing shows, polling the
//! download client, filing finished downloads) is a named task run by one
//! [`Scheduler`]. Tasks wait in one of three queues:
//!
//! - **asap**: runs before anything else, in arrival order.
//! - **timed**: runs once its due time has passed, earliest first.
//! - **lazy**: runs only when nothing asap or due is waiting.
//!
//! Tasks run one at a time on a single worker thread, never concurrently.
//! The pending queues are written to a JSON schedule file so work survives a
//! restart.
//!
//! # Example
//!
//! ```rust,ignore
//! let scheduler = Scheduler::builder()
//!     .schedule_file("schedule.json")
//!     .build();
//!
//! let ping = scheduler.register("ping", |_ctx, args| {
//!     tracing::info!("ping {:?}", args[0].as_str());
//!     Ok(())
//! });
//!
//! ping.lazy(vec!["hello".into()]);
//! ping.timed(Duration::from_secs(3600), vec!["later".into()]);
//! scheduler.start()?;
//! ```

pub mod clock;
pub mod codec;
pub mod error;
pub mod events;
pub mod persist;
pub mod queue;
pub mod registry;
pub mod timed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Arg, ArgumentCodec, CodecError, Entity, EntityCodec, EntityResolver, IdentityCodec};
pub use error::{Result, SchedulerError};
pub use events::{QueueKind, SchedulerEvent};
pub use persist::{DueTime, FifoTag, ScheduleFile, ScheduleRecord};
pub use queue::{FifoQueue, ScheduledTask};
pub use registry::{TaskContext, TaskFn, TaskRegistry};
pub use timed::TimedQueue;

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// How long the worker waits for new work before re-checking the queues.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum time between two rate-limited saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 256;

/// Which queue a task goes into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Priority {
    Asap,
    Lazy,
    /// Run once the delay has elapsed.
    Timed(Duration),
}

impl Priority {
    /// Build a priority from its tag (`asap`, `lazy` or `timed`); `timed`
    /// requires a delay in seconds.
    pub fn from_tag(tag: &str, delay_secs: Option<f64>) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "asap" => Ok(Priority::Asap),
            "lazy" => Ok(Priority::Lazy),
            "timed" => {
                let secs = delay_secs.ok_or(SchedulerError::MissingDelay)?;
                Duration::try_from_secs_f64(secs)
                    .map(Priority::Timed)
                    .map_err(|_| SchedulerError::InvalidDelay(secs))
            }
            other => Err(SchedulerError::UnknownPriority(other.to_string())),
        }
    }

    pub fn queue(&self) -> QueueKind {
        match self {
            Priority::Asap => QueueKind::Asap,
            Priority::Lazy => QueueKind::Lazy,
            Priority::Timed(_) => QueueKind::Timed,
        }
    }
}

/// Parses `asap`, `lazy` or `timed:<seconds>`.
impl FromStr for Priority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((tag, delay)) => {
                let secs = delay
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| SchedulerError::UnknownPriority(s.to_string()))?;
                Priority::from_tag(tag.trim(), Some(secs))
            }
            None => Priority::from_tag(s.trim(), None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Where pending tasks are saved. `None` disables persistence.
    pub schedule_file: Option<PathBuf>,
    pub poll_interval: Duration,
    pub save_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            schedule_file: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }
}

pub struct SchedulerBuilder {
    options: SchedulerOptions,
    codec: Arc<dyn ArgumentCodec>,
    clock: Arc<dyn Clock>,
}

impl SchedulerBuilder {
    pub fn schedule_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.schedule_file = Some(path.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.options.save_interval = interval;
        self
    }

    pub fn options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn ArgumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Scheduler {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Scheduler {
            inner: Arc::new(Inner {
                queues: Mutex::new(Queues::default()),
                wake: Condvar::new(),
                registry: RwLock::new(TaskRegistry::new()),
                codec: self.codec,
                clock: self.clock,
                options: self.options,
                state: Mutex::new(SchedulerState::Stopped),
                stop_flag: AtomicBool::new(true),
                save: Mutex::new(SaveState::default()),
                worker: Mutex::new(None),
                event_tx,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Queues {
    asap: FifoQueue,
    timed: TimedQueue,
    lazy: FifoQueue,
}

impl Queues {
    /// Pop the highest-priority task that may run at `now`.
    fn pop_ready(&mut self, now: f64) -> Option<(QueueKind, ScheduledTask)> {
        if let Some(task) = self.asap.pop() {
            return Some((QueueKind::Asap, task));
        }
        if self.timed.has_next(now) {
            return self.timed.pop().map(|task| (QueueKind::Timed, task));
        }
        self.lazy.pop().map(|task| (QueueKind::Lazy, task))
    }

    fn len(&self) -> usize {
        self.asap.len() + self.timed.len() + self.lazy.len()
    }

    fn snapshot(&self) -> ScheduleFile {
        let asap = self
            .asap
            .iter()
            .map(|t| ScheduleRecord::new(DueTime::Queue(FifoTag::Asap), &t.action, &t.arguments));
        let lazy = self
            .lazy
            .iter()
            .map(|t| ScheduleRecord::new(DueTime::Queue(FifoTag::Lazy), &t.action, &t.arguments));
        let timed = self
            .timed
            .sorted()
            .into_iter()
            .map(|(due, t)| ScheduleRecord::new(DueTime::At(due), &t.action, &t.arguments));

        ScheduleFile {
            queue: asap.chain(lazy).chain(timed).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct SaveState {
    dirty: bool,
    last_save: Option<Instant>,
}

struct Inner {
    queues: Mutex<Queues>,
    wake: Condvar,
    registry: RwLock<TaskRegistry>,
    codec: Arc<dyn ArgumentCodec>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    state: Mutex<SchedulerState>,
    stop_flag: AtomicBool,
    save: Mutex<SaveState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

/// Handle to the scheduler. Cloning is cheap and every clone drives the same
/// queues and worker.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder {
            options: SchedulerOptions::default(),
            codec: Arc::new(IdentityCodec),
            clock: Arc::new(SystemClock),
        }
    }

    /// A scheduler with default options and no persistence.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Register `task` under `name` and return a handle for queueing it.
    ///
    /// Registering the same name again replaces the earlier callable.
    pub fn register<F>(&self, name: &str, task: F) -> Schedulable
    where
        F: Fn(&TaskContext<'_>, &[Arg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let replaced = self.inner.registry.write().insert(name, Arc::new(task));
        if replaced.is_some() {
            debug!(action = %name, "Replaced task registration");
        } else {
            debug!(action = %name, "Registered task");
        }

        Schedulable {
            scheduler: self.clone(),
            action: name.to_string(),
        }
    }

    /// Handle for an already registered task.
    pub fn schedulable(&self, name: &str) -> Option<Schedulable> {
        self.inner.registry.read().contains(name).then(|| Schedulable {
            scheduler: self.clone(),
            action: name.to_string(),
        })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.registry.read().contains(name)
    }

    /// Queue a registered task. Returns `false` if nothing was added, either
    /// because an identical task is already waiting or because `action` was
    /// never registered.
    pub fn enqueue(&self, action: &str, priority: Priority, args: &[Arg]) -> bool {
        if !self.is_registered(action) {
            warn!(action = %action, "Ignoring request to schedule unregistered task");
            return false;
        }

        let arguments = self.inner.codec.encode(args);
        let task = ScheduledTask::new(action, arguments);

        let (added, due) = {
            let mut queues = self.inner.queues.lock();
            let result = match priority {
                Priority::Asap => (queues.asap.push(task.clone()), None),
                Priority::Lazy => (queues.lazy.push(task.clone()), None),
                Priority::Timed(delay) => {
                    let due = self.inner.clock.now() + delay.as_secs_f64();
                    (queues.timed.push(due, task.clone()), Some(due))
                }
            };
            self.inner.wake.notify_one();
            result
        };

        if added {
            debug!(
                task = %task,
                queue = %priority.queue(),
                due = ?due,
                "Scheduled task"
            );
            self.inner.save.lock().dirty = true;
            self.inner.broadcast(SchedulerEvent::TaskQueued {
                action: task.action,
                arguments: task.arguments,
                queue: priority.queue(),
                due,
            });
        }
        added
    }

    /// Load the schedule file and start the worker thread. Does nothing if the
    /// scheduler is not stopped.
    ///
    /// Register every task first: tasks restored from the schedule file may
    /// run as soon as the worker starts, and entries for unknown tasks are
    /// dropped.
    ///
    /// A [`stop`](Self::stop) issued while the schedule file is loading
    /// cancels the start: the worker is never spawned and the state goes
    /// back to `Stopped`.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != SchedulerState::Stopped {
                debug!(state = ?*state, "Scheduler already running");
                return Ok(());
            }
            *state = SchedulerState::Starting;
            self.inner.stop_flag.store(false, Ordering::SeqCst);
        }

        match self.load() {
            Ok(0) => {}
            Ok(count) => info!(entries = count, "Restored scheduled tasks"),
            Err(e) => info!(error = %e, "Failed to load schedule file; starting empty"),
        }

        let mut state = self.inner.state.lock();
        if self.stopping() {
            *state = SchedulerState::Stopped;
            info!("Scheduler stopped before the worker started");
            return Ok(());
        }

        let worker = self.clone();
        let spawned = std::thread::Builder::new()
            .name("tvnab-scheduler".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *self.inner.worker.lock() = Some(handle);
                *state = SchedulerState::Running;
                info!("Scheduler started");
                self.inner.broadcast(SchedulerEvent::Started);
                Ok(())
            }
            Err(e) => {
                self.inner.stop_flag.store(true, Ordering::SeqCst);
                *state = SchedulerState::Stopped;
                Err(SchedulerError::Spawn(e))
            }
        }
    }

    /// Ask the worker to stop after the task it is running, if any. Returns
    /// immediately; the worker saves the schedule on its way out.
    pub fn stop(&self) {
        debug!("Setting scheduler stop flag");
        {
            let mut state = self.inner.state.lock();
            self.inner.stop_flag.store(true, Ordering::SeqCst);
            if *state == SchedulerState::Running {
                *state = SchedulerState::Stopping;
            }
        }
        let _queues = self.inner.queues.lock();
        self.inner.wake.notify_all();
    }

    /// Wait for the worker thread to exit.
    pub fn join(&self) {
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Scheduler worker panicked");
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn schedule_file(&self) -> Option<&Path> {
        self.inner.options.schedule_file.as_deref()
    }

    /// Number of tasks waiting in all three queues.
    pub fn pending_count(&self) -> usize {
        self.inner.queues.lock().len()
    }

    /// Current contents of all queues in schedule file order.
    pub fn snapshot(&self) -> ScheduleFile {
        self.inner.queues.lock().snapshot()
    }

    /// Add the tasks in the schedule file to the queues. Returns how many
    /// were added.
    ///
    /// A missing file loads nothing. A malformed file is an error. Individual
    /// entries naming an unregistered task, or referencing an entity that no
    /// longer exists, are skipped with a warning.
    pub fn load(&self) -> Result<usize> {
        let Some(path) = self.inner.options.schedule_file.as_deref() else {
            return Ok(0);
        };
        let Some(schedule) = persist::read_schedule(path)? else {
            debug!(path = %path.display(), "No schedule file to load");
            return Ok(0);
        };

        let mut restored = Vec::with_capacity(schedule.queue.len());
        {
            let registry = self.inner.registry.read();
            for record in schedule.queue {
                if !registry.contains(&record.action) {
                    warn!(
                        action = %record.action,
                        "Skipping scheduled entry for unregistered task"
                    );
                    continue;
                }

                // Round-trip through the codec so stale entity references are
                // caught here and keys match those of fresh enqueues.
                let arguments = match self.inner.codec.decode(&record.arguments) {
                    Ok(args) => self.inner.codec.encode(&args),
                    Err(e) => {
                        warn!(
                            action = %record.action,
                            error = %e,
                            "Skipping scheduled entry with unresolvable arguments"
                        );
                        continue;
                    }
                };
                restored.push((record.time, ScheduledTask::new(record.action, arguments)));
            }
        }

        let mut queues = self.inner.queues.lock();
        let mut added = 0;
        for (time, task) in restored {
            let pushed = match time {
                DueTime::Queue(FifoTag::Asap) => queues.asap.push(task),
                DueTime::Queue(FifoTag::Lazy) => queues.lazy.push(task),
                DueTime::At(due) => queues.timed.push(due, task),
            };
            if pushed {
                added += 1;
            }
        }
        self.inner.wake.notify_one();
        Ok(added)
    }

    /// Write all pending tasks to the schedule file, if one is configured.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.inner.options.schedule_file.as_deref() else {
            return Ok(());
        };

        let mut save = self.inner.save.lock();
        let schedule = self.snapshot();
        persist::write_schedule(path, &schedule)?;
        save.dirty = false;
        save.last_save = Some(Instant::now());
        drop(save);

        debug!(path = %path.display(), entries = schedule.queue.len(), "Saved schedule");
        self.inner.broadcast(SchedulerEvent::ScheduleSaved {
            path: path.to_path_buf(),
            entries: schedule.queue.len(),
        });
        Ok(())
    }

    /// Save if something changed and the last save is old enough.
    fn maybe_save(&self) {
        if self.inner.options.schedule_file.is_none() {
            return;
        }

        let due = {
            let save = self.inner.save.lock();
            save.dirty
                && save
                    .last_save
                    .map_or(true, |t| t.elapsed() >= self.inner.options.save_interval)
        };

        if due {
            if let Err(e) = self.save() {
                error!(error = %e, "Failed to save schedule");
            }
        }
    }

    fn stopping(&self) -> bool {
        self.inner.stop_flag.load(Ordering::SeqCst)
    }

    /// Block until a task is ready or the stop flag is set.
    fn wait_next(&self) -> Option<(QueueKind, ScheduledTask)> {
        let mut queues = self.inner.queues.lock();
        while !self.stopping() {
            let now = self.inner.clock.now();
            if let Some(next) = queues.pop_ready(now) {
                return Some(next);
            }

            let timeout = queues
                .timed
                .next_due()
                .and_then(|due| Duration::try_from_secs_f64(due - now).ok())
                .map_or(self.inner.options.poll_interval, |until_due| {
                    until_due.min(self.inner.options.poll_interval)
                });
            self.inner.wake.wait_for(&mut queues, timeout);

            MutexGuard::unlocked(&mut queues, || self.maybe_save());
        }
        None
    }

    fn run(self) {
        info!("Scheduler worker started");

        while !self.stopping() {
            let Some((queue, task)) = self.wait_next() else {
                continue;
            };
            self.execute(queue, task);
            self.inner.save.lock().dirty = true;
            self.maybe_save();
        }

        if let Err(e) = self.save() {
            error!(error = %e, "Failed to save schedule on shutdown");
        }

        *self.inner.state.lock() = SchedulerState::Stopped;
        info!("Scheduler stopped");
        self.inner.broadcast(SchedulerEvent::Stopped);
    }

    /// Run a registered task inline on the calling thread.
    #[cfg(test)]
    pub(crate) fn run_task(&self, action: &str, args: &[Arg]) -> anyhow::Result<()> {
        let func = self
            .inner
            .registry
            .read()
            .get(action)
            .ok_or_else(|| anyhow::anyhow!("unregistered task {action}"))?;
        let ctx = TaskContext {
            scheduler: self,
            action,
        };
        func(&ctx, args)
    }

    fn execute(&self, queue: QueueKind, task: ScheduledTask) {
        let Some(func) = self.inner.registry.read().get(&task.action) else {
            warn!(task = %task, "Dropping task with no registered callable");
            return;
        };

        let args = match self.inner.codec.decode(&task.arguments) {
            Ok(args) => args,
            Err(e) => {
                error!(task = %task, error = %e, "Dropping task with unresolvable arguments");
                self.inner.broadcast(SchedulerEvent::TaskFailed {
                    action: task.action,
                    arguments: task.arguments,
                    error: e.to_string(),
                });
                return;
            }
        };

        debug!(task = %task, queue = %queue, "Executing scheduled task");
        self.inner.broadcast(SchedulerEvent::TaskStarted {
            action: task.action.clone(),
            arguments: task.arguments.clone(),
        });

        let ctx = TaskContext {
            scheduler: self,
            action: &task.action,
        };
        let outcome = match catch_unwind(AssertUnwindSafe(|| func(&ctx, &args))) {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("task panicked")),
        };

        match outcome {
            Ok(()) => self.inner.broadcast(SchedulerEvent::TaskCompleted {
                action: task.action,
                arguments: task.arguments,
            }),
            Err(e) => {
                error!(task = %task, error = %e, "Scheduled task failed");
                self.inner.broadcast(SchedulerEvent::TaskFailed {
                    action: task.action,
                    arguments: task.arguments,
                    error: e.to_string(),
                });
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn broadcast(&self, event: SchedulerEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("No subscribers for scheduler event");
        }
    }
}

/// A registered task that can be queued. Queueing returns straight away; the
/// task runs later on the scheduler's worker and its result is not reported
/// back.
#[derive(Clone)]
pub struct Schedulable {
    scheduler: Scheduler,
    action: String,
}

impl Schedulable {
    pub fn name(&self) -> &str {
        &self.action
    }

    pub fn schedule(&self, priority: Priority, args: Vec<Arg>) -> bool {
        self.scheduler.enqueue(&self.action, priority, &args)
    }

    pub fn asap(&self, args: Vec<Arg>) -> bool {
        self.schedule(Priority::Asap, args)
    }

    pub fn lazy(&self, args: Vec<Arg>) -> bool {
        self.schedule(Priority::Lazy, args)
    }

    pub fn timed(&self, delay: Duration, args: Vec<Arg>) -> bool {
        self.schedule(Priority::Timed(delay), args)
    }
}

impl std::fmt::Debug for Schedulable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedulable")
            .field("action", &self.action)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tvnab_common::Value;

    fn manual_scheduler(clock: Arc<ManualClock>) -> Scheduler {
        Scheduler::builder().clock(clock).build()
    }

    fn pop(scheduler: &Scheduler) -> Option<(QueueKind, String)> {
        let now = scheduler.inner.clock.now();
        scheduler
            .inner
            .queues
            .lock()
            .pop_ready(now)
            .map(|(kind, task)| (kind, task.action))
    }

    #[test]
    fn test_priority_tags() {
        assert_eq!(Priority::from_tag("asap", None).unwrap(), Priority::Asap);
        assert_eq!(Priority::from_tag("LAZY", None).unwrap(), Priority::Lazy);
        assert_eq!(
            Priority::from_tag("timed", Some(3600.0)).unwrap(),
            Priority::Timed(Duration::from_secs(3600))
        );
        assert_matches!(
            Priority::from_tag("timed", None),
            Err(SchedulerError::MissingDelay)
        );
        assert_matches!(
            Priority::from_tag("timed", Some(-1.0)),
            Err(SchedulerError::InvalidDelay(_))
        );
        assert_matches!(
            Priority::from_tag("soon", None),
            Err(SchedulerError::UnknownPriority(_))
        );
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("asap".parse::<Priority>().unwrap(), Priority::Asap);
        assert_eq!(
            "timed:1.5".parse::<Priority>().unwrap(),
            Priority::Timed(Duration::from_millis(1500))
        );
        assert!("timed:soon".parse::<Priority>().is_err());
    }

    #[test]
    fn test_wrapper_deduplicates_lazy_pushes() {
        let scheduler = Scheduler::new();
        let ping = scheduler.register("ping", |_, _| Ok(()));

        assert!(ping.lazy(vec!["hello".into()]));
        assert!(!ping.lazy(vec!["hello".into()]));
        assert_eq!(scheduler.pending_count(), 1);

        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.queue[0].time, DueTime::Queue(FifoTag::Lazy));
        assert_eq!(snapshot.queue[0].arguments, vec![Value::from("hello")]);
    }

    #[test]
    fn test_unregistered_action_is_not_queued() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.enqueue("nope", Priority::Asap, &[]));
        assert_eq!(scheduler.pending_count(), 0);
        assert!(scheduler.schedulable("nope").is_none());
    }

    #[test]
    fn test_asap_beats_due_timed_beats_lazy() {
        let clock = Arc::new(ManualClock::new(1000.0));
        let scheduler = manual_scheduler(clock.clone());
        let lazy = scheduler.register("lazy_task", |_, _| Ok(()));
        let timed = scheduler.register("timed_task", |_, _| Ok(()));
        let asap = scheduler.register("asap_task", |_, _| Ok(()));

        lazy.lazy(vec![]);
        timed.timed(Duration::from_secs(10), vec![]);
        asap.asap(vec![]);
        clock.advance(Duration::from_secs(10));

        assert_eq!(pop(&scheduler), Some((QueueKind::Asap, "asap_task".into())));
        assert_eq!(pop(&scheduler), Some((QueueKind::Timed, "timed_task".into())));
        assert_eq!(pop(&scheduler), Some((QueueKind::Lazy, "lazy_task".into())));
        assert_eq!(pop(&scheduler), None);
    }

    #[test]
    fn test_timed_task_waits_for_due_time() {
        let clock = Arc::new(ManualClock::new(0.0));
        let scheduler = manual_scheduler(clock.clone());
        let ping = scheduler.register("ping", |_, _| Ok(()));

        ping.timed(Duration::from_secs(3600), vec!["later".into()]);
        assert_eq!(pop(&scheduler), None);

        clock.advance(Duration::from_secs(3599));
        assert_eq!(pop(&scheduler), None);

        clock.advance(Duration::from_secs(1));
        assert_eq!(pop(&scheduler), Some((QueueKind::Timed, "ping".into())));
    }

    #[test]
    fn test_future_timed_task_does_not_block_lazy() {
        let clock = Arc::new(ManualClock::new(0.0));
        let scheduler = manual_scheduler(clock);
        let a = scheduler.register("a", |_, _| Ok(()));
        let b = scheduler.register("b", |_, _| Ok(()));

        a.timed(Duration::from_secs(60), vec![]);
        b.lazy(vec![]);
        assert_eq!(pop(&scheduler), Some((QueueKind::Lazy, "b".into())));
    }

    #[test]
    fn test_timed_reschedule_only_pulls_forward() {
        let clock = Arc::new(ManualClock::new(0.0));
        let scheduler = manual_scheduler(clock);
        let refresh = scheduler.register("refresh", |_, _| Ok(()));

        assert!(refresh.timed(Duration::from_secs(600), vec![]));
        assert!(!refresh.timed(Duration::from_secs(900), vec![]));
        assert!(refresh.timed(Duration::from_secs(60), vec![]));

        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.queue.len(), 1);
        assert_eq!(snapshot.queue[0].time, DueTime::At(60.0));
    }

    #[test]
    fn test_snapshot_orders_asap_lazy_then_timed() {
        let clock = Arc::new(ManualClock::new(0.0));
        let scheduler = manual_scheduler(clock);
        let t = scheduler.register("t", |_, _| Ok(()));

        t.timed(Duration::from_secs(20), vec!["t2".into()]);
        t.lazy(vec!["l".into()]);
        t.timed(Duration::from_secs(10), vec!["t1".into()]);
        t.asap(vec!["a".into()]);

        let kinds: Vec<QueueKind> = scheduler
            .snapshot()
            .queue
            .iter()
            .map(|r| r.time.queue())
            .collect();
        assert_eq!(
            kinds,
            vec![QueueKind::Asap, QueueKind::Lazy, QueueKind::Timed, QueueKind::Timed]
        );
        let timed_args: Vec<Value> = scheduler.snapshot().queue[2..]
            .iter()
            .map(|r| r.arguments[0].clone())
            .collect();
        assert_eq!(timed_args, vec![Value::from("t1"), Value::from("t2")]);
    }

    #[test]
    fn test_save_and_load_without_file_are_noops() {
        let scheduler = Scheduler::new();
        assert!(scheduler.save().is_ok());
        assert_eq!(scheduler.load().unwrap(), 0);
    }

    struct SlowCodec(Duration);

    impl ArgumentCodec for SlowCodec {
        fn decode(&self, args: &[Value]) -> std::result::Result<Vec<Arg>, CodecError> {
            std::thread::sleep(self.0);
            IdentityCodec.decode(args)
        }
    }

    #[test]
    fn test_stop_during_load_cancels_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        std::fs::write(
            &path,
            r#"{"queue": [{"time": "lazy", "action": "ping", "arguments": []}]}"#,
        )
        .unwrap();

        let scheduler = Scheduler::builder()
            .schedule_file(&path)
            .codec(Arc::new(SlowCodec(Duration::from_millis(300))))
            .poll_interval(Duration::from_millis(10))
            .build();
        scheduler.register("ping", |_, _| Ok(()));

        let starter = {
            let scheduler = scheduler.clone();
            std::thread::spawn(move || scheduler.start())
        };
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(scheduler.state(), SchedulerState::Starting);

        scheduler.stop();
        starter.join().unwrap().unwrap();
        scheduler.join();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(scheduler.inner.worker.lock().is_none());

        // The cancelled start leaves the scheduler startable.
        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        scheduler.stop();
        scheduler.join();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_start_and_stop_change_state() {
        let scheduler = Scheduler::builder()
            .poll_interval(Duration::from_millis(10))
            .build();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        scheduler.start().unwrap();

        scheduler.stop();
        scheduler.join();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
