//! Scheduler lifecycle tests
//!
//! Runs real worker threads against schedule files in scratch directories.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tvnab::scheduler::{
    persist, Arg, DueTime, EntityCodec, FifoTag, ManualClock, Priority, Schedulable, Scheduler,
    SchedulerEvent, SchedulerState,
};
use tvnab::shows::{Show, ShowRecord, ShowTree};
use tvnab_common::{EntityId, Value};

const START: f64 = 1_700_000_000.0;

type Calls = Arc<Mutex<Vec<String>>>;

fn scheduler(path: &Path, clock: Arc<ManualClock>) -> Scheduler {
    Scheduler::builder()
        .schedule_file(path)
        .clock(clock)
        .poll_interval(Duration::from_millis(10))
        .save_interval(Duration::from_millis(10))
        .build()
}

/// Register `name` as a task that records its first argument.
fn recorder(scheduler: &Scheduler, name: &str, calls: &Calls) -> Schedulable {
    let calls = Arc::clone(calls);
    let label = name.to_string();
    scheduler.register(name, move |_, args| {
        let arg = args
            .first()
            .and_then(Arg::as_str)
            .map(|s| format!("{label}:{s}"))
            .unwrap_or_else(|| label.clone());
        calls.lock().push(arg);
        Ok(())
    })
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn shutdown(scheduler: &Scheduler) {
    scheduler.stop();
    scheduler.join();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[test]
fn test_ping_runs_lazy_now_and_timed_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let calls: Calls = Arc::default();

    let clock = Arc::new(ManualClock::new(START));
    let first = scheduler(&path, Arc::clone(&clock));
    let ping = recorder(&first, "ping", &calls);
    assert!(ping.lazy(vec!["hello".into()]));
    assert!(ping.timed(Duration::from_secs(3600), vec!["later".into()]));

    first.start().unwrap();
    wait_until("hello", || calls.lock().len() == 1);
    shutdown(&first);
    assert_eq!(*calls.lock(), vec!["ping:hello"]);

    let saved = persist::read_schedule(&path).unwrap().unwrap();
    assert_eq!(saved.queue.len(), 1);
    assert_eq!(saved.queue[0].time, DueTime::At(START + 3600.0));
    assert_eq!(saved.queue[0].arguments, vec![Value::from("later")]);

    // An hour later a fresh process picks the timed entry back up.
    let clock = Arc::new(ManualClock::new(START + 3600.0));
    let second = scheduler(&path, clock);
    recorder(&second, "ping", &calls);
    second.start().unwrap();
    wait_until("later", || calls.lock().len() == 2);
    shutdown(&second);

    assert_eq!(*calls.lock(), vec!["ping:hello", "ping:later"]);
    let saved = persist::read_schedule(&path).unwrap().unwrap();
    assert!(saved.queue.is_empty());
}

#[test]
fn test_worker_honours_priorities() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(START));
    let scheduler = scheduler(&dir.path().join("schedule.json"), Arc::clone(&clock));
    let calls: Calls = Arc::default();
    let task = recorder(&scheduler, "task", &calls);

    task.lazy(vec!["lazy1".into()]);
    task.timed(Duration::from_secs(60), vec!["timed-later".into()]);
    task.timed(Duration::ZERO, vec!["timed-now".into()]);
    task.lazy(vec!["lazy2".into()]);
    task.asap(vec!["asap1".into()]);
    task.asap(vec!["asap2".into()]);

    scheduler.start().unwrap();
    wait_until("ready tasks", || calls.lock().len() == 5);

    // Not due yet, so it must still be waiting.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.lock().len(), 5);

    clock.advance(Duration::from_secs(60));
    wait_until("timed-later", || calls.lock().len() == 6);
    shutdown(&scheduler);

    assert_eq!(
        *calls.lock(),
        vec![
            "task:asap1",
            "task:asap2",
            "task:timed-now",
            "task:lazy1",
            "task:lazy2",
            "task:timed-later",
        ]
    );
}

#[test]
fn test_enqueue_wakes_idle_worker() {
    let scheduler = Scheduler::builder()
        .poll_interval(Duration::from_secs(60))
        .build();
    let calls: Calls = Arc::default();
    let ping = recorder(&scheduler, "ping", &calls);

    scheduler.start().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    ping.asap(vec!["now".into()]);
    wait_until("ping", || !calls.lock().is_empty());

    shutdown(&scheduler);
}

#[test]
fn test_tasks_can_reschedule_themselves() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let clock = Arc::new(ManualClock::new(START));
    let scheduler = scheduler(&path, Arc::clone(&clock));

    let runs = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&runs);
    scheduler.register("check_downloads", move |ctx, _| {
        *counter.lock() += 1;
        ctx.reschedule(Priority::Timed(Duration::from_secs(15)), &[]);
        Ok(())
    });
    scheduler
        .schedulable("check_downloads")
        .unwrap()
        .asap(vec![]);

    scheduler.start().unwrap();
    wait_until("first run", || *runs.lock() == 1);
    clock.advance(Duration::from_secs(15));
    wait_until("second run", || *runs.lock() == 2);
    shutdown(&scheduler);

    let saved = persist::read_schedule(&path).unwrap().unwrap();
    assert_eq!(saved.queue.len(), 1);
    assert_eq!(saved.queue[0].time, DueTime::At(START + 30.0));
}

#[test]
fn test_failing_tasks_do_not_stop_the_worker() {
    let scheduler = Scheduler::builder()
        .poll_interval(Duration::from_millis(10))
        .build();
    let calls: Calls = Arc::default();
    let mut events = scheduler.subscribe();

    scheduler.register("fail", |_, _| anyhow::bail!("no downloader configured"));
    scheduler.register("boom", |_, _| panic!("plugin crashed"));
    let ok = recorder(&scheduler, "ok", &calls);

    scheduler.schedulable("fail").unwrap().asap(vec![]);
    scheduler.schedulable("boom").unwrap().asap(vec![]);
    ok.asap(vec![]);

    scheduler.start().unwrap();
    wait_until("ok", || !calls.lock().is_empty());
    shutdown(&scheduler);

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::TaskFailed { action, error, .. } = event {
            failures.push((action, error));
        }
    }
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].0, "fail");
    assert!(failures[0].1.contains("no downloader configured"));
    assert_eq!(failures[1].0, "boom");
}

#[test]
fn test_stop_while_task_runs_keeps_waiting_work() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let scheduler = scheduler(&path, Arc::new(ManualClock::new(START)));
    let calls: Calls = Arc::default();

    let running = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&running);
    let slow = scheduler.register("slow", move |_, _| {
        *flag.lock() = true;
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    });
    let other = recorder(&scheduler, "other", &calls);
    slow.asap(vec![]);
    other.lazy(vec![]);

    scheduler.start().unwrap();
    wait_until("slow task", || *running.lock());

    let asked = Instant::now();
    scheduler.stop();
    assert!(asked.elapsed() < Duration::from_millis(100));
    assert_eq!(scheduler.state(), SchedulerState::Stopping);

    scheduler.join();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(calls.lock().is_empty());

    // The running task left its queue when it was popped.
    let saved = persist::read_schedule(&path).unwrap().unwrap();
    assert_eq!(saved.queue.len(), 1);
    assert_eq!(saved.queue[0].action, "other");
    assert_eq!(saved.queue[0].time, DueTime::Queue(FifoTag::Lazy));
}

#[test]
fn test_save_and_load_preserve_every_queue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let clock = Arc::new(ManualClock::new(START));
    let calls: Calls = Arc::default();

    let first = scheduler(&path, Arc::clone(&clock));
    let task = recorder(&first, "task", &calls);
    task.timed(Duration::from_secs(30), vec!["t2".into()]);
    task.asap(vec!["a1".into()]);
    task.lazy(vec!["l1".into()]);
    task.timed(Duration::from_secs(10), vec!["t1".into()]);
    task.asap(vec![Arg::from(Value::List(vec![Value::from(1i64), Value::Null]))]);
    task.lazy(vec!["l2".into()]);
    first.save().unwrap();

    let second = scheduler(&path, clock);
    recorder(&second, "task", &calls);
    assert_eq!(second.load().unwrap(), 6);
    assert_eq!(second.snapshot(), first.snapshot());

    // Loading again only finds duplicates.
    assert_eq!(second.load().unwrap(), 0);
    assert_eq!(second.pending_count(), 6);
}

#[test]
fn test_load_skips_unknown_actions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    std::fs::write(
        &path,
        r#"{"queue": [
            {"time": "asap", "action": "retired_plugin", "arguments": []},
            {"time": "lazy", "action": "refresh", "arguments": []}
        ]}"#,
    )
    .unwrap();

    let scheduler = scheduler(&path, Arc::new(ManualClock::new(START)));
    scheduler.register("refresh", |_, _| Ok(()));
    assert_eq!(scheduler.load().unwrap(), 1);
    assert_eq!(scheduler.snapshot().queue[0].time, DueTime::Queue(FifoTag::Lazy));
}

#[test]
fn test_corrupt_schedule_file_starts_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    std::fs::write(&path, "{\"queue\": [").unwrap();

    let scheduler = scheduler(&path, Arc::new(ManualClock::new(START)));
    assert!(scheduler.load().is_err());

    scheduler.start().unwrap();
    assert_eq!(scheduler.pending_count(), 0);
    shutdown(&scheduler);

    // The final save replaces the corrupt file.
    let saved = persist::read_schedule(&path).unwrap().unwrap();
    assert!(saved.queue.is_empty());
}

#[test]
fn test_entity_arguments_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let archer = ShowRecord::new("Archer").with_episode(1, 1, Some("Mole Hunt"));

    let shows = Arc::new(ShowTree::new());
    let show = shows.insert(&archer);
    let first = Scheduler::builder()
        .schedule_file(&path)
        .codec(Arc::new(EntityCodec::new(Arc::clone(&shows))))
        .build();
    first.register("find_file", |_, _| Ok(()));
    first
        .schedulable("find_file")
        .unwrap()
        .lazy(vec![Arg::from(show), Arg::from(Value::from(true))]);
    first.save().unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains("entity_ref"));

    // The show is gone: the entry is dropped at load.
    let empty = Scheduler::builder()
        .schedule_file(&path)
        .codec(Arc::new(EntityCodec::new(Arc::new(ShowTree::new()))))
        .build();
    empty.register("find_file", |_, _| Ok(()));
    assert_eq!(empty.load().unwrap(), 0);

    // The show is still tracked: the task gets the live entity back.
    let seen = Arc::new(Mutex::new(None));
    let shows = Arc::new(ShowTree::new());
    shows.insert(&archer);
    let second = Scheduler::builder()
        .schedule_file(&path)
        .poll_interval(Duration::from_millis(10))
        .codec(Arc::new(EntityCodec::new(Arc::clone(&shows))))
        .build();
    let sink = Arc::clone(&seen);
    second.register("find_file", move |_, args| {
        let show = args[0]
            .downcast::<Show>()
            .ok_or_else(|| anyhow::anyhow!("expected a show"))?;
        *sink.lock() = Some((show.title.clone(), show.episode_count()));
        Ok(())
    });

    second.start().unwrap();
    wait_until("find_file", || seen.lock().is_some());
    shutdown(&second);
    assert_eq!(*seen.lock(), Some(("Archer".to_string(), 1)));

    let id = EntityId::show("Archer");
    assert_eq!(shows.find(&id).unwrap().id(), id);
}
