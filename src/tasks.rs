//! The background tasks tvnab schedules and the initial schedule.
//!
//! Each task reschedules itself, so after [`DefaultTasks::seed`] the
//! schedule keeps itself populated. Searching for files, downloading and
//! renaming are left to plugins; these tasks only drive the cycle.

use anyhow::{anyhow, Context};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tvnab_common::paths::{is_partial_download, is_video_file};
use tvnab_common::Value;

use crate::config::{self, Config, TasksConfig};
use crate::scheduler::{Arg, Priority, Schedulable, Scheduler, TaskContext};
use crate::shows::{Episode, Season, Show, ShowTree};

pub const REFRESH: &str = "refresh";
pub const UPDATE_SHOWS: &str = "update_shows";
pub const CHECK_DOWNLOADS: &str = "check_downloads";
pub const RENAME_FILE: &str = "rename_file";
pub const LOAD_CONFIG: &str = "load_config";
pub const FIND_FILE: &str = "find_file";

/// Shared state the default tasks work on.
pub struct TaskEnv {
    config: RwLock<Config>,
    config_path: Option<PathBuf>,
    shows: Arc<ShowTree>,
    completed: Mutex<Vec<PathBuf>>,
}

impl TaskEnv {
    pub fn new(config: Config, config_path: Option<PathBuf>, shows: Arc<ShowTree>) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            config_path,
            shows,
            completed: Mutex::new(Vec::new()),
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn shows(&self) -> &Arc<ShowTree> {
        &self.shows
    }

    /// Record a finished download. The next `check_downloads` run queues
    /// its file for renaming.
    pub fn download_completed(&self, path: impl Into<PathBuf>) {
        self.completed.lock().push(path.into());
    }

    fn tasks_config(&self) -> TasksConfig {
        self.config.read().tasks.clone()
    }
}

/// Handles for every default task.
#[derive(Debug, Clone)]
pub struct DefaultTasks {
    pub refresh: Schedulable,
    pub update_shows: Schedulable,
    pub check_downloads: Schedulable,
    pub rename_file: Schedulable,
    pub load_config: Schedulable,
    pub find_file: Schedulable,
}

impl DefaultTasks {
    /// Queue the work tvnab does on every start. Anything already restored
    /// from the schedule file is deduplicated.
    pub fn seed(&self, tasks: &TasksConfig) {
        self.refresh.asap(vec![]);
        self.update_shows.timed(tasks.update_interval(), vec![]);
        self.check_downloads.asap(vec![]);
    }
}

/// Register the default tasks on `scheduler`.
pub fn register_default_tasks(scheduler: &Scheduler, env: &Arc<TaskEnv>) -> DefaultTasks {
    let refresh = {
        let env = Arc::clone(env);
        scheduler.register(REFRESH, move |ctx, _| refresh_task(&env, ctx))
    };
    let update_shows = {
        let env = Arc::clone(env);
        scheduler.register(UPDATE_SHOWS, move |ctx, _| {
            ctx.reschedule(Priority::Timed(env.tasks_config().update_interval()), &[]);
            info!(shows = env.shows.len(), "Updating show data");
            Ok(())
        })
    };
    let check_downloads = {
        let env = Arc::clone(env);
        scheduler.register(CHECK_DOWNLOADS, move |ctx, _| {
            check_downloads_task(&env, ctx)
        })
    };
    let rename_file = {
        let env = Arc::clone(env);
        scheduler.register(RENAME_FILE, move |ctx, args| {
            rename_file_task(&env, ctx, args)
        })
    };
    let load_config = {
        let env = Arc::clone(env);
        scheduler.register(LOAD_CONFIG, move |_, _| load_config_task(&env))
    };
    let find_file = {
        let env = Arc::clone(env);
        scheduler.register(FIND_FILE, move |ctx, args| find_file_task(&env, ctx, args))
    };

    DefaultTasks {
        refresh,
        update_shows,
        check_downloads,
        rename_file,
        load_config,
        find_file,
    }
}

fn refresh_task(env: &TaskEnv, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
    ctx.reschedule(Priority::Timed(env.tasks_config().refresh_interval()), &[]);

    let titles = env.shows.titles();
    for title in &titles {
        if let Some(show) = env.shows.get(title) {
            ctx.scheduler()
                .enqueue(FIND_FILE, Priority::Lazy, &[Arg::from(show), Value::from(true).into()]);
        }
    }

    env.shows.save().context("Failed to save shows")?;
    info!(shows = titles.len(), "Refreshed shows");
    Ok(())
}

fn check_downloads_task(env: &TaskEnv, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
    ctx.reschedule(
        Priority::Timed(env.tasks_config().download_check_interval()),
        &[],
    );

    let completed = std::mem::take(&mut *env.completed.lock());
    for path in completed {
        debug!(path = %path.display(), "Download completed");
        ctx.scheduler().enqueue(
            RENAME_FILE,
            Priority::Asap,
            &[Arg::from(path.to_string_lossy().into_owned())],
        );
    }
    Ok(())
}

fn rename_file_task(env: &TaskEnv, ctx: &TaskContext<'_>, args: &[Arg]) -> anyhow::Result<()> {
    let path = args
        .first()
        .and_then(Arg::as_str)
        .ok_or_else(|| anyhow!("{RENAME_FILE} expects a path argument"))?;
    let path = Path::new(path);

    if !path.exists() || is_partial_download(path) {
        let retry = env.tasks_config().rename_retry();
        debug!(path = %path.display(), retry_secs = retry.as_secs(), "File not ready, retrying later");
        ctx.reschedule(Priority::Timed(retry), args);
        return Ok(());
    }

    if !is_video_file(path) {
        debug!(path = %path.display(), "Ignoring non-video file");
        return Ok(());
    }

    info!(path = %path.display(), "File ready to be renamed");
    Ok(())
}

fn load_config_task(env: &TaskEnv) -> anyhow::Result<()> {
    let Some(path) = env.config_path.as_deref() else {
        debug!("No config file to reload");
        return Ok(());
    };

    let config = config::load_config(path)?;
    *env.config.write() = config;
    info!(path = %path.display(), "Reloaded configuration");
    Ok(())
}

/// Search for files for a show, season or episode. Shows and seasons fan out
/// to their children, newest first.
fn find_file_task(env: &TaskEnv, ctx: &TaskContext<'_>, args: &[Arg]) -> anyhow::Result<()> {
    let entry = args
        .first()
        .and_then(Arg::as_entity)
        .ok_or_else(|| anyhow!("{FIND_FILE} expects a show, season or episode"))?;
    let reschedule = args
        .get(1)
        .and_then(Arg::as_value)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    info!(entry = %entry.id(), "Searching for files");

    let flag = Arg::from(Value::from(reschedule));
    if let Some(show) = entry.as_any().downcast_ref::<Show>() {
        for season in show.seasons.values().rev() {
            ctx.reschedule(Priority::Lazy, &[Arg::from(Arc::clone(season)), flag.clone()]);
        }
    } else if let Some(season) = entry.as_any().downcast_ref::<Season>() {
        for episode in season.episodes.values().rev() {
            ctx.reschedule(Priority::Lazy, &[Arg::from(Arc::clone(episode)), flag.clone()]);
        }
    } else if entry.as_any().is::<Episode>() && reschedule {
        ctx.reschedule(
            Priority::Timed(env.tasks_config().refresh_interval()),
            args,
        );
    }
    Ok(())
}
