use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::SchedulerOptions;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub shows: ShowsConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataConfig {
    /// Directory holding the schedule and shows files. `~` is expanded.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.local/share/tvnab")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Schedule file, relative to the data directory unless absolute.
    #[serde(default = "default_schedule_file")]
    pub schedule_file: PathBuf,

    /// How often the worker re-checks its queues when idle (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,

    /// Minimum time between periodic schedule saves (seconds)
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: f64,
}

fn default_schedule_file() -> PathBuf {
    PathBuf::from("schedule.json")
}
fn default_poll_interval() -> f64 {
    1.0
}
fn default_save_interval() -> f64 {
    1.0
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_file: default_schedule_file(),
            poll_interval_secs: default_poll_interval(),
            save_interval_secs: default_save_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShowsConfig {
    /// Shows file, relative to the data directory unless absolute.
    #[serde(default = "default_shows_file")]
    pub file: PathBuf,
}

fn default_shows_file() -> PathBuf {
    PathBuf::from("shows.json")
}

impl Default for ShowsConfig {
    fn default() -> Self {
        Self {
            file: default_shows_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TasksConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    #[serde(default = "default_download_check_interval")]
    pub download_check_interval_secs: u64,

    /// Delay before retrying a file that is not ready to be renamed
    #[serde(default = "default_rename_retry")]
    pub rename_retry_secs: u64,
}

fn default_refresh_interval() -> u64 {
    60 * 60
}
fn default_update_interval() -> u64 {
    7 * 24 * 60 * 60
}
fn default_download_check_interval() -> u64 {
    15
}
fn default_rename_retry() -> u64 {
    5 * 60
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            update_interval_secs: default_update_interval(),
            download_check_interval_secs: default_download_check_interval(),
            rename_retry_secs: default_rename_retry(),
        }
    }
}

impl TasksConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn download_check_interval(&self) -> Duration {
        Duration::from_secs(self.download_check_interval_secs)
    }

    pub fn rename_retry(&self) -> Duration {
        Duration::from_secs(self.rename_retry_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Reload the configuration when the config file changes
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand(&self.data.dir)
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.data_dir().join(expand(&self.scheduler.schedule_file))
    }

    pub fn shows_path(&self) -> PathBuf {
        self.data_dir().join(expand(&self.shows.file))
    }

    /// Scheduler options for this config. Intervals that fail validation fall
    /// back to the scheduler defaults.
    pub fn scheduler_options(&self) -> SchedulerOptions {
        let defaults = SchedulerOptions::default();
        SchedulerOptions {
            schedule_file: Some(self.schedule_path()),
            poll_interval: Duration::try_from_secs_f64(self.scheduler.poll_interval_secs)
                .unwrap_or(defaults.poll_interval),
            save_interval: Duration::try_from_secs_f64(self.scheduler.save_interval_secs)
                .unwrap_or(defaults.save_interval),
        }
    }
}

fn expand(path: &std::path::Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}
