use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::WatchConfig;
use crate::scheduler::Schedulable;

/// Watches the config file and schedules a reload whenever it changes
pub struct ConfigWatcher {
    config: WatchConfig,
    path: PathBuf,
    load_config: Schedulable,
    watcher: Option<RecommendedWatcher>,
}

impl ConfigWatcher {
    pub fn new(config: WatchConfig, path: impl Into<PathBuf>, load_config: Schedulable) -> Self {
        Self {
            config,
            path: path.into(),
            load_config,
            watcher: None,
        }
    }

    /// Start watching the directory holding the config file
    pub fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("Config watcher is disabled");
            return Ok(());
        }

        let Some(file_name) = self.path.file_name().map(OsString::from) else {
            anyhow::bail!("Config path has no file name: {:?}", self.path);
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let load_config = self.load_config.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_config_event(&event, &file_name) {
                        tracing::debug!("Config file changed: {:?}", event.paths);
                        load_config.asap(vec![]);
                    }
                }
                Err(e) => tracing::warn!("Config watcher error: {}", e),
            },
            Config::default(),
        )
        .context("Failed to create config watcher")?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch path: {:?}", dir))?;
        tracing::info!("Watching config file: {:?}", self.path);

        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop watching
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            tracing::info!("Config watcher stopped");
        }
    }
}

/// Whether `event` creates or modifies a file called `file_name`.
fn is_config_event(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_changes_to_the_config_file_count() {
        let name = OsString::from("tvnab.toml");

        assert!(is_config_event(
            &event(EventKind::Modify(ModifyKind::Any), "/etc/tvnab/tvnab.toml"),
            &name
        ));
        assert!(is_config_event(
            &event(EventKind::Create(CreateKind::File), "/etc/tvnab/tvnab.toml"),
            &name
        ));
        assert!(!is_config_event(
            &event(EventKind::Remove(RemoveKind::File), "/etc/tvnab/tvnab.toml"),
            &name
        ));
        assert!(!is_config_event(
            &event(EventKind::Modify(ModifyKind::Any), "/etc/tvnab/schedule.json"),
            &name
        ));
    }

    #[test]
    fn test_disabled_watcher_does_nothing() {
        let scheduler = Scheduler::new();
        let load_config = scheduler.register("load_config", |_, _| Ok(()));
        let mut watcher = ConfigWatcher::new(
            WatchConfig { enabled: false },
            "/nonexistent/tvnab.toml",
            load_config,
        );

        watcher.start().unwrap();
        assert!(!watcher.is_watching());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let scheduler = Scheduler::new();
        let load_config = scheduler.register("load_config", |_, _| Ok(()));
        let mut watcher = ConfigWatcher::new(
            WatchConfig::default(),
            "/nonexistent/tvnab/tvnab.toml",
            load_config,
        );

        assert!(watcher.start().is_err());
        assert!(!watcher.is_watching());
    }
}
