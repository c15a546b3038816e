mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PATHS: [&str; 3] = [
    "./tvnab.toml",
    "~/.config/tvnab/config.toml",
    "/etc/tvnab/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// The config file that would be used: `custom_path` if given, else the first
/// default location that exists.
pub fn find_config(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    match find_config(custom_path) {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    for (name, secs) in [
        ("scheduler.poll_interval_secs", config.scheduler.poll_interval_secs),
        ("scheduler.save_interval_secs", config.scheduler.save_interval_secs),
    ] {
        if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
            anyhow::bail!("{} must be a positive number of seconds, got {}", name, secs);
        }
    }

    if config.tasks.download_check_interval_secs == 0 {
        anyhow::bail!("tasks.download_check_interval_secs cannot be 0");
    }
    if config.tasks.refresh_interval_secs == 0 {
        anyhow::bail!("tasks.refresh_interval_secs cannot be 0");
    }
    if config.tasks.update_interval_secs == 0 {
        anyhow::bail!("tasks.update_interval_secs cannot be 0");
    }

    if config.schedule_path() == config.shows_path() {
        anyhow::bail!(
            "Schedule file and shows file must differ: {:?}",
            config.schedule_path()
        );
    }

    let data_dir = config.data_dir();
    if !data_dir.exists() {
        tracing::warn!("Data directory does not exist yet: {:?}", data_dir);
    }

    Ok(())
}
