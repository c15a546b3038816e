mod cli;

use tvnab::{
    config,
    scheduler::{persist, EntityCodec, Scheduler, ScheduledTask},
    shows::ShowTree,
    tasks::{self, TaskEnv},
    watch::ConfigWatcher,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

fn start(config_path: Option<&Path>, clean_start: bool) -> Result<()> {
    let resolved_config_path = config::find_config(config_path);
    let config = config::load_config_or_default(config_path)?;

    if clean_start {
        clean(&config)?;
    }

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    let shows_path = config.shows_path();
    let shows = Arc::new(
        ShowTree::open(&shows_path)
            .with_context(|| format!("Failed to load shows file: {:?}", shows_path))?,
    );
    tracing::info!("Tracking {} shows", shows.len());

    let scheduler = Scheduler::builder()
        .options(config.scheduler_options())
        .codec(Arc::new(EntityCodec::new(Arc::clone(&shows))))
        .build();

    let env = TaskEnv::new(
        config.clone(),
        resolved_config_path.clone(),
        Arc::clone(&shows),
    );
    let default_tasks = tasks::register_default_tasks(&scheduler, &env);

    scheduler.start()?;
    default_tasks.seed(&config.tasks);

    let mut watcher = resolved_config_path.map(|path| {
        ConfigWatcher::new(config.watch.clone(), path, default_tasks.load_config.clone())
    });
    if let Some(watcher) = watcher.as_mut() {
        if let Err(e) = watcher.start() {
            tracing::warn!("Config changes will not be picked up: {:#}", e);
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(wait_for_shutdown(&scheduler));

    // Cleanup
    tracing::info!("Shutting down...");
    if let Some(watcher) = watcher.as_mut() {
        watcher.stop();
    }
    scheduler.stop();
    scheduler.join();

    if let Err(e) = shows.save() {
        tracing::error!("Failed to save shows: {}", e);
    }

    result
}

/// Trace scheduler events until Ctrl-C.
async fn wait_for_shutdown(scheduler: &Scheduler) -> Result<()> {
    let mut events = scheduler.subscribe();

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => tracing::trace!(?event, "Scheduler event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::trace!("Skipped {} scheduler events", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn show_schedule(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let path = config.schedule_path();

    let Some(schedule) = persist::read_schedule(&path)
        .with_context(|| format!("Failed to read schedule file: {:?}", path))?
    else {
        println!("No schedule file at {}", path.display());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    if schedule.queue.is_empty() {
        println!("No scheduled tasks");
        return Ok(());
    }

    for record in &schedule.queue {
        let when = if record.tstr.is_empty() {
            record.time.describe()
        } else {
            record.tstr.clone()
        };
        let task = ScheduledTask::new(record.action.as_str(), record.arguments.clone());
        println!("{:<26} {}", when, task);
    }
    println!("{} scheduled tasks", schedule.queue.len());

    Ok(())
}

fn clean(config: &config::Config) -> Result<()> {
    for path in [config.schedule_path(), config.shows_path()] {
        match std::fs::remove_file(&path) {
            Ok(()) => println!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {:?}", path));
            }
        }
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_summary(&config::Config::default());
        }
    }

    Ok(())
}

fn print_summary(config: &config::Config) {
    println!("  Data directory: {}", config.data_dir().display());
    println!("  Schedule file: {}", config.schedule_path().display());
    println!("  Shows file: {}", config.shows_path().display());
    println!(
        "  Poll interval: {}s",
        config.scheduler.poll_interval_secs
    );
    println!(
        "  Refresh every {}s, update shows every {}s, check downloads every {}s",
        config.tasks.refresh_interval_secs,
        config.tasks.update_interval_secs,
        config.tasks.download_check_interval_secs
    );
    println!("  Watch config: {}", config.watch.enabled);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tvnab=trace,tvnab_common=debug".to_string()
        } else {
            "tvnab=info,tvnab_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { clean } => start(cli.config.as_deref(), clean),
        Commands::Schedule { json } => show_schedule(cli.config.as_deref(), json),
        Commands::Clean => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            clean(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("tvnab {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
