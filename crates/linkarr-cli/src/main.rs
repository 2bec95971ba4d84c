mod commands;
mod database;
mod logging;
mod progress;
mod prompt;

use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::Cli;
use dotenv::dotenv;
use linkarr_core::config::{load_configuration, AppConfig};
use linkarr_core::reconcile::spawn_reconciliation;
use linkarr_core::resolver::FilenameResolver;
use linkarr_core::storage::{Database, StateRecorder};
use linkarr_core::{Coordinator, Error, SyncContext, SyncEngine, SyncReporter};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    if let Some(action) = args.database_action() {
        return database::run_action(&config, action);
    }

    let options = args.run_options();
    let dest_root = match options
        .validate()
        .and_then(|_| config.validate(options.single_path.as_deref()))
    {
        Ok(dest_root) => dest_root,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let recorder: Arc<dyn StateRecorder> = match open_database(&config) {
        Ok(db) => Arc::new(db),
        Err(err) => {
            error!("Error opening state database: {}", err);
            process::exit(1);
        }
    };

    let context = SyncContext::new(config);
    let engine = match SyncEngine::new(
        context.clone(),
        Arc::new(FilenameResolver::new()),
        Arc::clone(&recorder),
    ) {
        Ok(engine) => engine,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let coordinator = Arc::new(Coordinator::new(&context));
    {
        let coordinator = Arc::clone(&coordinator);
        ctrlc::set_handler(move || {
            warn!("Interrupted, shutting down");
            coordinator.shutdown();
            process::exit(0);
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    let monitor = !args.disable_monitor
        && match coordinator.try_become_monitor() {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!("Could not take the monitor lock: {}", err);
                false
            }
        };

    let reconciliation = if monitor {
        match spawn_reconciliation(
            Arc::clone(&recorder),
            dest_root.clone(),
            context.config.source_dirs.clone(),
            context.cancel.clone(),
        ) {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("Could not start reconciliation: {}", err);
                None
            }
        }
    } else {
        None
    };

    let watcher = if monitor {
        match coordinator.start_watcher() {
            Ok(pid) => pid,
            Err(err) => {
                error!("Failed to start watcher: {}", err);
                None
            }
        }
    } else {
        None
    };

    let reporter = CliReporter::new();
    match engine.run(options, &reporter) {
        Ok(result) => {
            println!();
            info!(
                "Index: {}, Sync: {}, Mode: {:?}",
                format!("{:.2}s", result.index_duration.as_secs_f64()).green(),
                format!("{:.2}s", result.sync_duration.as_secs_f64()).green(),
                result.mode,
            );
            info!(
                "{} linked, {} adopted, {} renamed, {} unchanged",
                format!("{}", result.linked).green(),
                format!("{}", result.adopted).cyan(),
                format!("{}", result.renamed).cyan(),
                format!("{}", result.unchanged).cyan(),
            );
            info!(
                "{} skipped, {} failed",
                format!("{}", result.skipped).yellow(),
                format!("{}", result.failed).red(),
            );
        }
        Err(Error::Configuration(msg)) => {
            error!("Configuration error: {}", msg);
            coordinator.shutdown();
            process::exit(1);
        }
        Err(err) => {
            error!("Synchronization stopped: {}", err);
            coordinator.shutdown();
        }
    }

    if let Some(handle) = reconciliation {
        match handle.join() {
            Ok(Ok(report)) => {
                reporter.on_reconcile_complete(report.removed_records, report.pending_relink)
            }
            Ok(Err(err)) => error!("Reconciliation failed: {}", err),
            Err(_) => error!("Reconciliation thread panicked"),
        }
    }

    if let Some(pid) = watcher {
        info!("Watcher running (pid {}), press Ctrl+C to stop", pid);
        coordinator.wait();
    }

    coordinator.shutdown();
    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database, Error> {
    let path = config.state_db_path.to_string_lossy();
    Ok(Database::open(&path)?)
}
