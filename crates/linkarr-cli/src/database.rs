use std::path::PathBuf;

use anyhow::{bail, Context};
use colored::*;
use linkarr_core::config::AppConfig;
use linkarr_core::storage::{Database, StateRecorder};
use tracing::{error, info};

use crate::prompt::prompt_confirm;

/// Maintenance operations on the state database. Each one runs and exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseAction {
    Status,
    Reset,
    Vacuum,
    Verify,
    Optimize,
    Export(PathBuf),
    Import(PathBuf),
    Search(String),
}

pub fn run_action(config: &AppConfig, action: DatabaseAction) -> anyhow::Result<()> {
    let path = config.state_db_path.to_string_lossy();
    let db = Database::open(&path).context("Failed to open state database")?;

    match action {
        DatabaseAction::Status => print_status(config, &db)?,
        DatabaseAction::Reset => {
            let confirmed = prompt_confirm(
                "This deletes every record in the state database. Continue?",
                Some(false),
            )?;
            if confirmed {
                db.reset().context("Failed to reset state database")?;
                info!("{}", "State database reset".green());
            } else {
                info!("Reset cancelled");
            }
        }
        DatabaseAction::Vacuum => {
            db.vacuum().context("Failed to vacuum state database")?;
            info!("{}", "State database vacuumed".green());
        }
        DatabaseAction::Verify => {
            let messages = db.integrity_check().context("Failed to verify state database")?;
            if messages.len() == 1 && messages[0] == "ok" {
                info!("{}", "State database integrity check passed".green());
            } else {
                for message in &messages {
                    error!("{}", message);
                }
                bail!("integrity check reported {} problem(s)", messages.len());
            }
        }
        DatabaseAction::Optimize => {
            db.optimize().context("Failed to optimize state database")?;
            info!("{}", "State database optimized".green());
        }
        DatabaseAction::Export(file) => {
            let count = db
                .export_csv(&file)
                .with_context(|| format!("Failed to export to {}", file.display()))?;
            info!("Exported {} records to {}", count, file.display());
        }
        DatabaseAction::Import(file) => {
            let count = db
                .import_csv(&file)
                .with_context(|| format!("Failed to import from {}", file.display()))?;
            info!("Imported {} records from {}", count, file.display());
        }
        DatabaseAction::Search(pattern) => {
            let records = db.search(&pattern).context("Failed to search state database")?;
            if records.is_empty() {
                info!("No records match '{}'", pattern);
            }
            for record in records {
                let outcome = match (&record.destination_path, &record.skip_reason) {
                    (Some(destination), _) => destination.display().to_string().green(),
                    (None, Some(reason)) => format!("skipped: {}", reason.as_str()).yellow(),
                    (None, None) => "unresolved".normal(),
                };
                println!("{} -> {}", record.source_path.display(), outcome);
            }
        }
    }
    Ok(())
}

fn print_status(config: &AppConfig, db: &Database) -> anyhow::Result<()> {
    let stats = db.stats().context("Failed to read state statistics")?;
    println!("State database: {}", config.state_db_path.display());
    println!("  Records:       {}", format!("{}", stats.total_records).cyan());
    println!("  Linked:        {}", format!("{}", stats.linked_records).green());
    println!("  Skipped:       {}", format!("{}", stats.skipped_records).yellow());
    println!("  Tracked links: {}", format!("{}", stats.tracked_links).cyan());
    Ok(())
}
