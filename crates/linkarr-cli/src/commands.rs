use crate::database::DatabaseAction;
use clap::{Parser, ValueEnum};
use linkarr_core::task::{parse_season_episode, Identifiers};
use linkarr_core::{IndexMode, RunOptions};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Scan the destination tree for existing links
    Batch,
    /// Use the persisted link index (watcher-triggered passes)
    Watch,
}

#[derive(Debug, Parser)]
#[command(name = "linkarr")]
#[command(about = "Organize a media library into a symlinked destination tree", long_about = None)]
pub struct Cli {
    /// Process only this file or directory
    pub single_path: Option<PathBuf>,

    /// Discard earlier results and relink
    #[arg(long)]
    pub force: bool,

    /// Treat files as TV shows
    #[arg(long)]
    pub force_show: bool,

    /// Treat files as movies
    #[arg(long)]
    pub force_movie: bool,

    /// Link extras even when extras are configured to be skipped
    #[arg(long)]
    pub force_extra: bool,

    /// Pick the first catalog match without prompting
    #[arg(long)]
    pub auto_select: bool,

    /// Do not start the watcher or take the monitor lock
    #[arg(long)]
    pub disable_monitor: bool,

    /// Record the given path as skipped
    #[arg(long)]
    pub skip: bool,

    /// Season and episode override, e.g. S03E15
    #[arg(long, value_parser = parse_season_episode_arg)]
    pub season_episode: Option<(u32, u32)>,

    #[arg(long)]
    pub imdb: Option<String>,

    #[arg(long)]
    pub tmdb: Option<u64>,

    #[arg(long)]
    pub tvdb: Option<u64>,

    /// Where the destination index comes from
    #[arg(long, value_enum, default_value_t = ModeArg::Batch)]
    pub mode: ModeArg,

    /// Print state statistics and exit
    #[arg(long, help_heading = "Database")]
    pub status: bool,

    /// Delete every record after confirmation
    #[arg(long, help_heading = "Database")]
    pub reset: bool,

    /// Reclaim unused space in the state database
    #[arg(long, help_heading = "Database")]
    pub vacuum: bool,

    /// Run an integrity check on the state database
    #[arg(long, help_heading = "Database")]
    pub verify: bool,

    /// Refresh query planner statistics
    #[arg(long, help_heading = "Database")]
    pub optimize: bool,

    /// Export records to a CSV file
    #[arg(long, value_name = "FILE", help_heading = "Database")]
    pub export: Option<PathBuf>,

    /// Import records from a CSV file
    #[arg(long = "import", value_name = "FILE", help_heading = "Database")]
    pub import_file: Option<PathBuf>,

    /// List records whose paths or id contain PATTERN
    #[arg(long, value_name = "PATTERN", help_heading = "Database")]
    pub search: Option<String>,
}

fn parse_season_episode_arg(value: &str) -> Result<(u32, u32), String> {
    parse_season_episode(value).ok_or_else(|| format!("expected SxxEyy, got '{}'", value))
}

impl Cli {
    /// The first database maintenance flag given, if any.
    pub fn database_action(&self) -> Option<DatabaseAction> {
        if self.vacuum {
            Some(DatabaseAction::Vacuum)
        } else if self.verify {
            Some(DatabaseAction::Verify)
        } else if let Some(file) = &self.export {
            Some(DatabaseAction::Export(file.clone()))
        } else if let Some(file) = &self.import_file {
            Some(DatabaseAction::Import(file.clone()))
        } else if let Some(pattern) = &self.search {
            Some(DatabaseAction::Search(pattern.clone()))
        } else if self.optimize {
            Some(DatabaseAction::Optimize)
        } else if self.reset {
            Some(DatabaseAction::Reset)
        } else if self.status {
            Some(DatabaseAction::Status)
        } else {
            None
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            single_path: self.single_path.clone(),
            force: self.force,
            force_show: self.force_show,
            force_movie: self.force_movie,
            force_extra: self.force_extra,
            auto_select: self.auto_select,
            skip: self.skip,
            identifiers: Identifiers {
                imdb: self.imdb.clone(),
                tmdb: self.tmdb,
                tvdb: self.tvdb,
            },
            season: self.season_episode.map(|(season, _)| season),
            episode: self.season_episode.map(|(_, episode)| episode),
            mode: match self.mode {
                ModeArg::Batch => IndexMode::Batch,
                ModeArg::Watch => IndexMode::Watch,
            },
        }
    }
}
