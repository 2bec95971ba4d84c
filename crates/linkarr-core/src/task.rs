use crate::config::AppConfig;
use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

lazy_static! {
    static ref SEASON_EPISODE_ARG: Regex = Regex::new(r"^S(\d{1,2})E(\d{1,3})").unwrap();
}

/// A file discovered by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
    pub parent_dir: String,
}

impl SourceFile {
    pub fn new(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        SourceFile {
            path: path.to_path_buf(),
            file_name,
            parent_dir,
        }
    }
}

/// Explicit catalog identifiers supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    pub imdb: Option<String>,
    pub tmdb: Option<u64>,
    pub tvdb: Option<u64>,
}

impl Identifiers {
    pub fn is_empty(&self) -> bool {
        self.imdb.is_none() && self.tmdb.is_none() && self.tvdb.is_none()
    }

    /// Canonical id string in the form stored by the state recorder.
    pub fn canonical(&self) -> Option<String> {
        if let Some(tmdb) = self.tmdb {
            return Some(format!("tmdb-{}", tmdb));
        }
        if let Some(imdb) = &self.imdb {
            return Some(format!("imdb-{}", imdb));
        }
        self.tvdb.map(|tvdb| format!("tvdb-{}", tvdb))
    }
}

/// Where the destination index snapshot comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Walk the destination tree.
    #[default]
    Batch,
    /// Read the persisted state instead of walking.
    Watch,
}

/// Flags for one invocation. Shared read-only by every task in the batch.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub single_path: Option<PathBuf>,
    pub force: bool,
    pub force_show: bool,
    pub force_movie: bool,
    pub force_extra: bool,
    pub auto_select: bool,
    pub skip: bool,
    pub identifiers: Identifiers,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub mode: IndexMode,
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.force_show && self.force_movie {
            return Err(Error::Configuration(
                "cannot use --force-show and --force-movie together".into(),
            ));
        }
        Ok(())
    }
}

/// Parse `SxxEyy` (case-insensitive) into season and episode numbers.
pub fn parse_season_episode(value: &str) -> Option<(u32, u32)> {
    let upper = value.trim().to_uppercase();
    let captures = SEASON_EPISODE_ARG.captures(&upper)?;
    Some((captures[1].parse().ok()?, captures[2].parse().ok()?))
}

/// Library layout settings captured once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub rename_enabled: bool,
    pub tmdb_folder_id: bool,
    pub skip_extras: bool,
}

impl From<&AppConfig> for LinkSettings {
    fn from(config: &AppConfig) -> Self {
        LinkSettings {
            rename_enabled: config.rename_enabled,
            tmdb_folder_id: config.tmdb_folder_id,
            skip_extras: config.skip_extras_folder,
        }
    }
}

/// Everything needed to process one source file.
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pub source: SourceFile,
    pub dest_root: PathBuf,
    /// Name of the source root the file was found under.
    pub actual_dir: String,
    pub settings: LinkSettings,
    pub options: Arc<RunOptions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_season_episode() {
        assert_eq!(parse_season_episode("S03E15"), Some((3, 15)));
        assert_eq!(parse_season_episode("s1e102"), Some((1, 102)));
        assert_eq!(parse_season_episode("3x15"), None);
    }

    #[test]
    fn test_conflicting_force_flags_rejected() {
        let options = RunOptions {
            force_show: true,
            force_movie: true,
            ..RunOptions::default()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_source_file_parts() {
        let file = SourceFile::new(Path::new("/src/Show/Season 01/ep.mkv"));
        assert_eq!(file.file_name, "ep.mkv");
        assert_eq!(file.parent_dir, "Season 01");
    }

    #[test]
    fn test_canonical_identifier_prefers_tmdb() {
        let ids = Identifiers {
            imdb: Some("tt0111161".into()),
            tmdb: Some(278),
            tvdb: None,
        };
        assert_eq!(ids.canonical().as_deref(), Some("tmdb-278"));
        assert_eq!(Identifiers::default().canonical(), None);
    }
}
