use crate::error::Error;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "m4v", "wmv", "mpg", "mpeg", "ts", "m2ts", "webm", "divx", "strm",
    "srt", "sub", "ass", "ssa",
];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source_dirs: Vec<PathBuf>,
    pub destination_dir: Option<PathBuf>,
    pub rename_enabled: bool,
    pub tmdb_folder_id: bool,
    pub skip_extras_folder: bool,
    /// Video files smaller than this size are treated as junk (samples, trailers).
    pub junk_max_size_mb: u64,
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Appended to the built-in anime title patterns.
    #[serde(default)]
    pub anime_patterns: Vec<String>,
    pub state_db_path: PathBuf,
    pub lock_file: PathBuf,
    pub monitor_pid_file: PathBuf,
    pub lock_timeout_secs: u64,
    /// Companion watcher argv. Empty disables the watcher.
    #[serde(default)]
    pub watcher_command: Vec<String>,
    pub supervise_interval_ms: u64,
    pub shutdown_grace_secs: u64,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

/// Load `Config.toml` (optional) overlaid with `LINKARR_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let tmp = env::temp_dir();
    let builder = Config::builder()
        .set_default("rename_enabled", false)?
        .set_default("tmdb_folder_id", true)?
        .set_default("skip_extras_folder", false)?
        .set_default("junk_max_size_mb", 5)?
        .set_default("state_db_path", "linkarr.db")?
        .set_default(
            "lock_file",
            tmp.join("linkarr_monitor.lock").to_string_lossy().into_owned(),
        )?
        .set_default(
            "monitor_pid_file",
            tmp.join("linkarr_monitor_pid.txt")
                .to_string_lossy()
                .into_owned(),
        )?
        .set_default("lock_timeout_secs", 3600)?
        .set_default("supervise_interval_ms", 1000)?
        .set_default("shutdown_grace_secs", 3)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("LINKARR")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("source_dirs")
                .with_list_parse_key("allowed_extensions")
                .with_list_parse_key("ignore_patterns")
                .with_list_parse_key("anime_patterns")
                .with_list_parse_key("watcher_command"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    /// Minimal configuration rooted at the given directories, used by tests and embedders.
    pub fn new(source_dirs: Vec<PathBuf>, destination_dir: PathBuf) -> Self {
        let tmp = env::temp_dir();
        AppConfig {
            source_dirs,
            destination_dir: Some(destination_dir),
            rename_enabled: false,
            tmdb_folder_id: true,
            skip_extras_folder: false,
            junk_max_size_mb: 5,
            allowed_extensions: default_extensions(),
            ignore_patterns: Vec::new(),
            anime_patterns: Vec::new(),
            state_db_path: PathBuf::from("linkarr.db"),
            lock_file: tmp.join("linkarr_monitor.lock"),
            monitor_pid_file: tmp.join("linkarr_monitor_pid.txt"),
            lock_timeout_secs: 3600,
            watcher_command: Vec::new(),
            supervise_interval_ms: 1000,
            shutdown_grace_secs: 3,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn supervise_interval(&self) -> Duration {
        Duration::from_millis(self.supervise_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn junk_max_size_bytes(&self) -> u64 {
        self.junk_max_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn is_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Check that source and destination directories are usable and return the
    /// destination as an absolute path. The destination is created when it does not exist yet.
    pub fn validate(&self, single_path: Option<&Path>) -> Result<PathBuf, Error> {
        let destination = self
            .destination_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| Error::Configuration("destination directory is not set".into()))?;

        match single_path {
            Some(path) if !path.exists() => {
                return Err(Error::Configuration(format!(
                    "source path does not exist: {}",
                    path.display()
                )));
            }
            Some(_) => {}
            None => {
                if self.source_dirs.is_empty() {
                    return Err(Error::Configuration(
                        "no source directories configured".into(),
                    ));
                }
                if let Some(missing) = self.source_dirs.iter().find(|dir| !dir.is_dir()) {
                    return Err(Error::Configuration(format!(
                        "source directory does not exist: {}",
                        missing.display()
                    )));
                }
            }
        }

        if !destination.is_dir() {
            fs::create_dir_all(&destination)?;
            info!("Created destination directory {}", destination.display());
        }
        Ok(std::path::absolute(&destination)?)
    }
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|res_dir| dir.starts_with(res_dir)) {
            continue;
        }
        result.retain(|res_dir| !res_dir.starts_with(&dir));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            PathBuf::from("/media/downloads"),
            PathBuf::from("/media/downloads/tv"),
            PathBuf::from("/mnt/remote"),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&PathBuf::from("/media/downloads")));
        assert!(result.contains(&PathBuf::from("/mnt/remote")));
    }

    #[test]
    fn test_parent_replaces_every_nested_root() {
        let dirs = vec![
            PathBuf::from("/media/tv"),
            PathBuf::from("/media/movies"),
            PathBuf::from("/media"),
            PathBuf::from("/media/movies/4k"),
        ];
        assert_eq!(
            non_overlapping_directories(dirs),
            vec![PathBuf::from("/media")]
        );
    }

    #[test]
    fn test_junk_threshold_saturates() {
        let mut config = AppConfig::new(vec![], PathBuf::from("/dest"));
        config.junk_max_size_mb = u64::MAX;
        assert_eq!(config.junk_max_size_bytes(), u64::MAX);
        config.junk_max_size_mb = 5;
        assert_eq!(config.junk_max_size_bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_allowed_extension_is_case_insensitive() {
        let config = AppConfig::new(vec![], PathBuf::from("/dest"));
        assert!(config.is_allowed_extension(Path::new("/src/Movie.MKV")));
        assert!(!config.is_allowed_extension(Path::new("/src/notes.txt")));
        assert!(!config.is_allowed_extension(Path::new("/src/no_extension")));
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let tmp = tempdir().unwrap();
        let config = AppConfig::new(vec![tmp.path().join("absent")], tmp.path().join("dest"));
        assert!(matches!(config.validate(None), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_creates_destination() {
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("dest");
        let config = AppConfig::new(vec![tmp.path().to_path_buf()], dest.clone());
        assert_eq!(config.validate(None).unwrap(), dest);
        assert!(dest.is_dir());
    }
}
