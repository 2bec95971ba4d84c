use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Fatal setup problem: missing directories, conflicting force flags.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Another instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// The state recorder can no longer be trusted; the batch must stop.
    #[error("State recorder unavailable: {0}")]
    StateUnavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Failure to materialize a single destination link.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("destination occupied by a regular file: {}", .0.display())]
    Occupied(PathBuf),

    #[error("destination appeared while creating link: {}", .0.display())]
    RaceLost(PathBuf),

    #[error("link error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LinkError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        LinkError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
