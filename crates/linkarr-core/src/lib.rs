pub mod classifier;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod index;
pub mod outcome;
pub mod processor;
pub mod progress;
pub mod reconcile;
pub mod resolver;
pub mod scanner;
pub mod storage;
pub mod sync;
pub mod task;

pub use config::AppConfig;
pub use context::{CancellationToken, SyncContext};
pub use coordinator::Coordinator;
pub use engine::{ExecutionMode, SyncEngine, SyncResult};
pub use error::Error;
pub use outcome::{FileOutcome, SkipReason};
pub use progress::{SilentReporter, SyncReporter};
pub use task::{IndexMode, RunOptions};
