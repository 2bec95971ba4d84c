use crate::config::AppConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared by the engine, the walk and the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-only configuration snapshot plus the cancellation token, handed to every entry point.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub config: Arc<AppConfig>,
    pub cancel: CancellationToken,
}

impl SyncContext {
    pub fn new(config: AppConfig) -> Self {
        SyncContext {
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }
}
