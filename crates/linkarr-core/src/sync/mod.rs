mod link;

pub use link::{link_target, links_to, remove_link_and_prune, sync_link, LinkOutcome};

use crate::error::{Error, LinkError};
use std::path::Path;
use tracing::warn;

/// Best-effort hook fired after a link is created or replaced, e.g. a media
/// server library refresh.
pub trait RefreshNotifier: Send + Sync {
    fn notify(&self, destination: &Path) -> Result<(), Error>;
}

pub struct NoopNotifier;

impl RefreshNotifier for NoopNotifier {
    fn notify(&self, _destination: &Path) -> Result<(), Error> {
        Ok(())
    }
}

/// `sync_link` plus the refresh notification.
pub struct Synchronizer<'a> {
    notifier: &'a dyn RefreshNotifier,
}

impl<'a> Synchronizer<'a> {
    pub fn new(notifier: &'a dyn RefreshNotifier) -> Self {
        Self { notifier }
    }

    pub fn link(&self, destination: &Path, source: &Path) -> Result<LinkOutcome, LinkError> {
        let outcome = sync_link(destination, source)?;
        if outcome.is_mutation() {
            if let Err(err) = self.notifier.notify(destination) {
                warn!(
                    "Refresh notification failed for {}: {}",
                    destination.display(),
                    err
                );
            }
        }
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FailingNotifier {
        calls: Mutex<usize>,
    }

    impl RefreshNotifier for FailingNotifier {
        fn notify(&self, _destination: &Path) -> Result<(), Error> {
            *self.calls.lock().unwrap() += 1;
            Err(Error::Other("server unreachable".into()))
        }
    }

    #[test]
    fn test_notifier_failure_does_not_fail_link() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("movie.mkv");
        fs::write(&source, b"data").unwrap();
        let dest = tmp.path().join("out/movie.mkv");
        let notifier = FailingNotifier {
            calls: Mutex::new(0),
        };
        let synchronizer = Synchronizer::new(&notifier);

        assert_eq!(synchronizer.link(&dest, &source).unwrap(), LinkOutcome::Created);
        assert_eq!(
            synchronizer.link(&dest, &source).unwrap(),
            LinkOutcome::AlreadyCorrect
        );
        assert_eq!(*notifier.calls.lock().unwrap(), 1);
    }
}
