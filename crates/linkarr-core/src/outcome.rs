use crate::sync::LinkOutcome;
use std::fmt;
use std::path::PathBuf;

/// Why a source file has no destination link. Persisted as text in the state recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedFileType,
    SkippedByUser,
    BelowMinimumSize,
    MissingIdentifiersOnHashFile,
    ExtraContent,
    NoUsableDestination,
    DestinationOccupied,
    LinkFailed(String),
}

impl SkipReason {
    pub fn as_str(&self) -> &str {
        match self {
            SkipReason::UnsupportedFileType => "unsupported file type",
            SkipReason::SkippedByUser => "skipped by user",
            SkipReason::BelowMinimumSize => "file size below minimum threshold",
            SkipReason::MissingIdentifiersOnHashFile => "missing media identifiers on hash file",
            SkipReason::ExtraContent => "extra content skipped",
            SkipReason::NoUsableDestination => "no usable destination",
            SkipReason::DestinationOccupied => "destination occupied",
            SkipReason::LinkFailed(message) => message,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "unsupported file type" => SkipReason::UnsupportedFileType,
            "skipped by user" => SkipReason::SkippedByUser,
            "file size below minimum threshold" => SkipReason::BelowMinimumSize,
            "missing media identifiers on hash file" => SkipReason::MissingIdentifiersOnHashFile,
            "extra content skipped" => SkipReason::ExtraContent,
            "no usable destination" => SkipReason::NoUsableDestination,
            "destination occupied" => SkipReason::DestinationOccupied,
            other => SkipReason::LinkFailed(other.to_string()),
        }
    }

    /// Terminal reasons are classification decisions and are not retried without force.
    /// The rest are failures and get another attempt on the next pass.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SkipReason::UnsupportedFileType
                | SkipReason::SkippedByUser
                | SkipReason::BelowMinimumSize
                | SkipReason::MissingIdentifiersOnHashFile
                | SkipReason::ExtraContent
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one processing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Linked { destination: PathBuf, link: LinkOutcome },
    /// An existing destination symlink already pointed at the source.
    Adopted { destination: PathBuf },
    /// The mapped destination moved within its directory; the record was updated.
    Renamed { destination: PathBuf },
    AlreadyProcessed,
    Skipped(SkipReason),
    Failed(SkipReason),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_text_is_stable() {
        for reason in [
            SkipReason::UnsupportedFileType,
            SkipReason::SkippedByUser,
            SkipReason::BelowMinimumSize,
            SkipReason::MissingIdentifiersOnHashFile,
            SkipReason::ExtraContent,
            SkipReason::NoUsableDestination,
            SkipReason::DestinationOccupied,
        ] {
            assert_eq!(SkipReason::parse(reason.as_str()), reason);
        }
        assert_eq!(
            SkipReason::parse("link error: permission denied"),
            SkipReason::LinkFailed("link error: permission denied".into())
        );
    }

    #[test]
    fn test_failures_are_retried() {
        assert!(SkipReason::SkippedByUser.is_terminal());
        assert!(!SkipReason::DestinationOccupied.is_terminal());
        assert!(!SkipReason::LinkFailed("boom".into()).is_terminal());
    }
}
