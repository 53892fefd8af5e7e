use std::fmt;

use crate::fetch::DownloadProgress;

/// Status updates emitted while a refresh runs.
///
/// Callers decide how to present them (the CLI prints to stderr, tests
/// collect them, library consumers can ignore them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Downloading { url: String },
    Progress(DownloadProgress),
    NoChange,
    /// No fingerprint record exists yet.
    FirstRun,
    ChangeDetected,
    UpdateComplete { files: usize },
    Indeterminate { reason: String },
}

impl RefreshEvent {
    /// Progress events are high-frequency; renderers usually treat them apart.
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress(_))
    }
}

impl fmt::Display for RefreshEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloading { url } => write!(f, "Downloading {url}"),
            Self::Progress(p) => match p.percent() {
                Some(pct) => write!(f, "{pct:>3}% ({} bytes)", p.received),
                None => write!(f, "{} bytes", p.received),
            },
            Self::NoChange => write!(f, "No changes detected."),
            Self::FirstRun => write!(f, "No fingerprint record found. Updating files..."),
            Self::ChangeDetected => write!(f, "Change detected. Updating files..."),
            Self::UpdateComplete { files } => write!(f, "Update complete ({files} files)."),
            Self::Indeterminate { reason } => write!(f, "Unable to compare fingerprints: {reason}"),
        }
    }
}
