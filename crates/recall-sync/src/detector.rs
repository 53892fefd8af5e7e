use std::io;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveError};
use crate::event::RefreshEvent;
use crate::fetch::{ArchiveFetcher, DownloadProgress, FetchError};
use crate::fingerprint::FingerprintScope;
use crate::record::{DOWNLOAD_FILE_NAME, FingerprintRecord};

/// Result of comparing a freshly downloaded archive with the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The archive differed (or no record existed); files were extracted and
    /// the record now holds `fingerprint`.
    Changed { fingerprint: String, first_run: bool },
    /// The archive matched the record; nothing on disk changed.
    Unchanged { fingerprint: String },
    /// The download was not a usable archive, so no comparison was possible.
    /// Nothing on disk changed.
    Indeterminate { reason: String },
}

impl ChangeOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }
}

/// Outcome plus the files written when a change was applied.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub outcome: ChangeOutcome,
    pub extracted: Vec<PathBuf>,
}

/// Errors that abort a refresh.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extraction(ArchiveError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("archive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DetectorError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// Decides whether a remote archive changed since the last pull and, if so,
/// replaces the local extraction and fingerprint record.
///
/// Assumes a single caller per destination; concurrent runs against the same
/// directory race on `latest.zip` and the record file.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    destination: PathBuf,
    scope: FingerprintScope,
}

impl ChangeDetector {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            scope: FingerprintScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: FingerprintScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn record(&self) -> FingerprintRecord {
        FingerprintRecord::in_dir(&self.destination)
    }

    fn download_path(&self) -> PathBuf {
        self.destination.join(DOWNLOAD_FILE_NAME)
    }

    /// Download `url`, fingerprint it, and apply it if it changed.
    ///
    /// A failed fetch aborts before any hashing or extraction and leaves the
    /// destination as it was, including not creating it. Extraction always
    /// happens before the record is written, so an interrupted run is
    /// re-detected as a change next time.
    pub async fn check_and_update(
        &self,
        fetcher: &dyn ArchiveFetcher,
        url: &str,
        observer: &(dyn Fn(&RefreshEvent) + Send + Sync),
    ) -> Result<RefreshReport, DetectorError> {
        let scratch = Scratch {
            download: self.download_path(),
            created_dirs: missing_dirs(&self.destination),
        };
        std::fs::create_dir_all(&self.destination)
            .map_err(|e| DetectorError::io(&self.destination, e))?;

        let download = scratch.download.clone();

        observer(&RefreshEvent::Downloading {
            url: url.to_owned(),
        });
        tracing::info!(%url, dest = %download.display(), "fetching archive");

        let on_progress = |p: DownloadProgress| observer(&RefreshEvent::Progress(p));
        let bytes = match fetcher.fetch_to(url, &download, &on_progress).await {
            Ok(bytes) => bytes,
            Err(e) => {
                scratch.abandon();
                return Err(e.into());
            }
        };
        tracing::debug!(bytes, "archive downloaded");

        let archive_path = download.clone();
        let fingerprint =
            match run_blocking(move || archive::fingerprint_archive(&archive_path)).await {
                Ok(Ok(fp)) => fp,
                Ok(Err(e)) if e.is_format_error() => {
                    scratch.abandon();
                    return Ok(self.indeterminate(e.to_string(), observer));
                }
                Ok(Err(ArchiveError::Io(e))) => {
                    scratch.abandon();
                    return Err(DetectorError::io(&download, e));
                }
                Ok(Err(e)) => {
                    scratch.abandon();
                    return Err(DetectorError::Extraction(e));
                }
                Err(e) => {
                    scratch.abandon();
                    return Err(e);
                }
            };

        let Some(current) = fingerprint.value(self.scope) else {
            scratch.abandon();
            return Ok(self.indeterminate(
                "archive contains no file entries".to_owned(),
                observer,
            ));
        };

        let record = self.record();
        let previous = record.read().map_err(|e| {
            scratch.abandon();
            DetectorError::io(record.path(), e)
        })?;

        if previous.as_deref() == Some(current.as_str()) {
            discard(&download);
            observer(&RefreshEvent::NoChange);
            tracing::info!(fingerprint = %current, "archive unchanged");
            return Ok(RefreshReport {
                outcome: ChangeOutcome::Unchanged {
                    fingerprint: current,
                },
                extracted: Vec::new(),
            });
        }

        let first_run = previous.is_none();
        observer(if first_run {
            &RefreshEvent::FirstRun
        } else {
            &RefreshEvent::ChangeDetected
        });

        let archive_path = download.clone();
        let destination = self.destination.clone();
        let protected = vec![record.path().to_owned()];
        let extracted = match run_blocking(move || {
            archive::extract_archive(&archive_path, &destination, &protected)
        })
        .await
        {
            Ok(Ok(paths)) => paths,
            Ok(Err(e)) => {
                discard(&download);
                return Err(DetectorError::Extraction(e));
            }
            Err(e) => {
                discard(&download);
                return Err(e);
            }
        };

        std::fs::remove_file(&download).map_err(|e| DetectorError::io(&download, e))?;
        record
            .write(&current)
            .map_err(|e| DetectorError::io(record.path(), e))?;

        observer(&RefreshEvent::UpdateComplete {
            files: extracted.len(),
        });
        tracing::info!(
            fingerprint = %current,
            previous = previous.as_deref().unwrap_or("none"),
            files = extracted.len(),
            "archive changed; extraction complete"
        );

        Ok(RefreshReport {
            outcome: ChangeOutcome::Changed {
                fingerprint: current,
                first_run,
            },
            extracted,
        })
    }

    fn indeterminate(
        &self,
        reason: String,
        observer: &(dyn Fn(&RefreshEvent) + Send + Sync),
    ) -> RefreshReport {
        tracing::warn!(%reason, "unable to compare fingerprints");
        observer(&RefreshEvent::Indeterminate {
            reason: reason.clone(),
        });
        RefreshReport {
            outcome: ChangeOutcome::Indeterminate { reason },
            extracted: Vec::new(),
        }
    }
}

/// One-shot form with the default scope and no observer.
pub async fn check_and_update(
    fetcher: &dyn ArchiveFetcher,
    url: &str,
    destination: &Path,
) -> Result<ChangeOutcome, DetectorError> {
    let report = ChangeDetector::new(destination)
        .check_and_update(fetcher, url, &|_: &RefreshEvent| {})
        .await?;
    Ok(report.outcome)
}

/// Hashing and unpacking are plain file I/O; keep them off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, DetectorError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

/// What a run put on disk before it knew whether the archive was usable.
struct Scratch {
    download: PathBuf,
    /// Directories this run created, deepest first.
    created_dirs: Vec<PathBuf>,
}

impl Scratch {
    /// Remove the download and any directories created for it.
    fn abandon(&self) {
        discard(&self.download);
        for dir in &self.created_dirs {
            if let Err(e) = std::fs::remove_dir(dir)
                && e.kind() != io::ErrorKind::NotFound
            {
                tracing::warn!(path = %dir.display(), error = %e, "could not remove directory");
                break;
            }
        }
    }
}

/// `path` and its ancestors that do not exist yet, deepest first.
fn missing_dirs(path: &Path) -> Vec<PathBuf> {
    path.ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect()
}

/// Best-effort removal of the temporary download.
fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove download"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::record::RECORD_FILE_NAME;
    use crate::test_support::{StaticFetcher, build_zip};

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
    const WORLD_MD5: &str = "7d793037a0760186574b0282f2f435e7";

    #[tokio::test]
    async fn first_run_emits_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(build_zip(&[("a.txt", "hello")]));
        let events = Mutex::new(Vec::new());

        let report = ChangeDetector::new(dir.path())
            .check_and_update(&fetcher, "https://x.test/a.zip", &|e: &RefreshEvent| {
                if !e.is_progress() {
                    events.lock().unwrap().push(e.clone());
                }
            })
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            ChangeOutcome::Changed {
                fingerprint: HELLO_MD5.into(),
                first_run: true
            }
        );
        assert_eq!(report.extracted, vec![dir.path().join("a.txt")]);
        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                RefreshEvent::Downloading {
                    url: "https://x.test/a.zip".into()
                },
                RefreshEvent::FirstRun,
                RefreshEvent::UpdateComplete { files: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn progress_events_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let body = build_zip(&[("a.txt", "hello")]);
        let len = body.len() as u64;
        let fetcher = StaticFetcher::serving(body);
        let last = Mutex::new(None);

        ChangeDetector::new(dir.path())
            .check_and_update(&fetcher, "u", &|e: &RefreshEvent| {
                if let RefreshEvent::Progress(p) = e {
                    *last.lock().unwrap() = Some(*p);
                }
            })
            .await
            .unwrap();

        let last = last.into_inner().unwrap().unwrap();
        assert_eq!(last.received, len);
        assert_eq!(last.total, Some(len));
    }

    #[tokio::test]
    async fn unchanged_run_does_not_touch_record() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(build_zip(&[("a.txt", "hello")]));
        let detector = ChangeDetector::new(dir.path());

        detector.check_and_update(&fetcher, "u", &|_: &RefreshEvent| {}).await.unwrap();

        // A hand-edited record with surrounding whitespace still compares equal
        // and must not be rewritten.
        let record_path = dir.path().join(RECORD_FILE_NAME);
        std::fs::write(&record_path, format!("{HELLO_MD5}\n")).unwrap();

        let report = detector.check_and_update(&fetcher, "u", &|_: &RefreshEvent| {}).await.unwrap();

        assert_eq!(
            report.outcome,
            ChangeOutcome::Unchanged {
                fingerprint: HELLO_MD5.into()
            }
        );
        assert!(report.extracted.is_empty());
        assert_eq!(
            std::fs::read_to_string(&record_path).unwrap(),
            format!("{HELLO_MD5}\n")
        );
        assert!(!dir.path().join(DOWNLOAD_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn empty_archive_is_indeterminate() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(build_zip(&[]));

        let outcome = check_and_update(&fetcher, "u", dir.path()).await.unwrap();

        assert!(outcome.is_indeterminate());
        assert!(!dir.path().join(RECORD_FILE_NAME).exists());
        assert!(!dir.path().join(DOWNLOAD_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn non_archive_body_is_indeterminate() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(b"<html>maintenance</html>".to_vec());

        let outcome = check_and_update(&fetcher, "u", dir.path()).await.unwrap();

        match outcome {
            ChangeOutcome::Indeterminate { reason } => {
                assert!(reason.contains("unrecognized"), "reason was {reason}");
            }
            other => panic!("expected Indeterminate, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_removes_partial_download() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::failing(503);

        let result = check_and_update(&fetcher, "u", dir.path()).await;

        assert!(matches!(
            result,
            Err(DetectorError::Fetch(FetchError::Status { status: 503, .. }))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn creates_missing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("data");
        let fetcher = StaticFetcher::serving(build_zip(&[("a.txt", "hello")]));

        let outcome = check_and_update(&fetcher, "u", &dest).await.unwrap();

        assert!(outcome.is_changed());
        assert!(dest.join("a.txt").exists());
    }

    #[tokio::test]
    async fn fetch_failure_does_not_create_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("absent").join("data");
        let fetcher = StaticFetcher::failing(404);

        let result = check_and_update(&fetcher, "u", &dest).await;

        assert!(matches!(
            result,
            Err(DetectorError::Fetch(FetchError::Status { status: 404, .. }))
        ));
        assert!(!dir.path().join("absent").exists());
    }

    #[tokio::test]
    async fn indeterminate_run_does_not_create_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("absent");
        let fetcher = StaticFetcher::serving(b"not an archive".to_vec());

        let outcome = check_and_update(&fetcher, "u", &dest).await.unwrap();

        assert!(outcome.is_indeterminate());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn entry_named_like_download_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(build_zip(&[
            ("a.txt", "hello"),
            (DOWNLOAD_FILE_NAME, "x"),
            ("z.txt", "z"),
        ]));

        let report = ChangeDetector::new(dir.path())
            .check_and_update(&fetcher, "u", &|_: &RefreshEvent| {})
            .await
            .unwrap();

        assert!(report.outcome.is_changed());
        assert_eq!(
            report.extracted,
            vec![dir.path().join("a.txt"), dir.path().join("z.txt")]
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("z.txt")).unwrap(), "z");
        assert!(!dir.path().join(DOWNLOAD_FILE_NAME).exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(RECORD_FILE_NAME)).unwrap(),
            HELLO_MD5
        );
    }

    #[tokio::test]
    async fn entry_named_like_record_cannot_overwrite_it() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(build_zip(&[
            ("a.txt", "hello"),
            (RECORD_FILE_NAME, "forged"),
        ]));

        check_and_update(&fetcher, "u", dir.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join(RECORD_FILE_NAME)).unwrap(),
            HELLO_MD5
        );
    }

    #[tokio::test]
    async fn new_body_is_detected_and_failed_fetch_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::serving(build_zip(&[("a.txt", "hello")]));

        check_and_update(&fetcher, "u", dir.path()).await.unwrap();

        fetcher.set_body(build_zip(&[("a.txt", "world")]));
        let outcome = check_and_update(&fetcher, "u", dir.path()).await.unwrap();

        assert_eq!(
            outcome,
            ChangeOutcome::Changed {
                fingerprint: WORLD_MD5.into(),
                first_run: false
            }
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "world");

        fetcher.set_failing(404);
        let result = check_and_update(&fetcher, "u", dir.path()).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "world");
        assert_eq!(
            std::fs::read_to_string(dir.path().join(RECORD_FILE_NAME)).unwrap(),
            WORLD_MD5
        );
        assert!(!dir.path().join(DOWNLOAD_FILE_NAME).exists());
    }
}
