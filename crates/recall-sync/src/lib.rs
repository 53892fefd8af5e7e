pub mod archive;
pub mod clean;
pub mod detector;
pub mod event;
pub mod fetch;
pub mod fingerprint;
pub mod record;

pub use archive::{ArchiveError, ArchiveFormat};
pub use clean::{CleanError, CleanOptions, CleanReport, TextEncoding, clean_dataset, read_list};
pub use detector::{ChangeDetector, ChangeOutcome, DetectorError, RefreshReport, check_and_update};
pub use event::RefreshEvent;
pub use fetch::{ArchiveFetcher, DownloadProgress, FetchError};
pub use fingerprint::{EntryDigest, Fingerprint, FingerprintScope};
pub use record::{DOWNLOAD_FILE_NAME, FingerprintRecord, RECORD_FILE_NAME};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
