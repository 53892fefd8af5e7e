use std::io;
use std::path::{Path, PathBuf};

/// Name of the persisted fingerprint file inside the destination directory.
pub const RECORD_FILE_NAME: &str = "current_md5.txt";

/// Name of the transient download target inside the destination directory.
pub const DOWNLOAD_FILE_NAME: &str = "latest.zip";

/// The persisted digest of the most recently detected change.
///
/// Stored as a single lowercase hex string with no trailing metadata.
#[derive(Debug, Clone)]
pub struct FingerprintRecord {
    path: PathBuf,
}

impl FingerprintRecord {
    /// The record that lives in `destination`.
    pub fn in_dir(destination: &Path) -> Self {
        Self {
            path: destination.join(RECORD_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored digest. `Ok(None)` means no record exists yet, which
    /// is the first-run case rather than an error. An empty file counts as
    /// absent too.
    pub fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let digest = contents.trim();
                if digest.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(digest.to_owned()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the stored digest.
    pub fn write(&self, digest: &str) -> io::Result<()> {
        std::fs::write(&self.path, digest)
    }
}
