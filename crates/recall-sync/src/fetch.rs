use std::path::Path;

/// Download progress snapshot, reported after each chunk is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes written to disk so far.
    pub received: u64,
    /// Expected total from `Content-Length`, when the server sent one.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completion in percent, if the total is known.
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(0) => Some(100),
            Some(total) => Some((self.received.min(total) * 100 / total) as u8),
            None => None,
        }
    }
}

/// Errors that can occur while fetching a remote archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport that streams a remote resource to a local file.
#[async_trait::async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Fetch `url` and write its body to `dest`, creating or truncating it.
    ///
    /// Any failure, including a non-success status, is an error; callers
    /// never see a partially fetched archive as success. Returns the number
    /// of bytes written.
    async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> Result<u64, FetchError>;
}
