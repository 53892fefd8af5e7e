use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use recall_sync::{ArchiveFetcher, DownloadProgress, FetchError};

/// Default overall timeout for a single download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = concat!("recall-sync/", env!("CARGO_PKG_VERSION"));

/// HTTP client that streams a remote archive to disk.
///
/// The body is written chunk by chunk so memory use stays flat no matter how
/// large the archive is.
pub struct HttpArchiveClient {
    client: reqwest::Client,
}

impl HttpArchiveClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ArchiveFetcher for HttpArchiveClient {
    async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> Result<u64, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        tracing::debug!(%url, ?total, "download started");

        let mut file = File::create(dest)?;
        let mut received = 0u64;
        progress(DownloadProgress { received, total });

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(format!("failed to read body of {url}: {e}")))?
        {
            file.write_all(&chunk)?;
            received += chunk.len() as u64;
            progress(DownloadProgress { received, total });
        }

        file.flush()?;
        tracing::debug!(%url, received, "download finished");

        Ok(received)
    }
}
