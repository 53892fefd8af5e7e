use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;
use zip::write::SimpleFileOptions;

use crate::{ArchiveFetcher, DownloadProgress, FetchError};

/// Build a zip in memory with the given `(name, content)` entries, in order.
/// Names ending in `/` become directory entries.
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

/// Build a .tar.gz in memory with the given `(path, content)` entries.
pub fn build_tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);

    for (file_path, content) in entries {
        let data = content.as_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_path(file_path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        archive.append(&header, data).unwrap();
    }

    archive.into_inner().unwrap().finish().unwrap()
}

/// Fetcher that serves a fixed body, or fails with a fixed status after
/// writing a partial file. The body can be swapped between calls.
pub struct StaticFetcher {
    response: Mutex<Result<Vec<u8>, u16>>,
}

impl StaticFetcher {
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            response: Mutex::new(Ok(body)),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Mutex::new(Err(status)),
        }
    }

    pub fn set_body(&self, body: Vec<u8>) {
        *self.response.lock().unwrap() = Ok(body);
    }

    pub fn set_failing(&self, status: u16) {
        *self.response.lock().unwrap() = Err(status);
    }
}

#[async_trait::async_trait]
impl ArchiveFetcher for StaticFetcher {
    async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> Result<u64, FetchError> {
        let response = self.response.lock().unwrap().clone();

        match response {
            Ok(body) => {
                std::fs::write(dest, &body)?;
                let total = body.len() as u64;
                progress(DownloadProgress {
                    received: total,
                    total: Some(total),
                });
                Ok(total)
            }
            Err(status) => {
                // Leave debris behind so callers' cleanup is exercised.
                std::fs::write(dest, b"partial")?;
                Err(FetchError::Status {
                    url: url.to_owned(),
                    status,
                })
            }
        }
    }
}
