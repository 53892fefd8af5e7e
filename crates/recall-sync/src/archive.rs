use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::fingerprint::{EntryDigest, Fingerprint, digest_reader};

/// Errors from reading or unpacking a downloaded archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unrecognized archive format")]
    UnrecognizedFormat,

    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// True when the downloaded bytes themselves are the problem, as opposed
    /// to the local filesystem.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::UnrecognizedFormat | Self::Malformed(_))
    }
}

/// Container formats recognized by their leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn sniff(header: &[u8]) -> Option<Self> {
        match header {
            [b'P', b'K', 0x03, 0x04, ..] | [b'P', b'K', 0x05, 0x06, ..] => Some(Self::Zip),
            [0x1f, 0x8b, ..] => Some(Self::TarGz),
            _ => None,
        }
    }

    /// Read the first bytes of a file and detect its format.
    pub fn detect(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            match file.read(&mut header[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Self::sniff(&header[..filled]).ok_or(ArchiveError::UnrecognizedFormat)
    }
}

/// Digest every file entry of the archive at `path`, in listing order.
///
/// Directory entries are skipped. An archive with no file entries yields an
/// empty fingerprint rather than an error; the caller decides what that means.
pub fn fingerprint_archive(path: &Path) -> Result<Fingerprint, ArchiveError> {
    match ArchiveFormat::detect(path)? {
        ArchiveFormat::Zip => fingerprint_zip(path),
        ArchiveFormat::TarGz => fingerprint_tar_gz(path),
    }
}

/// Unpack every file entry of the archive at `path` into `destination`,
/// overwriting files of the same name. Returns the paths written.
///
/// Entries whose paths would land outside `destination` are skipped, as are
/// entries that would overwrite the archive itself or any `protected` path.
pub fn extract_archive(
    path: &Path,
    destination: &Path,
    protected: &[PathBuf],
) -> Result<Vec<PathBuf>, ArchiveError> {
    std::fs::create_dir_all(destination)?;

    let guard = Protected {
        archive: path,
        others: protected,
    };
    match ArchiveFormat::detect(path)? {
        ArchiveFormat::Zip => extract_zip(path, destination, &guard),
        ArchiveFormat::TarGz => extract_tar_gz(path, destination, &guard),
    }
}

/// Paths extraction must not write to.
struct Protected<'a> {
    archive: &'a Path,
    others: &'a [PathBuf],
}

impl Protected<'_> {
    fn contains(&self, target: &Path) -> bool {
        target == self.archive || self.others.iter().any(|p| p == target)
    }
}

fn open_zip(path: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| ArchiveError::Malformed(format!("failed to read zip: {e}")))
}

fn fingerprint_zip(path: &Path) -> Result<Fingerprint, ArchiveError> {
    let mut archive = open_zip(path)?;
    let mut fingerprint = Fingerprint::default();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Malformed(format!("failed to read zip entry {i}: {e}")))?;

        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_owned();
        let digest = digest_reader(&mut entry)
            .map_err(|e| ArchiveError::Malformed(format!("failed to decompress {name}: {e}")))?;

        tracing::debug!(entry = %name, %digest, "digested zip entry");
        fingerprint.push(EntryDigest { name, digest });
    }

    Ok(fingerprint)
}

fn fingerprint_tar_gz(path: &Path) -> Result<Fingerprint, ArchiveError> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut fingerprint = Fingerprint::default();

    let entries = archive
        .entries()
        .map_err(|e| ArchiveError::Malformed(format!("failed to read tar entries: {e}")))?;

    for entry_result in entries {
        let mut entry = entry_result
            .map_err(|e| ArchiveError::Malformed(format!("failed to read tar entry: {e}")))?;

        if entry.header().entry_type() != tar::EntryType::Regular {
            continue;
        }

        let name = entry
            .path()
            .map_err(|e| ArchiveError::Malformed(format!("invalid path in tar: {e}")))?
            .to_string_lossy()
            .into_owned();

        let digest = digest_reader(&mut entry)
            .map_err(|e| ArchiveError::Malformed(format!("failed to decompress {name}: {e}")))?;

        tracing::debug!(entry = %name, %digest, "digested tar entry");
        fingerprint.push(EntryDigest { name, digest });
    }

    Ok(fingerprint)
}

fn extract_zip(
    path: &Path,
    destination: &Path,
    protected: &Protected<'_>,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive = open_zip(path)?;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Malformed(format!("failed to read zip entry {i}: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let out_path = destination.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if protected.contains(&out_path) {
            tracing::warn!(entry = entry.name(), "skipping zip entry that would overwrite a reserved file");
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;

        tracing::debug!(path = %out_path.display(), "extracted zip entry");
        written.push(out_path);
    }

    Ok(written)
}

fn extract_tar_gz(
    path: &Path,
    destination: &Path,
    protected: &Protected<'_>,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut written = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| ArchiveError::Malformed(format!("failed to read tar entries: {e}")))?;

    for entry_result in entries {
        let mut entry = entry_result
            .map_err(|e| ArchiveError::Malformed(format!("failed to read tar entry: {e}")))?;

        if entry.header().entry_type() != tar::EntryType::Regular {
            continue;
        }

        let relative = entry
            .path()
            .map_err(|e| ArchiveError::Malformed(format!("invalid path in tar: {e}")))?
            .into_owned();
        let out_path = destination.join(&relative);

        if protected.contains(&out_path) {
            tracing::warn!(entry = %relative.display(), "skipping tar entry that would overwrite a reserved file");
            continue;
        }

        // unpack_in refuses paths that escape the destination and reports it
        // by returning false.
        if !entry.unpack_in(destination)? {
            tracing::warn!(entry = %relative.display(), "skipping tar entry with unsafe path");
            continue;
        }

        tracing::debug!(path = %out_path.display(), "extracted tar entry");
        written.push(out_path);
    }

    Ok(written)
}
