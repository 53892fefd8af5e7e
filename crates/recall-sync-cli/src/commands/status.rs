use std::path::Path;

use anyhow::{Context, Result};
use recall_sync::FingerprintRecord;

use crate::config::AppConfig;

/// Print where data lives and what fingerprint was last recorded.
pub fn run(destination: &Path, config: &AppConfig) -> Result<()> {
    let record = FingerprintRecord::in_dir(destination);
    let fingerprint = record
        .read()
        .with_context(|| format!("failed to read {}", record.path().display()))?;

    println!("Destination: {}", destination.display());
    println!("Source:      {}", config.url);
    match fingerprint {
        Some(digest) => println!("Fingerprint: {digest}"),
        None => println!("Fingerprint: none recorded (next check is a first run)"),
    }

    let dataset = config.dataset_path(destination);
    let state = if dataset.exists() { "present" } else { "missing" };
    println!("Dataset:     {} ({state})", dataset.display());

    Ok(())
}
