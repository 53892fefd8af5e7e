use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use recall_sync::{ChangeDetector, ChangeOutcome, DownloadProgress, FingerprintScope, RefreshEvent};
use recall_sync_http::HttpArchiveClient;

/// Bytes between progress redraws when the server sends no length.
const UNKNOWN_LENGTH_STEP: u64 = 1024 * 1024;

/// Resolved inputs for one detector run.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub url: String,
    pub destination: PathBuf,
    pub scope: FingerprintScope,
    pub timeout: Duration,
}

/// Renders refresh events to stderr, redrawing a single progress line.
#[derive(Default)]
pub struct EventPrinter {
    last_step: AtomicU64,
    mid_line: AtomicBool,
}

impl EventPrinter {
    pub fn handle(&self, event: &RefreshEvent) {
        match event {
            RefreshEvent::Progress(p) => {
                // Offset by one so the initial zero never matches.
                let step = progress_step(p) + 1;
                if self.last_step.swap(step, Ordering::Relaxed) != step {
                    eprint!("\r{event}");
                    self.mid_line.store(true, Ordering::Relaxed);
                }
            }
            other => {
                if self.mid_line.swap(false, Ordering::Relaxed) {
                    eprintln!();
                }
                eprintln!("{other}");
            }
        }
    }
}

fn progress_step(p: &DownloadProgress) -> u64 {
    match p.percent() {
        Some(pct) => u64::from(pct),
        None => p.received / UNKNOWN_LENGTH_STEP,
    }
}

/// Run the detector and print its outcome to stdout.
pub async fn run(settings: &CheckSettings) -> Result<ChangeOutcome> {
    let client = HttpArchiveClient::with_timeout(settings.timeout)
        .context("failed to create HTTP client")?;
    let detector = ChangeDetector::new(&settings.destination).with_scope(settings.scope);
    let printer = EventPrinter::default();

    let report = detector
        .check_and_update(&client, &settings.url, &|e: &RefreshEvent| printer.handle(e))
        .await
        .with_context(|| format!("refresh of {} failed", settings.destination.display()))?;

    match &report.outcome {
        ChangeOutcome::Changed {
            fingerprint,
            first_run,
        } => {
            let label = if *first_run { "initialized" } else { "changed" };
            println!(
                "{label}: {fingerprint} ({} files extracted)",
                report.extracted.len()
            );
        }
        ChangeOutcome::Unchanged { fingerprint } => println!("unchanged: {fingerprint}"),
        ChangeOutcome::Indeterminate { reason } => println!("indeterminate: {reason}"),
    }

    Ok(report.outcome)
}
