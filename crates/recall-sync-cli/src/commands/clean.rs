use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use recall_sync::{CleanOptions, CleanReport, clean_dataset, read_list};

/// Command-line values that replace the configured cleaning options.
#[derive(Debug, Default)]
pub struct CleanOverrides {
    pub names: Option<PathBuf>,
    pub filter: Option<PathBuf>,
    pub filter_column: Option<String>,
    pub dedup_key: Option<String>,
}

impl CleanOverrides {
    pub fn apply(self, mut options: CleanOptions) -> Result<CleanOptions> {
        if let Some(path) = self.names {
            let names = read_list(&path)
                .with_context(|| format!("failed to read column names from {}", path.display()))?;
            options.column_names = Some(names);
        }
        if let Some(path) = self.filter {
            let values = read_list(&path)
                .with_context(|| format!("failed to read filter values from {}", path.display()))?;
            options.category_filter = Some(values.into_iter().collect());
        }
        if let Some(column) = self.filter_column {
            options.category_column = column;
        }
        if let Some(key) = self.dedup_key {
            options.dedup_key = key;
        }
        Ok(options)
    }
}

/// Clean `input`, print the written files to stdout and warnings to stderr.
pub fn run(input: &Path, options: &CleanOptions) -> Result<CleanReport> {
    println!("Cleaning {}...", input.display());

    let report = clean_dataset(input, options)
        .with_context(|| format!("failed to clean {}", input.display()))?;

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }

    println!("Wrote {} ({} rows).", report.complete.display(), report.rows);
    if let (Some(path), Some(rows)) = (&report.deduplicated, report.unique_rows) {
        println!("Wrote {} ({rows} unique rows).", path.display());
    }

    Ok(report)
}
