//! Post-processing of the extracted recall flat file into JSON.
//!
//! The dataset is a headerless, tab-separated, Latin-1 file. Cleaning names
//! the columns, normalizes date columns, optionally filters rows by category
//! (manufacturer), and writes a complete and a key-deduplicated JSON export
//! next to the input.

pub mod date;
pub mod table;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

pub use table::TextEncoding;

use table::{Record, Row};

/// Errors that can occur while cleaning a dataset.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("line {line} has {found} fields but only {expected} column names were given")]
    Shape {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cleaning configuration.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Ordered header names. Without them columns are numbered from `"0"` and
    /// no deduplicated export is written.
    pub column_names: Option<Vec<String>>,
    /// Allowed values for `category_column`; rows with other values are dropped.
    pub category_filter: Option<HashSet<String>>,
    pub category_column: String,
    pub dedup_key: String,
    pub encoding: TextEncoding,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            column_names: None,
            category_filter: None,
            category_column: "Make".to_owned(),
            dedup_key: "Campaign Number".to_owned(),
            encoding: TextEncoding::default(),
        }
    }
}

/// What a cleaning run produced.
#[derive(Debug, Clone)]
pub struct CleanReport {
    pub complete: PathBuf,
    pub deduplicated: Option<PathBuf>,
    /// Rows in the complete export (after filtering).
    pub rows: usize,
    /// Rows in the deduplicated export, when one was written.
    pub unique_rows: Option<usize>,
    pub warnings: Vec<String>,
}

/// Load a sidecar list: one value per line, blank lines ignored.
pub fn read_list(path: &Path) -> Result<Vec<String>, CleanError> {
    let text = std::fs::read_to_string(path).map_err(|e| CleanError::Io {
        path: path.to_owned(),
        source: e,
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Clean the tab-separated dataset at `input` and write the JSON exports
/// alongside it as `<stem>_complete.json` and `<stem>_no_duplicates.json`.
pub fn clean_dataset(input: &Path, options: &CleanOptions) -> Result<CleanReport, CleanError> {
    let bytes = std::fs::read(input).map_err(|e| CleanError::Io {
        path: input.to_owned(),
        source: e,
    })?;
    let records = table::parse_tsv(&options.encoding.decode(&bytes));
    let mut warnings = Vec::new();

    let columns = match &options.column_names {
        Some(names) => names.clone(),
        None => {
            let width = records.iter().map(|r| r.fields.len()).max().unwrap_or(0);
            (0..width).map(|i| i.to_string()).collect()
        }
    };

    let mut rows = shape_rows(records, columns.len())?;

    for (idx, name) in columns.iter().enumerate() {
        if date::is_date_column(name) {
            for row in &mut rows {
                row[idx] = Some(date::clean_date(row[idx].as_deref()));
            }
        }
    }

    if let Some(allowed) = &options.category_filter {
        match column_index(&columns, &options.category_column) {
            Some(idx) => {
                let before = rows.len();
                rows.retain(|row| row[idx].as_ref().is_some_and(|v| allowed.contains(v)));
                tracing::debug!(
                    column = %options.category_column,
                    kept = rows.len(),
                    dropped = before - rows.len(),
                    "applied category filter"
                );
            }
            None => {
                let msg = format!(
                    "no {} column; category filter not applied",
                    options.category_column
                );
                tracing::warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_owned());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));

    let complete = dir.join(format!("{stem}_complete.json"));
    write_json(&complete, &columns, rows.iter())?;
    let row_count = rows.len();

    let (deduplicated, unique_rows) = if options.column_names.is_some() {
        let key = column_index(&columns, &options.dedup_key)
            .ok_or_else(|| CleanError::MissingColumn(options.dedup_key.clone()))?;

        let mut seen = HashSet::new();
        let unique: Vec<&Row> = rows.iter().filter(|row| seen.insert(&row[key])).collect();

        let path = dir.join(format!("{stem}_no_duplicates.json"));
        write_json(&path, &columns, unique.iter().copied())?;
        (Some(path), Some(unique.len()))
    } else {
        let msg = "no column names given; deduplicated export skipped".to_owned();
        tracing::warn!("{msg}");
        warnings.push(msg);
        (None, None)
    };

    tracing::info!(
        input = %input.display(),
        rows = row_count,
        unique = ?unique_rows,
        "dataset cleaned"
    );

    Ok(CleanReport {
        complete,
        deduplicated,
        rows: row_count,
        unique_rows,
        warnings,
    })
}

fn shape_rows(records: Vec<Record>, width: usize) -> Result<Vec<Row>, CleanError> {
    records
        .into_iter()
        .map(|record| {
            let mut fields = record.fields;
            if fields.len() > width {
                return Err(CleanError::Shape {
                    line: record.line,
                    expected: width,
                    found: fields.len(),
                });
            }
            fields.resize(width, None);
            Ok(fields)
        })
        .collect()
}

fn column_index(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c == name)
}

fn write_json<'a>(
    path: &Path,
    columns: &[String],
    rows: impl Iterator<Item = &'a Row>,
) -> Result<(), CleanError> {
    let records: Vec<Value> = rows
        .map(|row| {
            let object: Map<String, Value> = columns
                .iter()
                .zip(row)
                .map(|(name, value)| {
                    let value = match value {
                        Some(v) => Value::String(v.clone()),
                        None => Value::Null,
                    };
                    (name.clone(), value)
                })
                .collect();
            Value::Object(object)
        })
        .collect();

    let json = serde_json::to_string(&records)?;
    std::fs::write(path, json).map_err(|e| CleanError::Io {
        path: path.to_owned(),
        source: e,
    })
}
