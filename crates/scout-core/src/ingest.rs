//! Bulk URL list reader.
//!
//! Accepts CSV exports with loosely named columns: the URL column may be
//! called any of [`URL_COLUMNS`] (first match wins) and the type column
//! `Type`, `type` or anything starting with "type".

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const URL_COLUMNS: &[&str] = &[
    "Base URL",
    "url",
    "website",
    "link",
    "URL",
    "Website URL",
    "Link",
];

/// One `(url, type label)` pair, ready for routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRow {
    pub url: String,
    #[serde(alias = "type")]
    pub label: String,
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<IngestRow>, AppError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let url_idx = URL_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .ok_or_else(|| {
            AppError::IngestError(format!(
                "no URL column found (expected one of: {})",
                URL_COLUMNS.join(", ")
            ))
        })?;
    let type_idx = headers
        .iter()
        .position(|h| h == "Type" || h == "type")
        .or_else(|| {
            headers
                .iter()
                .position(|h| h.to_lowercase().starts_with("type"))
        })
        .ok_or_else(|| AppError::IngestError("no Type column found".into()))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in csv.records() {
        let record = record?;
        let url = record.get(url_idx).unwrap_or_default();
        let label = record.get(type_idx).unwrap_or_default();
        if url.is_empty() || label.is_empty() {
            skipped += 1;
            continue;
        }
        rows.push(IngestRow {
            url: url.to_string(),
            label: label.to_string(),
        });
    }

    tracing::info!(
        rows = rows.len(),
        skipped,
        url_column = &headers[url_idx],
        type_column = &headers[type_idx],
        "Read ingest rows"
    );
    Ok(rows)
}

pub fn read_rows_from_str(input: &str) -> Result<Vec<IngestRow>, AppError> {
    read_rows(input.as_bytes())
}

pub fn read_rows_from_path(path: &Path) -> Result<Vec<IngestRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::IngestError(format!("cannot open {}: {e}", path.display())))?;
    read_rows(file)
}

/// Borrowing view for [`crate::router::CategoryRouter::route`].
pub fn as_pairs(rows: &[IngestRow]) -> impl Iterator<Item = (&str, &str)> {
    rows.iter().map(|r| (r.url.as_str(), r.label.as_str()))
}
