//! Ingestion driver: one sequential pass over a remote listing.
//!
//! Objects arrive in whatever order the store lists them; the driver
//! assumes non-decreasing dates and keeps a single partition open,
//! rotating the sink whenever the extracted date key changes. An
//! out-of-order listing still produces correct output (each reopen
//! reloads durable state) at the cost of extra flush cycles.

use anyhow::{Context, Result};
use futures::StreamExt;
use object_store::{ObjectStore, path::Path};
use serde_json::Value;

use crate::datekey::{extract_date_key, in_range};
use crate::fetch::{DEFAULT_MAX_ATTEMPTS, fetch_object};
use crate::partition::PartitionSink;
use diagnostics::*;

const PROGRESS_INTERVAL: usize = 50;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Inclusive lower date bound (`YYYYMMDD`).
    pub start_date: Option<String>,
    /// Inclusive upper date bound (`YYYYMMDD`).
    pub end_date: Option<String>,
    /// Fetch attempts per object before the run aborts.
    pub max_attempts: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Default)]
pub struct IngestReport {
    /// Objects fetched and decoded.
    pub objects: usize,
    /// Records appended across all partitions.
    pub records: usize,
    /// Objects skipped because no date key could be extracted.
    pub unroutable: usize,
    /// Partition writes that failed (run continues, exit code does not).
    pub write_failures: usize,
}

/// Ingest every object in the listing whose embedded date falls inside
/// the configured range, accumulating records into per-date partitions
/// through `sink`. An exhausted fetch aborts the run; partitions
/// flushed before the failure remain valid.
pub async fn ingest_source(
    store: &dyn ObjectStore,
    prefix: Option<&Path>,
    sink: &mut PartitionSink,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let start = options.start_date.as_deref();
    let end = options.end_date.as_deref();

    let mut listing = store.list(prefix);
    while let Some(meta) = listing.next().await {
        let meta = meta.context("Failed to list objects in source")?;
        let name: &str = meta.location.as_ref();

        let Some(key) = extract_date_key(name) else {
            warn!("No date match found in object name: {name}", name);
            report.unroutable += 1;
            continue;
        };
        if !in_range(&key, start, end) {
            continue;
        }

        if sink.current_key() != Some(key.as_str()) {
            sink.open(&key);
        }

        let bytes = fetch_object(store, &meta.location, options.max_attempts)
            .await
            .with_context(|| format!("Unrecoverable fetch failure for object {name}"))?;
        let text = std::str::from_utf8(&bytes)
            .with_context(|| format!("Object {name} is not valid UTF-8"))?;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON in object {name} line {line_number}"))?;
            match value {
                Value::Object(record) => {
                    sink.append(&record);
                    report.records += 1;
                }
                _ => {
                    warn!(
                        "Skipping non-object record in {name} line {line_number}",
                        name,
                        line_number,
                    );
                }
            }
        }

        report.objects += 1;
        if report.objects % PROGRESS_INTERVAL == 0 {
            let count = report.objects;
            info!("Processed: {count} objects", count);
        }
    }

    sink.finish();
    report.write_failures = sink.write_failures();

    let count = report.objects;
    let records = report.records;
    info!("Processed: {count} objects, {records} records", count, records);
    Ok(report)
}
