//! Partition merger: load, concatenate, flatten, write combined table.
//!
//! Partitions are the immediate `YYYYMMDD` subdirectories of the
//! source directory; ingestion never nests them deeper, so the scan
//! is one level only.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::datekey::{in_range, is_valid_date_key};
use crate::flatten::flatten_table;
use crate::partition::{CSV_FILE, PARQUET_FILE};
use crate::table::WideTable;
use diagnostics::*;

/// Combined-table file names, written next to the partition
/// directories inside the source directory.
pub const COMBINED_PARQUET: &str = "combined_table.parquet";
pub const COMBINED_CSV: &str = "combined_table.csv";

#[derive(Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing to combine (no partitions in range, malformed date
    /// bounds, or a source directory that does not exist yet). No
    /// output file is written.
    Empty,
    Written { partitions: usize, rows: usize },
}

/// Merge all durable partitions of one source whose date keys fall in
/// the inclusive range, flatten the result to scalar columns, and
/// write `combined_table.{parquet,csv}` into `source_dir`.
///
/// Partitions are loaded in sorted key order so the combined row order
/// is stable across filesystems.
pub fn merge_partitions(
    source_dir: &Path,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<MergeOutcome> {
    let dir_name = source_dir.display().to_string();
    info!("Searching for partitions in directory: {dir_name}", dir_name);

    for bound in [start_date, end_date].into_iter().flatten() {
        if !is_valid_date_key(bound) {
            warn!("Date bound {bound} is not a valid YYYYMMDD date", bound);
            return Ok(MergeOutcome::Empty);
        }
    }

    // A source that was never ingested has no directory yet; that is
    // an empty merge, not a failure.
    let entries = match fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) => {
            let message = e.to_string();
            info!(
                "No partition directory at {dir_name}: {message}",
                dir_name,
                message,
            );
            return Ok(MergeOutcome::Empty);
        }
    };
    let mut keys = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {dir_name}"))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_valid_date_key(&name) && in_range(&name, start_date, end_date) {
            keys.push(name);
        }
    }
    keys.sort();

    let found = keys.len();
    info!("Found {found} partitions in directory: {dir_name}", found, dir_name);

    let mut combined = WideTable::new();
    let mut loaded = 0;
    for key in &keys {
        let dir = source_dir.join(key);
        let parquet_path = dir.join(PARQUET_FILE);
        let csv_path = dir.join(CSV_FILE);
        let table = if parquet_path.exists() {
            WideTable::read_parquet(&parquet_path)
                .with_context(|| format!("Failed to read partition {key}"))?
        } else if csv_path.exists() {
            WideTable::read_csv(&csv_path)
                .with_context(|| format!("Failed to read partition {key}"))?
        } else {
            warn!("Partition {key} has no data file, skipping", key);
            continue;
        };
        combined.concat(table);
        loaded += 1;
    }

    if combined.is_empty() {
        info!(
            "No partition data found in {dir_name} for the given date range",
            dir_name,
        );
        return Ok(MergeOutcome::Empty);
    }

    let flat = flatten_table(combined, None);
    let rows = flat.num_rows();
    flat.write_parquet(&source_dir.join(COMBINED_PARQUET))
        .context("Failed to write combined parquet table")?;
    flat.write_csv(&source_dir.join(COMBINED_CSV))
        .context("Failed to write combined csv table")?;

    info!("Combined {loaded} partitions into {rows} rows", loaded, rows);
    Ok(MergeOutcome::Written {
        partitions: loaded,
        rows,
    })
}
