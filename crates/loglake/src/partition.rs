//! Partition accumulator: one open date partition at a time.
//!
//! The sink is an explicit {Closed, Open(key)} state machine. Opening
//! a key reloads any existing durable state so an interrupted or
//! re-run ingestion appends instead of duplicating; flushing writes
//! both the authoritative Parquet file and a CSV mirror, best effort.

use std::fs;
use std::path::{Path, PathBuf};

use crate::flatten::normalize_record;
use crate::table::{JsonRow, WideTable};
use diagnostics::*;

/// Authoritative columnar file inside a partition directory.
pub const PARQUET_FILE: &str = "data.parquet";
/// Row-oriented convenience mirror.
pub const CSV_FILE: &str = "data.csv";

enum SinkState {
    Closed,
    Open { key: String, table: WideTable },
}

pub struct PartitionSink {
    source_dir: PathBuf,
    state: SinkState,
    write_failures: usize,
}

impl PartitionSink {
    /// A sink persisting partitions under `<source_dir>/<YYYYMMDD>/`.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            state: SinkState::Closed,
            write_failures: 0,
        }
    }

    /// Key of the currently open partition, if any.
    pub fn current_key(&self) -> Option<&str> {
        match &self.state {
            SinkState::Open { key, .. } => Some(key),
            SinkState::Closed => None,
        }
    }

    /// Number of durable writes that failed and were skipped.
    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    /// Open the partition for `key`, flushing any previously open
    /// partition first and reloading existing durable state for `key`.
    pub fn open(&mut self, key: &str) {
        if let SinkState::Open { key: current, .. } = &self.state {
            if current == key {
                return;
            }
            self.flush();
        }
        let table = self.load_partition(key);
        self.state = SinkState::Open {
            key: key.to_string(),
            table,
        };
    }

    fn load_partition(&self, key: &str) -> WideTable {
        let dir = self.source_dir.join(key);
        let parquet_path = dir.join(PARQUET_FILE);
        let csv_path = dir.join(CSV_FILE);

        let loaded = if parquet_path.exists() {
            WideTable::read_parquet(&parquet_path)
        } else if csv_path.exists() {
            WideTable::read_csv(&csv_path)
        } else {
            if let Err(e) = fs::create_dir_all(&dir) {
                let message = e.to_string();
                error!(
                    "Error creating partition directory for {key}: {message}",
                    key,
                    message,
                );
            }
            return WideTable::new();
        };

        match loaded {
            Ok(table) => {
                let rows = table.num_rows();
                debug!("Resuming partition {key} with {rows} existing rows", key, rows);
                table
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    "Error loading existing partition {key}, starting empty: {message}",
                    key,
                    message,
                );
                WideTable::new()
            }
        }
    }

    /// Normalize one decoded JSON record (nested objects to dotted
    /// keys, lists kept whole) and append it to the open partition.
    /// Records arriving while the sink is closed are dropped with a
    /// warning; the driver always opens a key first.
    pub fn append(&mut self, record: &JsonRow) {
        match &mut self.state {
            SinkState::Open { table, .. } => table.push_row(normalize_record(record)),
            SinkState::Closed => {
                warn!("Dropping record appended to closed partition sink");
            }
        }
    }

    /// Write the open partition to durable storage, overwriting any
    /// prior state for its key. Failures are logged and counted, not
    /// propagated. The partition stays open.
    pub fn flush(&mut self) {
        let SinkState::Open { key, table } = &self.state else {
            return;
        };
        if table.columns().is_empty() {
            debug!("Partition {key} has no columns, nothing to flush", key);
            return;
        }
        let dir = self.source_dir.join(key);
        if let Err(e) = fs::create_dir_all(&dir) {
            let message = e.to_string();
            error!("Error saving partition {key} to disk: {message}", key, message);
            self.write_failures += 1;
            return;
        }
        let rows = table.num_rows();
        if let Err(e) = table.write_parquet(&dir.join(PARQUET_FILE)) {
            let message = e.to_string();
            error!(
                "Error saving partition {key} parquet to disk: {message}",
                key,
                message,
            );
            self.write_failures += 1;
        }
        if let Err(e) = table.write_csv(&dir.join(CSV_FILE)) {
            let message = e.to_string();
            error!(
                "Error saving partition {key} csv to disk: {message}",
                key,
                message,
            );
            self.write_failures += 1;
        }
        debug!("Saved partition {key} with {rows} rows", key, rows);
    }

    /// Flush and return to the Closed state.
    pub fn finish(&mut self) {
        self.flush();
        self.state = SinkState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> JsonRow {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_resume_appends_to_existing_rows() {
        let tmp = TempDir::new().unwrap();
        let mut sink = PartitionSink::new(tmp.path());

        sink.open("20240618");
        sink.append(&record(json!({"a": 1})));
        sink.append(&record(json!({"a": 2})));
        sink.finish();

        // A later run reloads the durable state before appending
        let mut sink = PartitionSink::new(tmp.path());
        sink.open("20240618");
        sink.append(&record(json!({"a": 3, "b": "new"})));
        sink.finish();

        let table = WideTable::read_parquet(&tmp.path().join("20240618").join(PARQUET_FILE)).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.value(0, "a"), Some(&json!(1)));
        assert_eq!(table.value(1, "a"), Some(&json!(2)));
        assert_eq!(table.value(2, "b"), Some(&json!("new")));
        assert_eq!(table.value(0, "b"), None);
        assert_eq!(sink.write_failures(), 0);
    }

    #[test]
    fn test_flush_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut sink = PartitionSink::new(tmp.path());
        sink.open("20240618");
        sink.append(&record(json!({"a": 1})));

        sink.flush();
        let path = tmp.path().join("20240618").join(PARQUET_FILE);
        let first = std::fs::read(&path).unwrap();
        sink.flush();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rotating_keys_flushes_previous_partition() {
        let tmp = TempDir::new().unwrap();
        let mut sink = PartitionSink::new(tmp.path());
        sink.open("20240618");
        sink.append(&record(json!({"a": 1})));
        sink.open("20240619");
        sink.append(&record(json!({"a": 2})));
        sink.finish();

        for key in ["20240618", "20240619"] {
            let table = WideTable::read_parquet(&tmp.path().join(key).join(PARQUET_FILE)).unwrap();
            assert_eq!(table.num_rows(), 1);
        }
    }

    #[test]
    fn test_csv_fallback_when_parquet_missing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("20240618");
        std::fs::create_dir_all(&dir).unwrap();

        let mut table = WideTable::new();
        table.push_row(record(json!({"a": 1})));
        table.write_csv(&dir.join(CSV_FILE)).unwrap();

        let mut sink = PartitionSink::new(tmp.path());
        sink.open("20240618");
        sink.append(&record(json!({"a": 2})));
        sink.finish();

        let loaded = WideTable::read_parquet(&dir.join(PARQUET_FILE)).unwrap();
        assert_eq!(loaded.num_rows(), 2);
    }

    #[test]
    fn test_append_normalizes_nested_objects() {
        let tmp = TempDir::new().unwrap();
        let mut sink = PartitionSink::new(tmp.path());
        sink.open("20240618");
        sink.append(&record(json!({"outer": {"inner": 1}, "list": [1, 2]})));
        sink.finish();

        let table = WideTable::read_parquet(&tmp.path().join("20240618").join(PARQUET_FILE)).unwrap();
        assert_eq!(table.value(0, "outer.inner"), Some(&json!(1)));
        assert_eq!(table.value(0, "list"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_write_failure_is_counted_not_fatal() {
        let tmp = TempDir::new().unwrap();
        // A plain file where the source directory should be makes
        // partition directory creation fail.
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, b"x").unwrap();

        let mut sink = PartitionSink::new(&blocked);
        sink.open("20240618");
        sink.append(&record(json!({"a": 1})));
        sink.finish();
        assert!(sink.write_failures() > 0);
    }
}
