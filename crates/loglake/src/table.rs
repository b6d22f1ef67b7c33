//! `WideTable`: the in-memory tabular accumulator.
//!
//! Rows are decoded JSON objects; columns are the union of all fields
//! seen so far, in first-seen order. Fields absent from a row read as
//! null. Durable storage is Parquet (authoritative) with a CSV mirror;
//! conversion goes through arrow-json so nested list/struct values
//! survive the Parquet round trip.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::builder::StringBuilder;
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value};

use crate::error::Result;

/// One decoded record: a flat or nested JSON object.
pub type JsonRow = Map<String, Value>;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WideTable {
    columns: Vec<String>,
    column_set: HashSet<String>,
    rows: Vec<JsonRow>,
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[JsonRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<JsonRow> {
        self.rows
    }

    /// Value at (`row`, `column`); `None` stands for null.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| {
            let v = r.get(column)?;
            if v.is_null() { None } else { Some(v) }
        })
    }

    pub fn register_column(&mut self, name: &str) {
        if !self.column_set.contains(name) {
            self.column_set.insert(name.to_string());
            self.columns.push(name.to_string());
        }
    }

    /// Append one row, extending the column union with any new fields.
    pub fn push_row(&mut self, row: JsonRow) {
        for key in row.keys() {
            self.register_column(key);
        }
        self.rows.push(row);
    }

    /// Append all of `other`'s rows, unioning its columns.
    pub fn concat(&mut self, other: WideTable) {
        for column in &other.columns {
            self.register_column(column);
        }
        self.rows.extend(other.rows);
    }

    fn infer_schema(&self) -> Result<Schema> {
        if self.rows.is_empty() {
            return Ok(Schema::empty());
        }
        let values = self.rows.iter().map(|row| Ok(Value::Object(row.clone())));
        let inferred = arrow_json::reader::infer_json_schema_from_iterator(values)?;
        // Inference does not promise field order; restore the table's
        // first-seen column order. Parquet has no untyped-null column
        // type, so all-null columns are stored as nullable strings.
        // A registered column absent from every row (e.g. reloaded from
        // a schema whose rows carry only nulls) is kept the same way.
        let mut fields: Vec<Arc<Field>> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match inferred.field_with_name(column) {
                Ok(field) => match field.data_type() {
                    DataType::Null => {
                        fields.push(Arc::new(Field::new(column, DataType::Utf8, true)));
                    }
                    _ => fields.push(Arc::new(field.clone())),
                },
                Err(_) => fields.push(Arc::new(Field::new(column, DataType::Utf8, true))),
            }
        }
        Ok(Schema::new(fields))
    }

    /// Convert to a single Arrow record batch with an inferred schema.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema: SchemaRef = Arc::new(self.infer_schema()?);
        let mut decoder = arrow_json::ReaderBuilder::new(Arc::clone(&schema))
            .with_coerce_primitive(true)
            .build_decoder()?;
        decoder.serialize(&self.rows)?;
        match decoder.flush()? {
            Some(batch) => Ok(batch),
            None => Ok(RecordBatch::new_empty(schema)),
        }
    }

    /// Rebuild a table from record batches. Columns are seeded from the
    /// schema so all-null columns survive even though the JSON writer
    /// omits their keys.
    pub fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Self> {
        let mut table = WideTable::new();
        for field in schema.fields() {
            table.register_column(field.name());
        }
        let mut writer = arrow_json::ArrayWriter::new(Vec::new());
        for batch in batches {
            writer.write(batch)?;
        }
        writer.finish()?;
        let buffer = writer.into_inner();
        if !buffer.is_empty() {
            let rows: Vec<JsonRow> = serde_json::from_slice(&buffer)?;
            for row in rows {
                table.push_row(row);
            }
        }
        Ok(table)
    }

    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        let batch = self.to_record_batch()?;
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    pub fn read_parquet(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = Arc::clone(builder.schema());
        let reader = builder.build()?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Self::from_record_batches(&schema, &batches)
    }

    /// CSV mirror of the table. Every cell is rendered as text; list
    /// and record values become compact JSON, matching what the
    /// original tooling produced for nested cells.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let batch = self.to_string_batch()?;
        let file = File::create(path)?;
        let mut writer = arrow_csv::WriterBuilder::new().with_header(true).build(file);
        writer.write(&batch)?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let format = arrow_csv::reader::Format::default().with_header(true);
        let (schema, _) = format.infer_schema(&mut file, None)?;
        let schema = Arc::new(schema);
        let file = File::open(path)?;
        let reader = arrow_csv::ReaderBuilder::new(Arc::clone(&schema))
            .with_header(true)
            .build(file)?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Self::from_record_batches(&schema, &batches)
    }

    fn to_string_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c, DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut builder = StringBuilder::new();
            for row in &self.rows {
                match row.get(column) {
                    None | Some(Value::Null) => builder.append_null(),
                    Some(Value::String(s)) => builder.append_value(s),
                    Some(other) => builder.append_value(other.to_string()),
                }
            }
            arrays.push(Arc::new(builder.finish()));
        }
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row(value: Value) -> JsonRow {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_column_union_in_first_seen_order() {
        let mut table = WideTable::new();
        table.push_row(row(json!({"a": 1, "b": "x"})));
        table.push_row(row(json!({"c": true, "a": 2})));
        assert_eq!(table.columns(), &["a", "b", "c"]);
        assert_eq!(table.num_rows(), 2);
        // Missing field reads as null
        assert_eq!(table.value(1, "b"), None);
    }

    #[test]
    fn test_concat_unions_columns() {
        let mut left = WideTable::new();
        left.push_row(row(json!({"a": 1})));
        let mut right = WideTable::new();
        right.push_row(row(json!({"b": 2})));
        left.concat(right);
        assert_eq!(left.columns(), &["a", "b"]);
        assert_eq!(left.num_rows(), 2);
        assert_eq!(left.value(1, "b"), Some(&json!(2)));
    }

    #[test]
    fn test_parquet_round_trip_preserves_nested_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.parquet");

        let mut table = WideTable::new();
        table.push_row(row(json!({"a": 1, "b": [{"c": 1}, {"c": 2}]})));
        table.push_row(row(json!({"a": 2})));
        table.write_parquet(&path).unwrap();

        let loaded = WideTable::read_parquet(&path).unwrap();
        assert_eq!(loaded.num_rows(), 2);
        assert_eq!(loaded.value(0, "a"), Some(&json!(1)));
        assert_eq!(loaded.value(0, "b"), Some(&json!([{"c": 1}, {"c": 2}])));
        assert_eq!(loaded.value(1, "b"), None);
    }

    #[test]
    fn test_csv_round_trip_scalars() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");

        let mut table = WideTable::new();
        table.push_row(row(json!({"a": 1, "b": "hello"})));
        table.push_row(row(json!({"a": 2, "b": "world"})));
        table.write_csv(&path).unwrap();

        let loaded = WideTable::read_csv(&path).unwrap();
        assert_eq!(loaded.num_rows(), 2);
        assert_eq!(loaded.value(0, "a"), Some(&json!(1)));
        assert_eq!(loaded.value(1, "b"), Some(&json!("world")));
    }

    #[test]
    fn test_csv_stringifies_nested_cells() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");

        let mut table = WideTable::new();
        table.push_row(row(json!({"a": {"k": 1}})));
        table.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(r#"{""k"":1}"#) || contents.contains(r#"{"k":1}"#));
    }

    #[test]
    fn test_all_null_column_survives_parquet() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.parquet");

        let mut table = WideTable::new();
        table.push_row(row(json!({"a": 1, "gone": null})));
        table.write_parquet(&path).unwrap();

        let loaded = WideTable::read_parquet(&path).unwrap();
        assert!(loaded.columns().contains(&"gone".to_string()));
        assert_eq!(loaded.value(0, "gone"), None);
    }

    #[test]
    fn test_all_null_column_survives_reload_and_rewrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.parquet");

        let mut table = WideTable::new();
        table.push_row(row(json!({"a": 1, "gone": null})));
        table.write_parquet(&path).unwrap();

        // Reloaded rows omit the all-null key entirely; appending and
        // rewriting must still keep the column in the schema.
        let mut resumed = WideTable::read_parquet(&path).unwrap();
        resumed.push_row(row(json!({"a": 2})));
        resumed.write_parquet(&path).unwrap();

        let second = WideTable::read_parquet(&path).unwrap();
        assert_eq!(second.num_rows(), 2);
        assert!(second.columns().contains(&"gone".to_string()));
        assert_eq!(second.value(0, "gone"), None);
        assert_eq!(second.value(1, "a"), Some(&json!(2)));
    }
}
