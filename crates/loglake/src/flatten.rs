//! Structural flattening of nested JSON columns.
//!
//! `normalize_record` is the light, per-record normalization applied at
//! ingest time: nested objects become dotted scalar keys, lists are
//! kept whole. `flatten_table` is the full recursive pass used by the
//! merger: list columns are exploded into extra rows and record
//! columns expanded into `col.field` columns until no complex columns
//! remain.

use serde_json::{Map, Value};

use crate::table::{JsonRow, WideTable};
use diagnostics::*;

/// Flatten nested objects in `record` into dotted top-level keys.
/// `{"a": {"b": 1}, "c": [2]}` becomes `{"a.b": 1, "c": [2]}`.
pub fn normalize_record(record: &JsonRow) -> JsonRow {
    let mut flat = Map::new();
    normalize_into(None, record, &mut flat);
    flat
}

fn normalize_into(prefix: Option<&str>, record: &JsonRow, out: &mut JsonRow) {
    for (key, value) in record {
        let name = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => normalize_into(Some(&name), inner, out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}

/// Repeatedly expand complex (list- or record-valued) columns until
/// none remain, or until `max_depth` passes have run (`None` means
/// run to the fixed point).
///
/// Exploding a list duplicates the row's sibling columns once per
/// element; an empty list keeps its row with a null in that column.
/// Expansion rewrites each row in place, so row identity is preserved
/// by construction.
pub fn flatten_table(mut table: WideTable, max_depth: Option<usize>) -> WideTable {
    debug!("Starting recursive flattening");
    let mut depth = 0;
    loop {
        let complex = complex_columns(&table);
        if complex.is_empty() {
            break;
        }
        for column in &complex {
            table = flatten_column(table, column);
        }
        depth += 1;
        if max_depth.is_some_and(|limit| depth >= limit) {
            break;
        }
    }
    debug!("Finished recursive flattening after {depth} passes", depth);
    table
}

fn complex_columns(table: &WideTable) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|column| {
            table.rows().iter().any(|row| {
                matches!(
                    row.get(column.as_str()),
                    Some(Value::Array(_)) | Some(Value::Object(_))
                )
            })
        })
        .cloned()
        .collect()
}

/// Expand one complex column, exploding list values first so every
/// remaining value is a single record, scalar, or null.
fn flatten_column(table: WideTable, column: &str) -> WideTable {
    debug!("Flattening column {column}", column);
    let mut out = WideTable::new();
    for name in table.columns() {
        if name != column {
            out.register_column(name);
        }
    }

    for row in table.into_rows() {
        match row.get(column).cloned() {
            Some(Value::Array(items)) if items.is_empty() => {
                let mut exploded = row;
                exploded.insert(column.to_string(), Value::Null);
                out.push_row(expand_row(exploded, column));
            }
            Some(Value::Array(items)) => {
                for item in items {
                    let mut exploded = row.clone();
                    exploded.insert(column.to_string(), item);
                    out.push_row(expand_row(exploded, column));
                }
            }
            _ => out.push_row(expand_row(row, column)),
        }
    }
    out
}

/// Replace `row[column]` with its expansion: records become dotted
/// `column.field` entries; scalars stay under `column`; nested lists
/// (lists of lists) stay under `column` for the next pass.
fn expand_row(mut row: JsonRow, column: &str) -> JsonRow {
    match row.remove(column) {
        Some(Value::Object(inner)) => {
            let mut nested = Map::new();
            normalize_into(Some(column), &inner, &mut nested);
            for (key, value) in nested {
                row.insert(key, value);
            }
            row
        }
        Some(Value::Null) | None => row,
        Some(other) => {
            row.insert(column.to_string(), other);
            row
        }
    }
}
