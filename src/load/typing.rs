// src/load/typing.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use csv::ReaderBuilder;
use std::io::Cursor;
use std::sync::Arc;

/// Representation chosen for one decoded CSV column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnType {
    Int64,
    Float64,
    Utf8,
}

/// Parse headed CSV `text` into a RecordBatch.
///
/// Columns named in `string_columns` are pinned to nullable strings no
/// matter what their values look like. A column containing at least one
/// missing value (empty cell) is also pinned to nullable strings for the
/// whole batch, so append batches with heterogeneous missingness keep a
/// consistent type. Everything else is inferred from the values: all
/// integers, all numerics, or strings.
pub fn decode_csv(text: &str, string_columns: &[&str]) -> Result<RecordBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(Cursor::new(text.as_bytes()));

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        let row = (0..headers.len())
            .map(|i| {
                record.get(i).and_then(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
            })
            .collect();
        rows.push(row);
    }

    let types = derive_column_types(&headers, &rows, string_columns);
    build_batch(&headers, &rows, &types)
}

/// For each column: overrides win, then any missing value forces utf8,
/// then the narrowest type every present value parses as.
fn derive_column_types(
    headers: &[String],
    rows: &[Vec<Option<String>>],
    string_columns: &[&str],
) -> Vec<ColumnType> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if string_columns.contains(&name.as_str()) {
                return ColumnType::Utf8;
            }

            let mut saw_value = false;
            let mut int_ok = true;
            let mut float_ok = true;
            for row in rows {
                match row.get(idx).and_then(|cell| cell.as_deref()) {
                    None => return ColumnType::Utf8,
                    Some(value) => {
                        saw_value = true;
                        if int_ok && value.parse::<i64>().is_err() {
                            int_ok = false;
                        }
                        if float_ok && value.parse::<f64>().is_err() {
                            float_ok = false;
                        }
                    }
                }
            }

            if !saw_value {
                ColumnType::Utf8
            } else if int_ok {
                ColumnType::Int64
            } else if float_ok {
                ColumnType::Float64
            } else {
                ColumnType::Utf8
            }
        })
        .collect()
}

fn build_batch(
    headers: &[String],
    rows: &[Vec<Option<String>>],
    types: &[ColumnType],
) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(headers.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(headers.len());

    for (idx, (name, ty)) in headers.iter().zip(types).enumerate() {
        match ty {
            ColumnType::Int64 => {
                let mut builder = Int64Builder::with_capacity(rows.len());
                for row in rows {
                    let value = row.get(idx).and_then(|c| c.as_deref());
                    builder.append_option(value.and_then(|v| v.parse::<i64>().ok()));
                }
                fields.push(Field::new(name, DataType::Int64, true));
                arrays.push(Arc::new(builder.finish()) as ArrayRef);
            }
            ColumnType::Float64 => {
                let mut builder = Float64Builder::with_capacity(rows.len());
                for row in rows {
                    let value = row.get(idx).and_then(|c| c.as_deref());
                    builder.append_option(value.and_then(|v| v.parse::<f64>().ok()));
                }
                fields.push(Field::new(name, DataType::Float64, true));
                arrays.push(Arc::new(builder.finish()) as ArrayRef);
            }
            ColumnType::Utf8 => {
                let mut builder = StringBuilder::new();
                for row in rows {
                    builder.append_option(row.get(idx).and_then(|c| c.as_deref()));
                }
                fields.push(Field::new(name, DataType::Utf8, true));
                arrays.push(Arc::new(builder.finish()) as ArrayRef);
            }
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .context("building record batch from decoded CSV")
}
