// src/load/mod.rs

use crate::partition::Partition;
use crate::store::EqrStore;
use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use encoding_rs::mem::decode_latin1;
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;

pub mod typing;

/// One (filename suffix, destination table) dispatch entry.
pub struct TableSpec {
    pub suffix: &'static str,
    pub table: &'static str,
    /// Columns pinned to nullable strings regardless of their values.
    pub string_columns: &'static [&'static str],
}

/// The three files a seller archive may carry. A seller holds at most one
/// file per suffix; missing files just leave their table untouched.
pub const TABLE_SPECS: &[TableSpec] = &[
    TableSpec {
        suffix: "indexPub.CSV",
        table: "index_publishing",
        string_columns: &[],
    },
    TableSpec {
        suffix: "ident.CSV",
        table: "identities",
        string_columns: &["contact_zip", "contact_phone"],
    },
    TableSpec {
        suffix: "contracts.CSV",
        table: "contracts",
        string_columns: &["seller_history_name"],
    },
];

/// Load every recognised table file from one seller archive into the store,
/// tagging each batch with the governing partition.
///
/// All three suffixes are matched against the entry list before anything is
/// decoded, so an ambiguous archive (two files sharing a suffix) fails
/// without contributing any rows.
pub fn load_seller<R: Read + Seek>(
    store: &EqrStore,
    seller: &mut ZipArchive<R>,
    partition: &Partition,
) -> Result<()> {
    let names: Vec<String> = seller.file_names().map(str::to_owned).collect();

    let mut selected: Vec<(&TableSpec, &str)> = Vec::new();
    for spec in TABLE_SPECS {
        let matches: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| name.ends_with(spec.suffix))
            .collect();
        match matches.as_slice() {
            [] => {}
            [name] => selected.push((spec, *name)),
            many => bail!(
                "seller archive holds {} files matching `*{}` (expected at most one): {:?}",
                many.len(),
                spec.suffix,
                many
            ),
        }
    }

    for (spec, name) in selected {
        let mut entry = seller
            .by_name(name)
            .with_context(|| format!("reading `{}` from seller archive", name))?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("buffering `{}`", name))?;
        drop(entry);

        // EQR CSVs are Latin-1, not UTF-8
        let text = decode_latin1(&buf);
        let batch = typing::decode_csv(&text, spec.string_columns)
            .with_context(|| format!("decoding `{}` for table `{}`", name, spec.table))?;
        let batch = tag_partition(batch, partition)?;

        store.append(spec.table, &batch)?;
        debug!(table = spec.table, file = %name, rows = batch.num_rows(), "loaded seller table");
    }

    Ok(())
}

/// Append literal `year` and `quarter` columns populated from `partition`
/// to every row of `batch`.
pub fn tag_partition(batch: RecordBatch, partition: &Partition) -> Result<RecordBatch> {
    let rows = batch.num_rows();

    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    fields.push(Field::new("year", DataType::Int32, false));
    columns.push(Arc::new(Int32Array::from(vec![partition.year; rows])) as ArrayRef);

    fields.push(Field::new("quarter", DataType::Utf8, false));
    columns.push(Arc::new(StringArray::from(vec![partition.quarter.as_str(); rows])) as ArrayRef);

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("appending partition columns to batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Quarter;
    use anyhow::Result;
    use duckdb::Connection;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    /// Build an in-memory seller ZIP from (entry name, contents) pairs.
    fn seller_zip(files: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, contents) in files {
                let options: FileOptions<'_, ()> =
                    FileOptions::default().compression_method(CompressionMethod::Stored);
                zip.start_file(*name, options).unwrap();
                zip.write_all(contents).unwrap();
            }
            zip.finish().unwrap();
        }
        ZipArchive::new(Cursor::new(buf)).unwrap()
    }

    fn test_store(dir: &std::path::Path) -> EqrStore {
        EqrStore::create(dir.join("eqr.duckdb"), false).unwrap()
    }

    #[test]
    fn single_match_appends_one_tagged_batch() -> Result<()> {
        let dir = tempdir()?;
        let store = test_store(dir.path());
        let mut seller = seller_zip(&[(
            "XYZ_ident.CSV",
            b"contact_name,contact_zip\nAlice,02139\nBob,10001\n".as_slice(),
        )]);

        load_seller(&store, &mut seller, &Partition::new(2020, Quarter::Q1))?;

        let conn = Connection::open(store.db_path())?;
        let (count, year, quarter): (i64, i32, String) = conn.query_row(
            "SELECT COUNT(*), MIN(year), MIN(quarter) FROM identities",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        assert_eq!(count, 2);
        assert_eq!(year, 2020);
        assert_eq!(quarter, "Q1");

        // contact_zip is an override column: text, leading zero intact
        let zip_code: String = conn.query_row(
            "SELECT contact_zip FROM identities WHERE contact_name = 'Alice'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(zip_code, "02139");
        Ok(())
    }

    #[test]
    fn unmatched_suffixes_leave_their_tables_untouched() -> Result<()> {
        let dir = tempdir()?;
        let store = test_store(dir.path());
        let mut seller = seller_zip(&[(
            "XYZ_contracts.CSV",
            b"contract_id,seller_history_name\n7,Acme Power\n".as_slice(),
        )]);

        load_seller(&store, &mut seller, &Partition::new(2020, Quarter::Q2))?;

        let conn = Connection::open(store.db_path())?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM contracts", [], |r| r.get(0))?;
        assert_eq!(count, 1);
        // no ident or indexPub files, so neither table was created
        assert!(conn.prepare("SELECT * FROM identities").is_err());
        assert!(conn.prepare("SELECT * FROM index_publishing").is_err());
        Ok(())
    }

    #[test]
    fn ambiguous_suffix_match_fails_and_appends_nothing() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());
        let mut seller = seller_zip(&[
            ("XYZ_ident.CSV", b"contact_name\nAlice\n".as_slice()),
            ("A_contracts.CSV", b"contract_id\n1\n".as_slice()),
            ("B_contracts.CSV", b"contract_id\n2\n".as_slice()),
        ]);

        let err = load_seller(&store, &mut seller, &Partition::new(2020, Quarter::Q3))
            .expect_err("duplicate contracts files must fail");
        assert!(
            err.to_string().contains("contracts.CSV"),
            "unexpected error: {}",
            err
        );

        // validation runs before any decode, so even the unambiguous
        // ident file contributed no rows
        let conn = Connection::open(store.db_path()).unwrap();
        assert!(conn.prepare("SELECT * FROM identities").is_err());
        assert!(conn.prepare("SELECT * FROM contracts").is_err());
    }

    #[test]
    fn latin1_bytes_decode_to_the_right_characters() -> Result<()> {
        let dir = tempdir()?;
        let store = test_store(dir.path());
        // "José" with an ISO-8859-1 e-acute (0xE9)
        let mut seller = seller_zip(&[(
            "XYZ_ident.CSV",
            b"contact_name\nJos\xE9\n".as_slice(),
        )]);

        load_seller(&store, &mut seller, &Partition::new(2021, Quarter::Q4))?;

        let conn = Connection::open(store.db_path())?;
        let name: String =
            conn.query_row("SELECT contact_name FROM identities", [], |r| r.get(0))?;
        assert_eq!(name, "José");
        Ok(())
    }

    #[test]
    fn partition_tag_lands_on_every_row() -> Result<()> {
        let batch = typing::decode_csv("a\n1\n2\n3\n", &[])?;
        let tagged = tag_partition(batch, &Partition::new(2020, Quarter::Q4))?;

        assert_eq!(tagged.num_columns(), 3);
        let years = tagged
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        let quarters = tagged
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        for row in 0..tagged.num_rows() {
            assert_eq!(years.value(row), 2020);
            assert_eq!(quarters.value(row), "Q4");
        }
        Ok(())
    }
}
