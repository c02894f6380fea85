// src/store/mod.rs

use anyhow::{bail, Context, Result};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Append-only DuckDB store holding the three destination tables.
///
/// The store owns only the database path; every operation opens its own
/// connection and releases it on return, so there is no process-wide
/// engine state and separate stores never share a handle.
pub struct EqrStore {
    db_path: PathBuf,
}

impl EqrStore {
    /// Set up the output database at `db_path`.
    ///
    /// An existing database is a hard error unless `clobber` is set, in
    /// which case it (and its WAL sidecar) is removed first. The check
    /// runs before any processing, so a refused run modifies nothing.
    pub fn create(db_path: impl Into<PathBuf>, clobber: bool) -> Result<Self> {
        let db_path: PathBuf = db_path.into();

        if db_path.exists() {
            if !clobber {
                bail!(
                    "output database `{}` already exists and we don't want to clobber it; \
                     move it aside or rerun with --clobber",
                    db_path.display()
                );
            }
            info!(db = %db_path.display(), "clobbering existing database");
            fs::remove_file(&db_path)
                .with_context(|| format!("removing existing database `{}`", db_path.display()))?;
            let wal_path = PathBuf::from(format!("{}.wal", db_path.display()));
            if wal_path.exists() {
                fs::remove_file(&wal_path)
                    .with_context(|| format!("removing WAL sidecar `{}`", wal_path.display()))?;
            }
        }

        let store = EqrStore { db_path };
        // Materialize the file up front so an empty run still leaves a
        // valid (empty) database behind.
        store.connect()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection scoped to one operation.
    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("opening DuckDB database `{}`", self.db_path.display()))
    }

    /// Append `batch` to `table`, creating the table from the batch schema
    /// on first use. Existing rows are preserved; no row index is written.
    pub fn append(&self, table: &str, batch: &RecordBatch) -> Result<()> {
        let conn = self.connect()?;

        let columns: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name()), duckdb_type(f.data_type())))
            .collect();
        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            columns.join(", ")
        );
        conn.execute(&create_sql, [])
            .with_context(|| format!("creating destination table `{}`", table))?;

        let mut appender = conn
            .appender(table)
            .with_context(|| format!("creating appender for table `{}`", table))?;
        appender
            .append_record_batch(batch.clone())
            .with_context(|| format!("appending batch to table `{}`", table))?;
        appender
            .flush()
            .with_context(|| format!("flushing appender for table `{}`", table))?;

        debug!(table, rows = batch.num_rows(), "appended batch");
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map the column types the loader emits onto DuckDB SQL types.
fn duckdb_type(dt: &DataType) -> &'static str {
    match dt {
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float64 => "DOUBLE",
        _ => "VARCHAR",
    }
}
