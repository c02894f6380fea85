// src/extract/mod.rs

use crate::load;
use crate::partition::Partition;
use crate::store::EqrStore;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::instrument;
use zip::ZipArchive;

/// Extract one quarter of EQR data into the store.
///
/// Iterates every entry of the quarterly archive in archive order, treating
/// each one as a nested per-seller archive. Nothing is skipped or
/// deduplicated; a malformed seller archive aborts the whole partition.
#[instrument(level = "info", skip(store, data_dir))]
pub fn extract_partition(store: &EqrStore, data_dir: &Path, partition: Partition) -> Result<()> {
    let archive_path = partition.archive_path(data_dir);
    let file = File::open(&archive_path)
        .with_context(|| format!("opening quarterly archive `{}`", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading quarterly archive `{}`", archive_path.display()))?;

    let progress = ProgressBar::new(archive.len() as u64);
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).with_context(|| {
            format!("reading entry #{} of `{}`", index, archive_path.display())
        })?;
        let name = entry.name().to_string();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("buffering seller archive `{}`", name))?;
        drop(entry);

        let mut seller = ZipArchive::new(Cursor::new(buf))
            .with_context(|| format!("opening seller archive `{}`", name))?;
        load::load_seller(store, &mut seller, &partition)
            .with_context(|| format!("loading seller archive `{}`", name))?;
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(())
}
