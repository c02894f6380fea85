// src/partition/mod.rs

use anyhow::{Context, Result};
use clap::ValueEnum;
use glob::glob;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default working set of partitions, used when the CLI supplies none.
pub const WORKING_YEARS: &[i32] = &[2020];
pub const WORKING_QUARTERS: &[Quarter] = &[Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

/// One of the four calendar-quarter labels used in EQR archive names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "Q4" => Some(Quarter::Q4),
            _ => None,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one top-level quarterly archive. Created by the enumerator,
/// consumed by the extractor, never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    pub year: i32,
    pub quarter: Quarter,
}

impl Partition {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Partition { year, quarter }
    }

    /// Archive filename for this partition, e.g. `CSV_2020_Q1.zip`.
    pub fn archive_name(&self) -> String {
        format!("CSV_{}_{}.zip", self.year, self.quarter)
    }

    pub fn archive_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.archive_name())
    }

    /// Inverse of `archive_name`. Returns None for filenames that do not
    /// encode a (year, quarter) pair.
    pub fn from_archive_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("CSV_")?.strip_suffix(".zip")?;
        let (year, quarter) = stem.split_once('_')?;
        Some(Partition {
            year: year.parse().ok()?,
            quarter: Quarter::from_label(quarter)?,
        })
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.quarter)
    }
}

/// Full years x quarters cross product, in the given order.
pub fn cross_product(years: &[i32], quarters: &[Quarter]) -> Vec<Partition> {
    years
        .iter()
        .flat_map(|&year| quarters.iter().map(move |&quarter| Partition::new(year, quarter)))
        .collect()
}

/// Derive one partition per quarterly archive present in `data_dir`.
/// Files matching the glob but not the naming convention are skipped.
pub fn discover(data_dir: &Path) -> Result<Vec<Partition>> {
    let pattern = format!("{}/CSV_*_*.zip", data_dir.display());
    let mut partitions = Vec::new();

    for entry in glob(&pattern).context("invalid glob pattern for partition discovery")? {
        let path = entry.context("reading glob entry during partition discovery")?;
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        match Partition::from_archive_name(name) {
            Some(partition) => partitions.push(partition),
            None => warn!(file = %name, "archive name does not encode a partition, skipping"),
        }
    }

    Ok(partitions)
}
