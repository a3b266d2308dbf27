/// `basins_passed.csv`: one row per basin whose stages all succeeded.
use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "basins_passed.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub basin_id: String,
    /// Older manifests call this column `nproc`.
    #[serde(alias = "nproc")]
    pub n_cats: usize,
}

/// Appends rows and flushes after each, so an interrupted batch keeps the
/// basins finished so far.
pub struct ManifestWriter {
    writer: csv::Writer<File>,
}

impl ManifestWriter {
    /// Truncate `path` and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("creating manifest {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(["basin_id", "n_cats"])?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, row: &ManifestRow) -> Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening manifest {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<ManifestRow>, _>>()
        .with_context(|| format!("reading manifest {}", path.display()))?;
    Ok(rows)
}
