/// Basin work-unit discovery under `input_dir`.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::forcing::basin_forcing_dir;

/// One basin to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasinWorkUnit {
    pub id: String,
    /// Geopackage as found under `input_dir`.
    pub source_gpkg: PathBuf,
    /// Absolute basin directory under `output_dir`.
    pub basin_dir: PathBuf,
    pub forcing_dir: PathBuf,
}

impl BasinWorkUnit {
    /// Geopackage inside the basin's own `data` directory.
    pub fn gpkg(&self) -> PathBuf {
        match self.source_gpkg.file_name() {
            Some(name) => self.basin_dir.join("data").join(name),
            None => self.source_gpkg.clone(),
        }
    }
}

/// The single `.gpkg` in `dir`, if there is exactly one.
fn single_gpkg(dir: &Path) -> Option<PathBuf> {
    let mut found = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "gpkg"));
    let first = found.next()?;
    found.next().is_none().then_some(first)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("resolving working directory")?
            .join(path))
    }
}

/// Basins of `input_dir`, sorted by id.
///
/// A basin is a directory whose `data/` holds exactly one `.gpkg`; anything
/// else is skipped.
pub fn discover(
    input_dir: &Path,
    output_dir: &Path,
    forcing_template: &str,
) -> Result<Vec<BasinWorkUnit>> {
    let output_dir = absolute(output_dir)?;
    let mut dirs: Vec<PathBuf> = fs::read_dir(input_dir)
        .with_context(|| format!("listing input_dir {}", input_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut units = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let Some(id) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let Some(gpkg) = single_gpkg(&dir.join("data")) else {
            log::debug!("skipping {}: no single geopackage in data/", dir.display());
            continue;
        };
        units.push(BasinWorkUnit {
            source_gpkg: absolute(&gpkg)?,
            basin_dir: output_dir.join(&id),
            forcing_dir: absolute(&basin_forcing_dir(forcing_template, &id))?,
            id,
        });
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basin(root: &Path, id: &str, gpkgs: &[&str]) {
        let data = root.join(id).join("data");
        fs::create_dir_all(&data).unwrap();
        for g in gpkgs {
            fs::write(data.join(g), b"").unwrap();
        }
    }

    #[test]
    fn only_single_gpkg_basins_are_units() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        basin(&input, "02", &["gage_02.gpkg"]);
        basin(&input, "01", &["gage_01.gpkg"]);
        basin(&input, "03", &["a.gpkg", "b.gpkg"]);
        basin(&input, "04", &[]);
        fs::write(input.join("README"), b"").unwrap();

        let out = tmp.path().join("out");
        let units = discover(&input, &out, "/forcing/{*}").unwrap();
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["01", "02"]);
        assert_eq!(units[0].basin_dir, out.join("01"));
        assert_eq!(units[0].forcing_dir, Path::new("/forcing/01"));
        assert_eq!(units[1].gpkg(), out.join("02/data/gage_02.gpkg"));
    }
}
