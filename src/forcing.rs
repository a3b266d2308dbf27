/// Basin forcing resolution and forcing-generation inputs.
///
/// The configured forcing directory may contain `{*}`, replaced by the basin
/// id. CSV forcing is one file per catchment; NetCDF forcing is a single
/// file per basin.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use basinflow_core::params::constants::STEPS_PER_YEAR;
use basinflow_core::params::sft::mean_annual_temperature;
use basinflow_core::realization::ForcingDescriptor;
use basinflow_core::window::SimulationWindow;
use serde::Deserialize;
use serde_yaml::Value;

use crate::yaml;

/// Replaced by the basin id in `forcings.forcing_dir`.
pub const BASIN_PLACEHOLDER: &str = "{*}";

/// Air temperature column of the per-catchment CSV forcing.
pub const TEMPERATURE_COLUMN: &str = "T2D";

/// Suffix of NetCDF files with gaps filled by the downloader.
const CORRECTED_SUFFIX: &str = "_corrected";

pub const FORCING_CONFIG_FILE: &str = "forcing_config.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ForcingFormat {
    #[default]
    #[serde(rename = ".csv", alias = "csv")]
    Csv,
    #[serde(rename = ".nc", alias = "nc", alias = "netcdf")]
    NetCdf,
}

impl ForcingFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ForcingFormat::Csv => "csv",
            ForcingFormat::NetCdf => "nc",
        }
    }
}

pub fn basin_forcing_dir(template: &str, basin_id: &str) -> PathBuf {
    PathBuf::from(template.replace(BASIN_PLACEHOLDER, basin_id))
}

fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing forcing directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == ext))
        .collect();
    files.sort();
    Ok(files)
}

/// Forcing descriptor for a basin whose forcing lives in `dir`.
///
/// Fails when the directory is missing or holds no forcing of `format`.
pub fn resolve(dir: &Path, format: ForcingFormat) -> Result<ForcingDescriptor> {
    if !dir.is_dir() {
        bail!("forcing directory {} does not exist", dir.display());
    }
    let files = files_with_extension(dir, format.extension())?;
    match format {
        ForcingFormat::Csv => {
            if files.is_empty() {
                bail!("no .csv forcing files in {}", dir.display());
            }
            Ok(ForcingDescriptor::csv_per_feature(dir))
        }
        ForcingFormat::NetCdf => {
            let corrected = files.iter().find(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.ends_with(CORRECTED_SUFFIX))
            });
            let Some(path) = corrected.or(files.first()) else {
                bail!("no .nc forcing file in {}", dir.display());
            };
            Ok(ForcingDescriptor::NetCDF { path: path.clone() })
        }
    }
}

/// Per-catchment CSV in `dir`: `<id>.csv` or `<id>_<suffix>.csv`.
pub fn catchment_file(dir: &Path, id: &str) -> Option<PathBuf> {
    let prefix = format!("{id}_");
    files_with_extension(dir, "csv")
        .ok()?
        .into_iter()
        .find(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s == id || s.starts_with(&prefix))
        })
}

/// Mean of the first year of `T2D` in a catchment forcing CSV [K].
pub fn mean_annual_air_temperature(path: &Path) -> Result<Option<f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening forcing {}", path.display()))?;
    let Some(col) = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == TEMPERATURE_COLUMN)
    else {
        return Ok(None);
    };
    let mut samples = Vec::with_capacity(STEPS_PER_YEAR);
    for record in reader.records().take(STEPS_PER_YEAR) {
        let record = record.with_context(|| format!("reading forcing {}", path.display()))?;
        if let Some(v) = record.get(col).and_then(|s| s.trim().parse::<f64>().ok()) {
            samples.push(v);
        }
    }
    Ok(mean_annual_temperature(&samples))
}

/// Initial soil temperature per catchment from CSV forcing.
///
/// Catchments without a readable forcing file are left out; the parameter
/// engine falls back to its default.
pub fn soil_temperatures<'a>(
    dir: &Path,
    ids: impl Iterator<Item = &'a str>,
) -> BTreeMap<String, f64> {
    let mut temps = BTreeMap::new();
    for id in ids {
        let Some(file) = catchment_file(dir, id) else {
            log::warn!("{id}: no forcing CSV in {}, using default soil temperature", dir.display());
            continue;
        };
        match mean_annual_air_temperature(&file) {
            Ok(Some(t)) => {
                temps.insert(id.to_string(), t);
            }
            Ok(None) => log::warn!("{id}: {} has no {TEMPERATURE_COLUMN} column", file.display()),
            Err(err) => log::warn!("{id}: {err:#}"),
        }
    }
    temps
}

/// Forcing downloader config for one basin, written into `out_dir`.
pub fn write_forcing_config(
    template: &Path,
    gpkg: &Path,
    window: &SimulationWindow,
    format: ForcingFormat,
    out_dir: &Path,
) -> Result<PathBuf> {
    let mut doc = yaml::load(template)?;
    let (start_year, end_year) = window.year_span();
    yaml::set(&mut doc, &["gpkg"], gpkg.display().to_string())?;
    yaml::set(
        &mut doc,
        &["years"],
        Value::Sequence(vec![start_year.into(), end_year.into()]),
    )?;
    yaml::set(&mut doc, &["out_dir"], out_dir.display().to_string())?;
    yaml::set(&mut doc, &["forcing_format"], format!(".{}", format.extension()))?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating forcing directory {}", out_dir.display()))?;
    let path = out_dir.join(FORCING_CONFIG_FILE);
    yaml::save(&doc, &path)?;
    Ok(path)
}
