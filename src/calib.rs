/// ngen-cal configuration: the calibration template patched for one basin.
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use basinflow_core::schema::resolve_flowpath_attributes;
use basinflow_core::window::SimulationWindow;

use crate::hydrofabric::Hydrofabric;
use crate::yaml;

pub const CALIB_CONFIG_FILE: &str = "calib_config.yaml";

/// Waterbody whose simulated flow is compared against observations.
///
/// The single gaged flowpath when there is exactly one; otherwise the
/// divide with the largest total drainage area, i.e. the basin outlet.
pub fn eval_feature(hf: &impl Hydrofabric) -> Result<String> {
    let flowpaths = hf.flowpath_attributes()?;
    let columns = resolve_flowpath_attributes(&flowpaths.columns, true);
    if let Some(gage_col) = &columns.gages {
        let gaged: Vec<String> = flowpaths
            .rows
            .iter()
            .filter(|row| row.get(gage_col).is_some_and(|c| !c.is_null()))
            .filter_map(|row| row.get(&columns.key).and_then(|c| c.to_id()))
            .collect();
        if let [only] = gaged.as_slice() {
            return Ok(only.clone());
        }
        log::info!(
            "{} gaged flowpaths, using the largest drainage area as outlet",
            gaged.len()
        );
    }

    let divides = hf.divides()?;
    let outlet = divides
        .iter()
        .filter_map(|d| d.tot_drainage_area.map(|a| (a, d)))
        .max_by(|a, b| a.0.total_cmp(&b.0));
    match outlet.and_then(|(_, d)| d.number()) {
        Some(n) => Ok(format!("wb-{n}")),
        None => bail!("no gage and no drainage area to pick an evaluation feature"),
    }
}

/// `ngen` invocation as ngen-cal runs it; on macOS the embedded Python
/// needs its interpreter named explicitly.
pub fn model_binary(ngen: &Path) -> String {
    if cfg!(target_os = "macos") {
        format!("PYTHONEXECUTABLE=$(which python) {}", ngen.display())
    } else {
        ngen.display().to_string()
    }
}

pub struct CalibrationInputs<'a> {
    pub template: &'a Path,
    /// ngen-cal working directory.
    pub workdir: &'a Path,
    pub ngen: &'a Path,
    pub realization: &'a Path,
    pub gpkg: &'a Path,
    pub eval_feature: &'a str,
    /// Rank count and partition file when running under MPI.
    pub partitions: Option<(usize, &'a Path)>,
    pub evaluation: Option<SimulationWindow>,
}

/// Patch the template and write `<config_dir>/calib_config.yaml`.
pub fn write_config(inputs: &CalibrationInputs<'_>, config_dir: &Path) -> Result<PathBuf> {
    let mut doc = yaml::load(inputs.template)?;
    let stem = inputs
        .gpkg
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    yaml::set(&mut doc, &["general", "workdir"], inputs.workdir.display().to_string())?;
    yaml::set(&mut doc, &["model", "binary"], model_binary(inputs.ngen))?;
    yaml::set(
        &mut doc,
        &["model", "realization"],
        inputs.realization.display().to_string(),
    )?;
    yaml::set(&mut doc, &["model", "hydrofabric"], inputs.gpkg.display().to_string())?;
    // Must match the t-route title_string.
    yaml::set(
        &mut doc,
        &["model", "routing_output"],
        format!("./flowveldepth_{stem}.csv"),
    )?;
    yaml::set(&mut doc, &["model", "eval_feature"], inputs.eval_feature)?;

    if let Some((n, partition)) = inputs.partitions.filter(|(n, _)| *n > 1) {
        yaml::set(&mut doc, &["model", "parallel"], n as u64)?;
        yaml::set(&mut doc, &["model", "partitions"], partition.display().to_string())?;
    }
    if let Some(window) = inputs.evaluation {
        yaml::set(
            &mut doc,
            &["model", "eval_params", "evaluation_start"],
            window.start_string(),
        )?;
        yaml::set(
            &mut doc,
            &["model", "eval_params", "evaluation_stop"],
            window.end_string(),
        )?;
    }

    let path = config_dir.join(CALIB_CONFIG_FILE);
    yaml::save(&doc, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrofabric::fixture::{write, FixtureDivide};
    use crate::hydrofabric::GeoPackage;
    use std::fs;

    fn divide(id: &'static str, area: f64, gage: Option<&'static str>) -> FixtureDivide<'static> {
        FixtureDivide {
            id,
            corner: [-70.0, 44.0],
            side: 0.1,
            area_sqkm: area,
            gage,
        }
    }

    // -- evaluation feature --

    #[test]
    fn single_gage_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b.gpkg");
        write(
            &path,
            4326,
            &[divide("cat-1", 90.0, None), divide("cat-2", 5.0, Some("01047000"))],
        )
        .unwrap();
        let gpkg = GeoPackage::open(&path).unwrap();
        assert_eq!(eval_feature(&gpkg).unwrap(), "wb-2");
    }

    #[test]
    fn several_gages_fall_back_to_outlet() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b.gpkg");
        write(
            &path,
            4326,
            &[
                divide("cat-1", 90.0, Some("a")),
                divide("cat-2", 5.0, Some("b")),
                divide("cat-3", 40.0, None),
            ],
        )
        .unwrap();
        let gpkg = GeoPackage::open(&path).unwrap();
        assert_eq!(eval_feature(&gpkg).unwrap(), "wb-1");
    }

    // -- template --

    #[test]
    fn template_is_patched() {
        let tmp = tempfile::tempdir().unwrap();
        let template = tmp.path().join("input_calib.yaml");
        fs::write(
            &template,
            "general:\n  strategy:\n    type: estimation\n  iterations: 100\nmodel:\n  type: ngen\n  eval_params:\n    objective: kling_gupta\n",
        )
        .unwrap();
        let window =
            SimulationWindow::parse("2011-10-01 00:00:00", "2012-10-01 00:00:00").unwrap();
        let inputs = CalibrationInputs {
            template: &template,
            workdir: Path::new("/runs/b"),
            ngen: Path::new("/opt/ngen/cmake_build/ngen"),
            realization: Path::new("/runs/b/json/realization_nom_cfe.json"),
            gpkg: Path::new("/runs/b/data/gage_b.gpkg"),
            eval_feature: "wb-7",
            partitions: Some((4, Path::new("/runs/b/json/partition_4.json"))),
            evaluation: Some(window),
        };
        let path = write_config(&inputs, tmp.path()).unwrap();
        let doc = yaml::load(&path).unwrap();

        assert_eq!(doc["general"]["iterations"].as_i64(), Some(100));
        assert_eq!(doc["general"]["workdir"].as_str(), Some("/runs/b"));
        assert_eq!(
            doc["model"]["routing_output"].as_str(),
            Some("./flowveldepth_gage_b.csv")
        );
        assert_eq!(doc["model"]["eval_feature"].as_str(), Some("wb-7"));
        assert_eq!(doc["model"]["parallel"].as_u64(), Some(4));
        assert_eq!(
            doc["model"]["eval_params"]["evaluation_start"].as_str(),
            Some("2011-10-01 00:00:00")
        );
        assert_eq!(doc["model"]["eval_params"]["objective"].as_str(), Some("kling_gupta"));
        assert!(doc["model"]["binary"]
            .as_str()
            .unwrap()
            .ends_with("/opt/ngen/cmake_build/ngen"));
    }

    #[test]
    fn single_partition_is_not_parallel() {
        let tmp = tempfile::tempdir().unwrap();
        let template = tmp.path().join("input_calib.yaml");
        fs::write(&template, "model: {}\n").unwrap();
        let inputs = CalibrationInputs {
            template: &template,
            workdir: Path::new("/runs/b"),
            ngen: Path::new("/opt/ngen/cmake_build/ngen"),
            realization: Path::new("/runs/b/json/r.json"),
            gpkg: Path::new("/runs/b/data/b.gpkg"),
            eval_feature: "wb-1",
            partitions: Some((1, Path::new("/runs/b/json/partition_1.json"))),
            evaluation: None,
        };
        let doc = yaml::load(&write_config(&inputs, tmp.path()).unwrap()).unwrap();
        assert!(doc["model"].get("parallel").is_none());
        assert!(doc["model"].get("eval_params").is_none());
    }
}
