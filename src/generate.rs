/// Per-basin configuration and realization generation.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use basinflow_core::attributes::CatchmentTable;
use basinflow_core::params::lasam::SOIL_PARAMS_FILE;
use basinflow_core::params::nom::PARAMETERS_DIR;
use basinflow_core::params::ParameterEngine;
use basinflow_core::realization::{self, assemble, ForcingDescriptor, RealizationRequest};
use basinflow_core::schema::resolve_flowpath_attributes;
use basinflow_core::submodel::SubModel;

use crate::discovery::BasinWorkUnit;
use crate::forcing::{self, ForcingFormat};
use crate::hydrofabric::{GeoPackage, Hydrofabric};
use crate::settings::Settings;
use crate::troute::{self, RoutingInputs};

/// What configuration generation produced for one basin.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub n_cats: usize,
    pub forcing: ForcingDescriptor,
    pub files_written: usize,
    pub remapped_soil_b: usize,
    pub clamped_elevation: usize,
}

pub fn config_dir(unit: &BasinWorkUnit) -> PathBuf {
    unit.basin_dir.join("configs")
}

pub fn realization_path(settings: &Settings, unit: &BasinWorkUnit) -> PathBuf {
    unit.basin_dir
        .join("json")
        .join(realization::file_name(settings.coupling))
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("listing {}", src.display()))? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Put the source geopackage in the basin's own `data` directory.
pub fn stage_geopackage(unit: &BasinWorkUnit) -> Result<PathBuf> {
    let dst = unit.gpkg();
    if dst != unit.source_gpkg && !dst.exists() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::copy(&unit.source_gpkg, &dst).with_context(|| {
            format!("copying {} to {}", unit.source_gpkg.display(), dst.display())
        })?;
    }
    Ok(dst)
}

/// Write every sub-model file, the shared parameter tables and, with
/// routing, the t-route config for one basin.
pub fn generate_configs(settings: &Settings, unit: &BasinWorkUnit) -> Result<GenerationReport> {
    let forcing = forcing::resolve(&unit.forcing_dir, settings.forcing.format)?;
    let gpkg_path = stage_geopackage(unit)?;
    let gpkg = GeoPackage::open(&gpkg_path)?;

    let divides = gpkg.divides()?;
    let attributes = gpkg.model_attributes()?;
    let table = CatchmentTable::build(
        &divides,
        &attributes,
        settings.schema_type,
        &settings.defaults,
    );
    if table.remapped_soil_b > 0 {
        log::debug!(
            "{}: {} catchments had non-positive soil_b",
            unit.id,
            table.remapped_soil_b
        );
    }
    if table.clamped_elevation > 0 {
        log::debug!(
            "{}: {} catchments had non-positive elevation",
            unit.id,
            table.clamped_elevation
        );
    }

    let soil_temperatures = if settings.coupling.has(SubModel::Sft)
        && settings.forcing.format == ForcingFormat::Csv
    {
        forcing::soil_temperatures(&unit.forcing_dir, table.ids())
    } else {
        Default::default()
    };

    let configs = config_dir(unit);
    let mut engine = ParameterEngine::new(
        settings.coupling,
        settings.partitioning,
        settings.runoff,
        settings.window,
        &configs,
        &unit.forcing_dir,
    )
    .with_soil_temperatures(&soil_temperatures)
    .with_lasam_calib_params(settings.lasam_calib_params);
    if let Some(soil) = &settings.soil_classes {
        engine = engine.with_soil_classes(soil);
    }

    for model in settings.coupling.configured_models() {
        if let Some(dir) = engine.model_dir(model) {
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    if settings.coupling.has(SubModel::Nom) {
        copy_dir(&settings.nom_parameters, &configs.join("nom").join(PARAMETERS_DIR))?;
    }
    if let Some(vg) = &settings.lasam_soil_params {
        let dst = configs.join("lasam").join(SOIL_PARAMS_FILE);
        fs::copy(vg, &dst).with_context(|| format!("copying {}", vg.display()))?;
    }

    let mut files_written = 0;
    for catchment in table.iter() {
        let files = engine
            .derive(catchment)
            .with_context(|| format!("deriving parameters for {}", catchment.id))?;
        for file in files {
            let path = configs.join(&file.path);
            fs::write(&path, file.content).with_context(|| format!("writing {}", path.display()))?;
            files_written += 1;
        }
    }

    if let Some(template) = &settings.routing_template {
        let flowpaths = gpkg.flowpath_attributes()?;
        let columns = resolve_flowpath_attributes(&flowpaths.columns, false);
        let missing = columns.missing();
        if !missing.is_empty() {
            log::warn!("{}: routing columns not found: {}", unit.id, missing.join(", "));
        }
        troute::write_config(
            &RoutingInputs {
                template,
                gpkg: &gpkg_path,
                columns: &columns,
                window: &settings.window,
                output_dir: &unit.basin_dir.join("outputs"),
                calibration: settings.calibration.is_some(),
            },
            &configs,
        )?;
        files_written += 1;
    }

    log::info!("{}: {} catchments, {files_written} files", unit.id, table.len());
    Ok(GenerationReport {
        n_cats: table.len(),
        forcing,
        files_written,
        remapped_soil_b: table.remapped_soil_b,
        clamped_elevation: table.clamped_elevation,
    })
}

/// Assemble the realization and write `json/realization_<coupling>.json`.
pub fn write_realization(
    settings: &Settings,
    unit: &BasinWorkUnit,
    forcing: &ForcingDescriptor,
) -> Result<PathBuf> {
    let request = RealizationRequest {
        coupling: settings.coupling,
        runoff: settings.runoff,
        partitioning: settings.partitioning,
        window: settings.window,
        config_dir: config_dir(unit),
        forcing: forcing.clone(),
        routing: settings.is_routing(),
        calibration: settings.calibration.is_some(),
        output_dir: unit.basin_dir.join("outputs"),
    };
    let realization = assemble(&request, &settings.libraries)?;
    let path = realization_path(settings, unit);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&path, realization.to_json()?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;
    use crate::hydrofabric::fixture::{write, FixtureDivide};
    use crate::settings::tests::workflow_tree;
    use basinflow_core::realization::Realization;

    fn basin_with_forcing(root: &Path) {
        let data = root.join("input/01047000/data");
        fs::create_dir_all(data.join("forcing")).unwrap();
        let divides = [
            FixtureDivide {
                id: "cat-1",
                corner: [-70.0, 44.0],
                side: 0.1,
                area_sqkm: 12.0,
                gage: Some("01047000"),
            },
            FixtureDivide {
                id: "cat-2",
                corner: [-70.1, 44.0],
                side: 0.1,
                area_sqkm: 3.0,
                gage: None,
            },
        ];
        write(&data.join("gage_01047000.gpkg"), 4326, &divides).unwrap();
        for id in ["cat-1", "cat-2"] {
            fs::write(
                data.join("forcing").join(format!("{id}.csv")),
                "time,T2D\n2010-10-01 00:00:00,280.0\n",
            )
            .unwrap();
        }
    }

    #[test]
    fn nom_cfe_basin_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NC", "");
        basin_with_forcing(tmp.path());
        let settings = Settings::from_config(&cfg, None).unwrap();
        let units = discover(
            &settings.input_dir,
            &settings.output_dir,
            &settings.forcing.dir_template,
        )
        .unwrap();
        let unit = &units[0];

        let report = generate_configs(&settings, unit).unwrap();
        assert_eq!(report.n_cats, 2);
        assert_eq!(report.files_written, 4);
        assert!(unit.gpkg().is_file());
        let configs = config_dir(unit);
        assert!(configs.join("cfe/cfe_config_cat-1.txt").is_file());
        assert!(configs.join("nom/nom_config_cat-2.input").is_file());
        assert!(configs.join("nom/parameters/SOILPARM.TBL").is_file());

        let path = write_realization(&settings, unit, &report.forcing).unwrap();
        assert!(path.ends_with("json/realization_nom_cfe.json"));
        let realization = Realization::from_json(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(realization.module_names().len(), 3);
    }

    #[test]
    fn missing_forcing_fails_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NC", "");
        basin_with_forcing(tmp.path());
        fs::remove_dir_all(tmp.path().join("input/01047000/data/forcing")).unwrap();
        let settings = Settings::from_config(&cfg, None).unwrap();
        let units = discover(
            &settings.input_dir,
            &settings.output_dir,
            &settings.forcing.dir_template,
        )
        .unwrap();
        let err = generate_configs(&settings, &units[0]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!config_dir(&units[0]).join("cfe").exists());
    }
}
