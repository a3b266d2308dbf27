/// Top-level workflow: settings, discovery and the two basin batches.
///
/// Forcing and configuration generation run as one batch on
/// `num_processors_config` workers and write the manifest. Simulation and
/// calibration run afterwards, one basin at a time, over the basins the
/// manifest lists.
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::batch::{run_batch, BatchResult};
use crate::config::WorkflowConfig;
use crate::discovery::{discover, BasinWorkUnit};
use crate::driver::{gpkg_command, run_basin, Stages};
use crate::lifecycle::{confirm_policy, AssumeYes, Confirm, StdinConfirm};
use crate::manifest::read_manifest;
use crate::pipeline::run_command;
use crate::settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Calibration template overriding `configs/input_calib.yaml`.
    pub calib_config: Option<PathBuf>,
    /// Skip the `clean=all` confirmation.
    pub assume_yes: bool,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub prepare: Option<BatchResult>,
    pub run: Option<BatchResult>,
}

impl Summary {
    pub fn failed(&self) -> usize {
        [&self.prepare, &self.run]
            .into_iter()
            .flatten()
            .map(BatchResult::failed)
            .sum()
    }
}

/// Basins to simulate with their catchment counts.
///
/// Without a manifest every discovered basin runs and the partition stage
/// counts catchments itself.
fn run_units(
    settings: &Settings,
    units: Vec<BasinWorkUnit>,
) -> Result<Vec<(BasinWorkUnit, Option<usize>)>> {
    let path = settings.manifest_path();
    if !path.is_file() {
        log::warn!("{} not found, running every basin", path.display());
        return Ok(units.into_iter().map(|u| (u, None)).collect());
    }
    let passed: BTreeMap<String, usize> = read_manifest(&path)?
        .into_iter()
        .map(|row| (row.basin_id, row.n_cats))
        .collect();
    Ok(units
        .into_iter()
        .filter_map(|u| passed.get(&u.id).map(|&n| (u, Some(n))))
        .collect())
}

pub fn run(cfg: &WorkflowConfig, stages: Stages, opts: &RunOptions) -> Result<Summary> {
    let settings = Settings::from_config(cfg, opts.calib_config.as_deref())?;
    if stages.run {
        settings.check_partition_generator()?;
    }
    if stages.configs {
        let confirm: &dyn Confirm = if opts.assume_yes { &AssumeYes } else { &StdinConfirm };
        confirm_policy(&settings.lifecycle.clean, confirm)?;
    }
    log::info!(
        "{} ({}), routing {}, calibration {}",
        settings.coupling,
        settings.coupling.code(),
        settings.is_routing(),
        settings.calibration.is_some()
    );

    if stages.gpkg {
        log::info!("generating geopackages");
        run_command("gpkg", &gpkg_command(&settings), settings.stage_timeout)?;
    }

    let mut summary = Summary::default();
    if !(stages.forcing || stages.configs || stages.run) {
        return Ok(summary);
    }
    let units = discover(
        &settings.input_dir,
        &settings.output_dir,
        &settings.forcing.dir_template,
    )?;
    if units.is_empty() {
        bail!(
            "no basins under {} (expected <basin>/data/<name>.gpkg)",
            settings.input_dir.display()
        );
    }
    log::info!("{} basins found", units.len());

    if stages.forcing || stages.configs {
        let prepare = Stages {
            forcing: stages.forcing,
            configs: stages.configs,
            ..Stages::default()
        };
        let manifest = stages.configs.then(|| settings.manifest_path());
        if let Some(dir) = manifest.as_ref().and_then(|p| p.parent()) {
            std::fs::create_dir_all(dir)?;
        }
        let result = run_batch(&units, settings.config_workers, manifest.as_deref(), |unit| {
            run_basin(&settings, unit, prepare, None)
        })?;
        result.log_summary("prepare");
        summary.prepare = Some(result);
    }

    if stages.run {
        let runs = run_units(&settings, units)?;
        let n_cats: BTreeMap<String, Option<usize>> =
            runs.iter().map(|(u, n)| (u.id.clone(), *n)).collect();
        let units: Vec<BasinWorkUnit> = runs.into_iter().map(|(u, _)| u).collect();
        let run = Stages {
            run: true,
            ..Stages::default()
        };
        let result = run_batch(&units, 1, None, |unit| {
            let known = n_cats.get(&unit.id).copied().flatten();
            run_basin(&settings, unit, run, known)
        })?;
        result.log_summary("run");
        summary.run = Some(result);
    }
    Ok(summary)
}
