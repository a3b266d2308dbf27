/// Per-basin stage sequencing.
///
/// A [`BasinContext`] carries the basin's absolute paths and what earlier
/// stages produced; [`basin_pipeline`] chains the stages selected on the
/// command line. External tools always run with the basin (or calibration
/// working) directory as their explicit `current_dir`.
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use basinflow_core::partition::partition_count;
use basinflow_core::realization::ForcingDescriptor;

use crate::calib::{self, CalibrationInputs, CALIB_CONFIG_FILE};
use crate::discovery::BasinWorkUnit;
use crate::forcing;
use crate::generate::{self, config_dir};
use crate::hydrofabric::{GeoPackage, Hydrofabric};
use crate::pipeline::{run_command, CommandSpec, Pipeline, StageError};
use crate::settings::Settings;

/// Forcing generator script, relative to `workflow_dir`.
pub const FORCING_SCRIPT: &str = "extern/CIROH_DL_NextGen/forcing_prep/generate.py";
/// Geopackage generator and its parameters, relative to `workflow_dir`.
pub const GPKG_SCRIPT: &str = "giuh_twi/main.R";
pub const GPKG_PARAMS: &str = "configs/input_gpkg_params.yaml";

/// Stages selected for this invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stages {
    pub gpkg: bool,
    pub forcing: bool,
    pub configs: bool,
    pub run: bool,
}

impl Stages {
    pub fn any(&self) -> bool {
        self.gpkg || self.forcing || self.configs || self.run
    }
}

pub struct BasinContext<'s> {
    pub settings: &'s Settings,
    pub unit: BasinWorkUnit,
    /// Known from the manifest, or set by the configs stage.
    pub n_cats: Option<usize>,
    pub forcing: Option<ForcingDescriptor>,
    pub realization: PathBuf,
    pub partitions: usize,
    pub partition_file: Option<PathBuf>,
}

impl<'s> BasinContext<'s> {
    pub fn new(settings: &'s Settings, unit: BasinWorkUnit, n_cats: Option<usize>) -> Self {
        let realization = generate::realization_path(settings, &unit);
        Self {
            settings,
            unit,
            n_cats,
            forcing: None,
            realization,
            partitions: 1,
            partition_file: None,
        }
    }

    fn run(&self, stage: &'static str, spec: &CommandSpec) -> Result<()> {
        run_command(stage, spec, self.settings.stage_timeout)?;
        Ok(())
    }

    /// Catchment count from the manifest or, failing that, the geopackage.
    fn n_cats(&mut self) -> Result<usize> {
        if let Some(n) = self.n_cats {
            return Ok(n);
        }
        let n = GeoPackage::open(&self.unit.gpkg())?.divides()?.len();
        self.n_cats = Some(n);
        Ok(n)
    }

    fn calib_workdir(&self) -> PathBuf {
        self.settings
            .calibration
            .as_ref()
            .and_then(|c| c.state_dir.clone())
            .unwrap_or_else(|| self.unit.basin_dir.clone())
    }
}

/// Partitions for a basin of `n_cats` catchments.
///
/// Adaptive sizing follows [`partition_count`]; otherwise every rank gets
/// work, bounded by the catchment count.
pub fn partitions_for(settings: &Settings, n_cats: usize) -> usize {
    if settings.adaptive_partitions {
        partition_count(n_cats, settings.sim_processors)
    } else {
        settings.sim_processors.min(n_cats).max(1)
    }
}

// -- Commands --

/// First match of `program` on `PATH`.
fn which(program: &str) -> Option<PathBuf> {
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|p| p.is_file())
    })
}

pub fn partition_command(settings: &Settings, gpkg: &Path, file: &Path, n: usize) -> CommandSpec {
    CommandSpec::new(settings.partition_generator())
        .arg(gpkg.display())
        .arg(gpkg.display())
        .arg(file.display())
        .arg(n)
        .args(["", ""])
}

pub fn simulate_command(
    settings: &Settings,
    gpkg: &Path,
    realization: &Path,
    partition: Option<(usize, &Path)>,
) -> CommandSpec {
    let ngen = settings.ngen_binary();
    let model_args = [
        gpkg.display().to_string(),
        "all".to_string(),
        gpkg.display().to_string(),
        "all".to_string(),
        realization.display().to_string(),
    ];
    let mut spec = match partition {
        Some((n, file)) if n > 1 => CommandSpec::new("mpirun")
            .arg("-np")
            .arg(n)
            .arg(ngen.display())
            .args(model_args)
            .arg(file.display()),
        _ => CommandSpec::new(ngen).args(model_args),
    };
    if cfg!(target_os = "macos") {
        if let Some(python) = which("python") {
            spec = spec.env("PYTHONEXECUTABLE", python.display().to_string());
        }
    }
    spec
}

pub fn calibrate_command(config: &Path, workdir: &Path) -> CommandSpec {
    CommandSpec::new("python")
        .args(["-m", "ngen.cal"])
        .arg(config.display())
        .current_dir(workdir)
}

/// Forcing generator with the forcing venv first on `PATH`.
pub fn forcing_command(settings: &Settings, config: &Path) -> Result<CommandSpec> {
    let venv_bin = settings.forcing.venv_dir.join("bin");
    ensure!(
        venv_bin.is_dir(),
        "forcing venv {} does not exist",
        settings.forcing.venv_dir.display()
    );
    let mut paths = vec![venv_bin];
    if let Some(existing) = env::var_os("PATH") {
        paths.extend(env::split_paths(&existing));
    }
    let path: OsString = env::join_paths(paths).context("building PATH for the forcing venv")?;
    Ok(CommandSpec::new("python")
        .arg(settings.workflow_dir.join(FORCING_SCRIPT).display())
        .arg(config.display())
        .env("PATH", path.to_string_lossy()))
}

/// Geopackage generation for the whole batch.
pub fn gpkg_command(settings: &Settings) -> CommandSpec {
    CommandSpec::new("Rscript")
        .arg(settings.workflow_dir.join(GPKG_SCRIPT).display())
        .arg(settings.workflow_dir.join(GPKG_PARAMS).display())
        .current_dir(&settings.workflow_dir)
}

// -- Stages --

fn stage_forcing(ctx: &mut BasinContext<'_>) -> Result<()> {
    let settings = ctx.settings;
    let config = forcing::write_forcing_config(
        &settings.forcing.template,
        &ctx.unit.source_gpkg,
        &settings.forcing.window,
        settings.forcing.format,
        &ctx.unit.forcing_dir,
    )?;
    let spec = forcing_command(settings, &config)?.current_dir(&ctx.unit.forcing_dir);
    ctx.run("forcing", &spec)
}

fn stage_lifecycle(ctx: &mut BasinContext<'_>) -> Result<()> {
    ctx.settings.lifecycle.apply(&ctx.unit.basin_dir)
}

fn stage_configs(ctx: &mut BasinContext<'_>) -> Result<()> {
    let report = generate::generate_configs(ctx.settings, &ctx.unit)?;
    ctx.n_cats = Some(report.n_cats);
    ctx.forcing = Some(report.forcing);
    Ok(())
}

fn stage_realization(ctx: &mut BasinContext<'_>) -> Result<()> {
    let Some(forcing) = &ctx.forcing else {
        bail!("no forcing resolved for {}", ctx.unit.id);
    };
    ctx.realization = generate::write_realization(ctx.settings, &ctx.unit, forcing)?;
    Ok(())
}

fn stage_partition(ctx: &mut BasinContext<'_>) -> Result<()> {
    let n_cats = ctx.n_cats()?;
    let n = partitions_for(ctx.settings, n_cats);
    ctx.partitions = n;
    if n <= 1 {
        log::debug!("{}: {n_cats} catchments, single partition", ctx.unit.id);
        return Ok(());
    }
    let file = ctx
        .unit
        .basin_dir
        .join("json")
        .join(format!("partition_{n}.json"));
    let spec = partition_command(ctx.settings, &ctx.unit.gpkg(), &file, n)
        .current_dir(&ctx.unit.basin_dir);
    ctx.run("partition", &spec)?;
    ctx.partition_file = Some(file);
    Ok(())
}

fn stage_simulate(ctx: &mut BasinContext<'_>) -> Result<()> {
    ensure!(
        ctx.realization.is_file(),
        "realization {} does not exist",
        ctx.realization.display()
    );
    let partition = ctx.partition_file.as_deref().map(|f| (ctx.partitions, f));
    let spec = simulate_command(ctx.settings, &ctx.unit.gpkg(), &ctx.realization, partition)
        .current_dir(&ctx.unit.basin_dir);
    ctx.run("simulate", &spec)
}

fn stage_calibration_config(ctx: &mut BasinContext<'_>) -> Result<()> {
    let Some(calibration) = &ctx.settings.calibration else {
        bail!("calibration is not enabled");
    };
    let gpkg = ctx.unit.gpkg();
    let eval_feature = calib::eval_feature(&GeoPackage::open(&gpkg)?)?;
    let workdir = ctx.calib_workdir();
    let ngen = ctx.settings.ngen_binary();
    let inputs = CalibrationInputs {
        template: &calibration.template,
        workdir: &workdir,
        ngen: &ngen,
        realization: &ctx.realization,
        gpkg: &gpkg,
        eval_feature: &eval_feature,
        partitions: ctx.partition_file.as_deref().map(|f| (ctx.partitions, f)),
        evaluation: calibration.evaluation,
    };
    calib::write_config(&inputs, &config_dir(&ctx.unit))?;
    Ok(())
}

fn stage_calibrate(ctx: &mut BasinContext<'_>) -> Result<()> {
    let config = config_dir(&ctx.unit).join(CALIB_CONFIG_FILE);
    let spec = calibrate_command(&config, &ctx.calib_workdir());
    ctx.run("calibrate", &spec)
}

/// Stages of one basin for `stages`, in execution order.
pub fn basin_pipeline<'s>(
    settings: &Settings,
    label: &str,
    stages: Stages,
) -> Pipeline<'static, BasinContext<'s>> {
    let mut pipeline = Pipeline::new(label);
    if stages.forcing {
        pipeline = pipeline.then("forcing", stage_forcing);
    }
    if stages.configs {
        pipeline = pipeline
            .then("lifecycle", stage_lifecycle)
            .then("configs", stage_configs)
            .then("realization", stage_realization);
    }
    if stages.run {
        pipeline = pipeline.then("partition", stage_partition);
        if settings.calibration.is_some() {
            pipeline = pipeline
                .then("calibration-config", stage_calibration_config)
                .then("calibrate", stage_calibrate);
        } else {
            pipeline = pipeline.then("simulate", stage_simulate);
        }
    }
    pipeline
}

/// Run the selected stages for one basin; returns its catchment count when
/// a stage established it.
pub fn run_basin(
    settings: &Settings,
    unit: &BasinWorkUnit,
    stages: Stages,
    n_cats: Option<usize>,
) -> Result<Option<usize>, StageError> {
    let mut ctx = BasinContext::new(settings, unit.clone(), n_cats);
    basin_pipeline(settings, &unit.id, stages).run(&mut ctx)?;
    Ok(ctx.n_cats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;
    use crate::hydrofabric::fixture::{write, FixtureDivide};
    use crate::settings::tests::workflow_tree;
    use std::fs;

    fn settings(root: &Path, extra: &str) -> Settings {
        let cfg = workflow_tree(root, "NC", extra);
        Settings::from_config(&cfg, None).unwrap()
    }

    fn basin(root: &Path, s: &Settings) -> BasinWorkUnit {
        let data = root.join("input/b1/data");
        fs::create_dir_all(data.join("forcing")).unwrap();
        let divide = |id| FixtureDivide {
            id,
            corner: [-70.0, 44.0],
            side: 0.1,
            area_sqkm: 1.0,
            gage: None,
        };
        write(&data.join("b1.gpkg"), 4326, &[divide("cat-1"), divide("cat-2")]).unwrap();
        for id in ["cat-1", "cat-2"] {
            fs::write(data.join(format!("forcing/{id}.csv")), "time,T2D\n").unwrap();
        }
        discover(&s.input_dir, &s.output_dir, &s.forcing.dir_template)
            .unwrap()
            .remove(0)
    }

    // -- partitions --

    #[test]
    fn partition_sizing_modes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = settings(tmp.path(), "  num_processors_sim: 10");
        assert_eq!(partitions_for(&s, 3), 1);
        assert_eq!(partitions_for(&s, 100), 10);
        assert_eq!(partitions_for(&s, 500), 20);

        s.adaptive_partitions = false;
        assert_eq!(partitions_for(&s, 3), 3);
        assert_eq!(partitions_for(&s, 500), 10);
        assert_eq!(partitions_for(&s, 0), 1);
    }

    // -- commands --

    #[test]
    fn serial_and_mpi_simulation() {
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(tmp.path(), "");
        let gpkg = Path::new("/runs/b1/data/b1.gpkg");
        let real = Path::new("/runs/b1/json/realization_nom_cfe.json");

        let serial = simulate_command(&s, gpkg, real, None);
        assert_eq!(serial.program, s.ngen_binary());
        assert_eq!(
            serial.args,
            [
                "/runs/b1/data/b1.gpkg",
                "all",
                "/runs/b1/data/b1.gpkg",
                "all",
                "/runs/b1/json/realization_nom_cfe.json"
            ]
        );

        let part = Path::new("/runs/b1/json/partition_4.json");
        let mpi = simulate_command(&s, gpkg, real, Some((4, part)));
        assert_eq!(mpi.program, Path::new("mpirun"));
        assert_eq!(mpi.args[..2], ["-np", "4"]);
        assert_eq!(mpi.args.last().map(String::as_str), Some("/runs/b1/json/partition_4.json"));

        let single = simulate_command(&s, gpkg, real, Some((1, part)));
        assert_eq!(single.program, s.ngen_binary());
    }

    #[test]
    fn partition_command_has_empty_trailing_args() {
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(tmp.path(), "");
        let file = Path::new("json/partition_3.json");
        let spec = partition_command(&s, Path::new("b.gpkg"), file, 3);
        assert_eq!(spec.args, ["b.gpkg", "b.gpkg", "json/partition_3.json", "3", "", ""]);
    }

    #[test]
    fn forcing_needs_venv() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = settings(tmp.path(), "");
        s.forcing.venv_dir = tmp.path().join("venv");
        let config = tmp.path().join("forcing_config.yaml");
        assert!(forcing_command(&s, &config).is_err());

        fs::create_dir_all(tmp.path().join("venv/bin")).unwrap();
        let spec = forcing_command(&s, &config).unwrap();
        let path = &spec.env["PATH"];
        assert!(path.starts_with(&tmp.path().join("venv/bin").display().to_string()));
        assert!(spec.args[0].ends_with(FORCING_SCRIPT));
    }

    // -- pipelines --

    #[test]
    fn pipeline_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(tmp.path(), "");
        let all = Stages {
            gpkg: false,
            forcing: true,
            configs: true,
            run: true,
        };
        assert_eq!(basin_pipeline(&s, "b", all).len(), 6);
        let run = Stages { run: true, ..Stages::default() };
        assert_eq!(basin_pipeline(&s, "b", run).len(), 2);
        assert!(basin_pipeline(&s, "b", Stages::default()).is_empty());
    }

    #[test]
    fn calibration_run_swaps_simulate() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("configs")).unwrap();
        fs::write(tmp.path().join("configs/input_calib.yaml"), "model: {}\n").unwrap();
        let s = settings(tmp.path(), "  is_calibration: true");
        let run = Stages { run: true, ..Stages::default() };
        assert_eq!(basin_pipeline(&s, "b", run).len(), 3);
    }

    #[test]
    fn configs_stage_records_catchments() {
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(tmp.path(), "");
        let unit = basin(tmp.path(), &s);
        let stages = Stages { configs: true, ..Stages::default() };
        let n = run_basin(&s, &unit, stages, None).unwrap();
        assert_eq!(n, Some(2));
        assert!(generate::realization_path(&s, &unit).is_file());
        assert!(unit.basin_dir.join("outputs/troute_parq").is_dir());
    }

    #[test]
    fn simulate_fails_without_realization() {
        let tmp = tempfile::tempdir().unwrap();
        let s = settings(tmp.path(), "");
        let unit = basin(tmp.path(), &s);
        let stages = Stages { run: true, ..Stages::default() };
        let err = run_basin(&s, &unit, stages, Some(2)).unwrap_err();
        assert_eq!(err.stage(), "simulate");
    }
}
