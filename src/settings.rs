/// Batch-wide settings resolved once from the workflow config.
///
/// Everything that does not depend on a particular basin is checked here,
/// so a missing library or template fails before any basin is touched.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use basinflow_core::attributes::AttributeDefaults;
use basinflow_core::coupling::Coupling;
use basinflow_core::library::LibraryIndex;
use basinflow_core::params::lasam::SOIL_PARAMS_FILE;
use basinflow_core::params::ParameterEngine;
use basinflow_core::scheme::{PartitioningScheme, RunoffScheme, SchemaType};
use basinflow_core::soil_class::SoilClassTable;
use basinflow_core::submodel::SubModel;
use basinflow_core::window::SimulationWindow;

use crate::config::{WorkflowConfig, DEFAULT_CALIB_TEMPLATE};
use crate::forcing::ForcingFormat;
use crate::lifecycle::Lifecycle;

/// NOM parameter tables under `ngen_dir`, copied into every basin.
const NOM_PARAMETERS: &str = "extern/noah-owp-modular/noah-owp-modular/parameters";
const SOIL_TABLE_FILE: &str = "SOILPARM.TBL";
/// LASAM van Genuchten parameters, by checkout name.
const LASAM_DATA_DIRS: [&str; 2] = ["extern/LGAR-C/data", "extern/LASAM/data"];

#[derive(Debug, Clone)]
pub struct ForcingSettings {
    /// Forcing directory with `{*}` for the basin id.
    pub dir_template: String,
    pub format: ForcingFormat,
    pub window: SimulationWindow,
    pub template: PathBuf,
    pub venv_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CalibrationSettings {
    pub template: PathBuf,
    /// Working directory override; the basin directory otherwise.
    pub state_dir: Option<PathBuf>,
    pub evaluation: Option<SimulationWindow>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub workflow_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ngen_dir: PathBuf,

    pub coupling: Coupling,
    pub partitioning: PartitioningScheme,
    pub runoff: RunoffScheme,
    pub window: SimulationWindow,
    pub schema_type: SchemaType,
    pub defaults: AttributeDefaults,
    pub lasam_calib_params: bool,

    pub libraries: LibraryIndex,
    pub soil_classes: Option<SoilClassTable>,
    pub nom_parameters: PathBuf,
    pub lasam_soil_params: Option<PathBuf>,

    pub routing_template: Option<PathBuf>,
    pub calibration: Option<CalibrationSettings>,
    pub forcing: ForcingSettings,
    pub lifecycle: Lifecycle,

    pub config_workers: usize,
    pub sim_processors: usize,
    pub adaptive_partitions: bool,
    pub stage_timeout: Option<Duration>,
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    ensure!(path.is_file(), "{what} {} does not exist", path.display());
    Ok(())
}

impl Settings {
    /// Resolve settings, loading the soil table and probing libraries.
    pub fn from_config(cfg: &WorkflowConfig, calib_template: Option<&Path>) -> Result<Self> {
        cfg.check_paths()?;
        let sim = &cfg.simulations;
        let coupling = sim.model_option;
        let ngen_dir = sim.ngen_dir.clone();

        let libraries = LibraryIndex::probe(&ngen_dir);
        for &model in coupling.modules() {
            libraries
                .require(model)
                .with_context(|| format!("model option {} needs {model}", coupling.name()))?;
        }

        let nom_parameters = ngen_dir.join(NOM_PARAMETERS);
        let needs_soil_classes = ParameterEngine::new(
            coupling,
            sim.precip_partitioning_scheme,
            sim.surface_runoff_scheme,
            sim.simulation_time,
            Path::new(""),
            Path::new(""),
        )
        .needs_soil_classes();
        let soil_classes = if needs_soil_classes {
            let path = nom_parameters.join(SOIL_TABLE_FILE);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading soil table {}", path.display()))?;
            let table = SoilClassTable::parse(&text)
                .with_context(|| format!("parsing soil table {}", path.display()))?;
            Some(table)
        } else {
            None
        };
        if coupling.has(SubModel::Nom) {
            ensure!(
                nom_parameters.is_dir(),
                "NOM parameter directory {} does not exist",
                nom_parameters.display()
            );
        }

        let lasam_soil_params = if coupling.has(SubModel::Lasam) {
            let found = LASAM_DATA_DIRS
                .iter()
                .map(|d| ngen_dir.join(d).join(SOIL_PARAMS_FILE))
                .find(|p| p.is_file());
            let path = found.with_context(|| {
                format!("{SOIL_PARAMS_FILE} not found under {}/extern", ngen_dir.display())
            })?;
            Some(path)
        } else {
            None
        };

        let routing_template = cfg.routing_template();
        if let Some(path) = &routing_template {
            require_file(path, "routing template")?;
        }

        let calibration = if sim.is_calibration {
            let template = calib_template
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cfg.workflow_dir.join(DEFAULT_CALIB_TEMPLATE));
            require_file(&template, "calibration template")?;
            Some(CalibrationSettings {
                template,
                state_dir: cfg.ngen_cal.state_dir.clone(),
                evaluation: cfg.ngen_cal.evaluation_window(),
            })
        } else {
            None
        };

        let forcing = ForcingSettings {
            dir_template: cfg.forcings.forcing_dir.clone(),
            format: cfg.forcings.forcing_format,
            window: cfg.forcing_window(),
            template: cfg.forcing_template(),
            venv_dir: expand_home(&cfg.forcings.forcing_venv_dir),
        };

        Ok(Self {
            workflow_dir: cfg.workflow_dir.clone(),
            input_dir: cfg.input_dir.clone(),
            output_dir: cfg.output_dir.clone(),
            ngen_dir,
            coupling,
            partitioning: sim.precip_partitioning_scheme,
            runoff: sim.surface_runoff_scheme,
            window: sim.simulation_time,
            schema_type: sim.schema_type,
            defaults: sim.attribute_defaults.clone(),
            lasam_calib_params: sim.lasam_calib_params,
            libraries,
            soil_classes,
            nom_parameters,
            lasam_soil_params,
            routing_template,
            calibration,
            forcing,
            lifecycle: Lifecycle {
                clean: sim.clean.clone(),
                rename_existing: sim.rename_existing_simulation.clone(),
                setup_simulation: sim.setup_simulation,
            },
            config_workers: sim.num_processors_config,
            sim_processors: sim.num_processors_sim,
            adaptive_partitions: sim.num_processors_adaptive,
            stage_timeout: cfg.stage_timeout(),
        })
    }

    pub fn ngen_binary(&self) -> PathBuf {
        self.ngen_dir.join("cmake_build").join("ngen")
    }

    pub fn partition_generator(&self) -> PathBuf {
        self.ngen_dir.join("cmake_build").join("partitionGenerator")
    }

    /// Multi-rank runs cannot proceed without the partition generator.
    pub fn check_partition_generator(&self) -> Result<()> {
        if self.sim_processors > 1 {
            require_file(&self.partition_generator(), "partitionGenerator")?;
        }
        Ok(())
    }

    pub fn is_routing(&self) -> bool {
        self.routing_template.is_some()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(crate::manifest::MANIFEST_FILE)
    }
}

/// `~/x` to `$HOME/x`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SOIL_TABLE: &str = "\
Soil Parameters
STAS
19,1   'BB DRYSMC F11 MAXSMC REFSMC SATPSI SATDK SATDW WLTSMC QTZ BVIC AXAJ BXAJ XXAJ BDVIC BBVIC GDVIC ISLTYP'
1, 2.79, 0.010, -0.472, 0.339, 0.192, 0.069, 4.66E-5, 0.608E-6, 0.010, 0.92, 0.050, 0.009, 0.050, 0.050, 0.050, 0.000, 0.000, 'SAND'
";

    /// Workflow tree with an ngen checkout holding every sub-model library.
    pub(crate) fn workflow_tree(root: &Path, model_option: &str, extra: &str) -> WorkflowConfig {
        let ngen = root.join("ngen");
        for model in SubModel::ALL {
            let name = model.extern_names()[0];
            let build = if model.flat_build() {
                ngen.join("extern").join(name).join("cmake_build")
            } else {
                ngen.join("extern").join(name).join(name).join("cmake_build")
            };
            fs::create_dir_all(&build).unwrap();
            let lib = format!("lib{name}.{}", basinflow_core::library::SHARED_LIB_EXT);
            fs::write(build.join(lib), b"").unwrap();
        }
        let params = ngen.join(NOM_PARAMETERS);
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join(SOIL_TABLE_FILE), SOIL_TABLE).unwrap();
        fs::write(params.join("MPTABLE.TBL"), b"mp").unwrap();
        let lasam = ngen.join(LASAM_DATA_DIRS[1]);
        fs::create_dir_all(&lasam).unwrap();
        fs::write(lasam.join(SOIL_PARAMS_FILE), b"vg").unwrap();
        fs::create_dir_all(root.join("input")).unwrap();

        let yaml = format!(
            r#"
workflow_dir: {root}
input_dir: {root}/input
output_dir: {root}/output
simulations:
  ngen_dir: {ngen}
  simulation_time: {{start_time: "2010-10-01 00:00:00", end_time: "2010-10-03 00:00:00"}}
  model_option: {model_option}
{extra}
forcings:
  forcing_dir: "{root}/input/{{*}}/data/forcing"
"#,
            root = root.display(),
            ngen = ngen.display(),
        );
        WorkflowConfig::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn resolves_libraries_and_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NLSS", "");
        let settings = Settings::from_config(&cfg, None).unwrap();
        assert!(settings.soil_classes.is_some());
        assert!(settings
            .lasam_soil_params
            .as_ref()
            .unwrap()
            .ends_with("LASAM/data/vG_default_params.dat"));
        assert!(settings.calibration.is_none());
        assert_eq!(settings.ngen_binary(), tmp.path().join("ngen/cmake_build/ngen"));
    }

    #[test]
    fn soil_table_only_when_needed() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NC", "");
        let settings = Settings::from_config(&cfg, None).unwrap();
        assert!(settings.soil_classes.is_none());
        assert!(settings.lasam_soil_params.is_none());
    }

    #[test]
    fn missing_templates_are_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NC", "  is_routing: true");
        let err = Settings::from_config(&cfg, None).unwrap_err();
        assert!(err.to_string().contains("routing template"), "{err:#}");

        let cfg = workflow_tree(tmp.path(), "NC", "  is_calibration: true");
        let err = Settings::from_config(&cfg, None).unwrap_err();
        assert!(err.to_string().contains("calibration template"), "{err:#}");
    }

    #[test]
    fn missing_library_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NT", "");
        fs::remove_dir_all(tmp.path().join("ngen/extern/topmodel")).unwrap();
        let err = Settings::from_config(&cfg, None).unwrap_err();
        assert!(format!("{err:#}").contains("nom_topmodel"), "{err:#}");
    }

    #[test]
    fn multi_rank_needs_partition_generator() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = workflow_tree(tmp.path(), "NC", "  num_processors_sim: 4");
        let settings = Settings::from_config(&cfg, None).unwrap();
        assert!(settings.check_partition_generator().is_err());
        let build = tmp.path().join("ngen/cmake_build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("partitionGenerator"), b"").unwrap();
        assert!(settings.check_partition_generator().is_ok());
    }
}
