/// Workflow configuration (`workflow.yaml`).
///
/// Loaded once per invocation. Coupling tokens, scheme names and time
/// windows are parsed while deserializing, so an invalid file fails before
/// any basin is touched.
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use basinflow_core::attributes::AttributeDefaults;
use basinflow_core::coupling::Coupling;
use basinflow_core::scheme::{PartitioningScheme, RunoffScheme, SchemaType};
use basinflow_core::window::SimulationWindow;
use log::LevelFilter;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::forcing::ForcingFormat;
use crate::lifecycle::CleanPolicy;

// -- Defaults relative to workflow_dir --

/// t-route template used when `simulations.routing_template` is unset.
pub const DEFAULT_ROUTING_TEMPLATE: &str = "configs/basefiles/config_troute.yaml";

/// Calibration template used when `--calib-config` is not given.
pub const DEFAULT_CALIB_TEMPLATE: &str = "configs/input_calib.yaml";

/// Forcing downloader template used when `forcings.forcing_template` is unset.
pub const DEFAULT_FORCING_TEMPLATE: &str = "configs/config_aorc.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    pub workflow_dir: PathBuf,
    /// Holds one `<basin>/data/<name>.gpkg` per basin.
    pub input_dir: PathBuf,
    /// Basin directories and the `basins_passed.csv` manifest go here.
    pub output_dir: PathBuf,
    pub simulations: SimulationsConfig,
    #[serde(default)]
    pub forcings: ForcingsConfig,
    #[serde(default)]
    pub ngen_cal: NgenCalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationsConfig {
    pub ngen_dir: PathBuf,
    #[serde(deserialize_with = "window_map_or_json")]
    pub simulation_time: SimulationWindow,
    #[serde(deserialize_with = "parse_token")]
    pub model_option: Coupling,
    #[serde(default)]
    pub precip_partitioning_scheme: PartitioningScheme,
    #[serde(default)]
    pub surface_runoff_scheme: RunoffScheme,
    #[serde(default)]
    pub clean: CleanPolicy,
    #[serde(default = "yes")]
    pub setup_simulation: bool,
    /// Move the previous `configs`, `json` and `outputs` into this directory.
    #[serde(default)]
    pub rename_existing_simulation: Option<String>,
    #[serde(default)]
    pub is_routing: bool,
    #[serde(default)]
    pub is_calibration: bool,
    /// Worker threads for per-basin config generation.
    #[serde(default = "one")]
    pub num_processors_config: usize,
    /// MPI ranks per simulation.
    #[serde(default = "one")]
    pub num_processors_sim: usize,
    #[serde(default = "yes")]
    pub num_processors_adaptive: bool,
    #[serde(default)]
    pub schema_type: SchemaType,
    /// 0 info, 1 debug, 2 and above trace.
    #[serde(default)]
    pub verbosity: u8,
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,
    #[serde(default)]
    pub routing_template: Option<PathBuf>,
    #[serde(default)]
    pub lasam_calib_params: bool,
    #[serde(default)]
    pub attribute_defaults: AttributeDefaults,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForcingsConfig {
    /// Forcing directory; `{*}` is replaced by the basin id.
    pub forcing_dir: String,
    pub forcing_format: ForcingFormat,
    pub forcing_source: Option<String>,
    #[serde(deserialize_with = "opt_window_map_or_json")]
    pub forcing_time: Option<SimulationWindow>,
    pub forcing_venv_dir: PathBuf,
    pub forcing_template: Option<PathBuf>,
}

impl Default for ForcingsConfig {
    fn default() -> Self {
        Self {
            forcing_dir: String::new(),
            forcing_format: ForcingFormat::default(),
            forcing_source: None,
            forcing_time: None,
            forcing_venv_dir: PathBuf::from("~/venv_forcing"),
            forcing_template: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NgenCalConfig {
    /// `calibration` evaluates over `cal_evaluation_time`, `validation`
    /// over `val_evaluation_time`.
    pub task_type: String,
    /// Overrides the calibration working directory (default: basin dir).
    pub state_dir: Option<PathBuf>,
    #[serde(deserialize_with = "opt_window_map_or_json")]
    pub cal_evaluation_time: Option<SimulationWindow>,
    #[serde(deserialize_with = "opt_window_map_or_json")]
    pub val_evaluation_time: Option<SimulationWindow>,
}

impl Default for NgenCalConfig {
    fn default() -> Self {
        Self {
            task_type: "calibration".to_string(),
            state_dir: None,
            cal_evaluation_time: None,
            val_evaluation_time: None,
        }
    }
}

impl NgenCalConfig {
    /// Evaluation window for the configured task, if any.
    pub fn evaluation_window(&self) -> Option<SimulationWindow> {
        if self.task_type == "validation" {
            self.val_evaluation_time
        } else {
            self.cal_evaluation_time
        }
    }
}

fn yes() -> bool {
    true
}

fn one() -> usize {
    1
}

fn parse_token<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = String::deserialize(d)?;
    raw.parse().map_err(D::Error::custom)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WindowRepr {
    Map(SimulationWindow),
    Json(String),
}

impl WindowRepr {
    fn into_window<E: serde::de::Error>(self) -> Result<SimulationWindow, E> {
        match self {
            WindowRepr::Map(w) => Ok(w),
            WindowRepr::Json(text) => serde_json::from_str(&text).map_err(E::custom),
        }
    }
}

/// `{start_time, end_time}` given either as a YAML mapping or as a JSON string.
fn window_map_or_json<'de, D: Deserializer<'de>>(d: D) -> Result<SimulationWindow, D::Error> {
    WindowRepr::deserialize(d)?.into_window()
}

fn opt_window_map_or_json<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<SimulationWindow>, D::Error> {
    Option::<WindowRepr>::deserialize(d)?
        .map(WindowRepr::into_window)
        .transpose()
}

impl WorkflowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading workflow config {}", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("invalid workflow config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let sim = &self.simulations;
        ensure!(
            sim.num_processors_config >= 1,
            "simulations.num_processors_config must be at least 1"
        );
        ensure!(
            sim.num_processors_sim >= 1,
            "simulations.num_processors_sim must be at least 1"
        );
        ensure!(
            sim.stage_timeout_secs != Some(0),
            "simulations.stage_timeout_secs must be positive"
        );
        if let Some(name) = &sim.rename_existing_simulation {
            ensure!(
                !name.is_empty() && !name.contains(['/', '\\']),
                "simulations.rename_existing_simulation must be a plain directory name, got `{name}`"
            );
        }
        ensure!(
            !self.forcings.forcing_dir.is_empty(),
            "forcings.forcing_dir is required"
        );
        Ok(())
    }

    /// Filesystem checks, run before any batch work.
    pub fn check_paths(&self) -> Result<()> {
        ensure!(
            self.input_dir.is_dir(),
            "input_dir {} does not exist",
            self.input_dir.display()
        );
        ensure!(
            self.simulations.ngen_dir.is_dir(),
            "simulations.ngen_dir {} does not exist",
            self.simulations.ngen_dir.display()
        );
        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.simulations.verbosity {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.simulations.stage_timeout_secs.map(Duration::from_secs)
    }

    pub fn routing_template(&self) -> Option<PathBuf> {
        self.simulations.is_routing.then(|| {
            self.simulations
                .routing_template
                .clone()
                .unwrap_or_else(|| self.workflow_dir.join(DEFAULT_ROUTING_TEMPLATE))
        })
    }

    pub fn forcing_template(&self) -> PathBuf {
        self.forcings
            .forcing_template
            .clone()
            .unwrap_or_else(|| self.workflow_dir.join(DEFAULT_FORCING_TEMPLATE))
    }

    /// Forcing download window; falls back to the simulation window.
    pub fn forcing_window(&self) -> SimulationWindow {
        self.forcings
            .forcing_time
            .unwrap_or(self.simulations.simulation_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
workflow_dir: /opt/workflow
input_dir: /data/basins
output_dir: /data/runs
simulations:
  ngen_dir: /opt/ngen
  simulation_time: {start_time: "2010-10-01 00:00:00", end_time: "2011-10-01 00:00:00"}
  model_option: NC
forcings:
  forcing_dir: "/data/basins/{*}/data/forcing"
"#;

    // -- parsing --

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = WorkflowConfig::from_yaml(MINIMAL).unwrap();
        let sim = &cfg.simulations;
        assert_eq!(sim.model_option, Coupling::NomCfe);
        assert_eq!(sim.precip_partitioning_scheme, PartitioningScheme::Schaake);
        assert_eq!(sim.surface_runoff_scheme, RunoffScheme::Giuh);
        assert_eq!(sim.clean, CleanPolicy::None);
        assert!(sim.setup_simulation);
        assert!(sim.num_processors_adaptive);
        assert_eq!(sim.num_processors_config, 1);
        assert_eq!(sim.attribute_defaults, AttributeDefaults::default());
        assert_eq!(cfg.ngen_cal.task_type, "calibration");
        assert!(cfg.routing_template().is_none());
        assert_eq!(cfg.log_level(), LevelFilter::Info);
    }

    #[test]
    fn simulation_time_accepts_json_string() {
        let text = MINIMAL.replace(
            r#"{start_time: "2010-10-01 00:00:00", end_time: "2011-10-01 00:00:00"}"#,
            r#"'{"start_time" : "2010-10-01 00:00:00", "end_time" : "2011-10-01 00:00:00"}'"#,
        );
        let cfg = WorkflowConfig::from_yaml(&text).unwrap();
        assert_eq!(cfg.simulations.simulation_time.start_string(), "2010-10-01 00:00:00");
        assert_eq!(cfg.forcing_window(), cfg.simulations.simulation_time);
    }

    #[test]
    fn long_coupling_token_and_overrides() {
        let text = MINIMAL.replace(
            "model_option: NC",
            "model_option: nom_cfe_smp_sft
  precip_partitioning_scheme: Xinanjiang
  is_routing: true
  verbosity: 2
  attribute_defaults: {soil_b: 4.5}",
        );
        let cfg = WorkflowConfig::from_yaml(&text).unwrap();
        assert_eq!(cfg.simulations.model_option, Coupling::NomCfeSmpSft);
        assert_eq!(cfg.simulations.precip_partitioning_scheme, PartitioningScheme::Xinanjiang);
        assert_eq!(cfg.simulations.attribute_defaults.soil_b, 4.5);
        assert_eq!(cfg.simulations.attribute_defaults.soil_smcmax, 0.439);
        assert_eq!(
            cfg.routing_template().unwrap(),
            Path::new("/opt/workflow/configs/basefiles/config_troute.yaml")
        );
        assert_eq!(cfg.log_level(), LevelFilter::Trace);
    }

    // -- fatal errors --

    #[test]
    fn development_coupling_is_fatal() {
        let text = MINIMAL.replace("model_option: NC", "model_option: BC");
        let err = WorkflowConfig::from_yaml(&text).unwrap_err();
        assert!(format!("{err:#}").contains("under development"), "{err:#}");
    }

    #[test]
    fn unknown_partitioning_is_fatal() {
        let text = MINIMAL.replace(
            "model_option: NC",
            "model_option: NC\n  precip_partitioning_scheme: Horton",
        );
        let err = WorkflowConfig::from_yaml(&text).unwrap_err();
        assert!(format!("{err:#}").contains("Horton"), "{err:#}");
    }

    #[test]
    fn zero_workers_rejected() {
        let text = MINIMAL.replace(
            "model_option: NC",
            "model_option: NC\n  num_processors_config: 0",
        );
        assert!(WorkflowConfig::from_yaml(&text).is_err());
    }

    #[test]
    fn evaluation_window_follows_task_type() {
        let text = format!(
            "{MINIMAL}ngen_cal:\n  task_type: validation\n  cal_evaluation_time: {{start_time: \"2010-10-01 00:00:00\", end_time: \"2011-01-01 00:00:00\"}}\n  val_evaluation_time: {{start_time: \"2011-01-01 00:00:00\", end_time: \"2011-06-01 00:00:00\"}}\n"
        );
        let cfg = WorkflowConfig::from_yaml(&text).unwrap();
        let w = cfg.ngen_cal.evaluation_window().unwrap();
        assert_eq!(w.start_string(), "2011-01-01 00:00:00");
    }
}
