/// t-route configuration: the routing template patched for one basin.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use basinflow_core::realization::TROUTE_CONFIG_FILE;
use basinflow_core::schema::FlowpathColumns;
use basinflow_core::window::SimulationWindow;
use serde_yaml::{Mapping, Value};

use crate::yaml;

/// Routing time step [s].
pub const ROUTING_DT_S: i64 = 300;

const MAX_LOOP_SIZE: i64 = 10_000_000;
const CPU_POOL: i64 = 10;

const NETWORK: &str = "network_topology_parameters";
const COMPUTE: &str = "compute_parameters";

/// Stream output written once at the end of the run, as CSV, every 60 min.
fn stream_output(directory: &str) -> Value {
    let mut m = Mapping::new();
    m.insert("stream_output_directory".into(), directory.into());
    m.insert("stream_output_time".into(), (-1).into());
    m.insert("stream_output_type".into(), ".csv".into());
    m.insert("stream_output_internal_frequency".into(), 60.into());
    Value::Mapping(m)
}

pub struct RoutingInputs<'a> {
    pub template: &'a Path,
    pub gpkg: &'a Path,
    pub columns: &'a FlowpathColumns,
    pub window: &'a SimulationWindow,
    /// Basin `outputs` directory.
    pub output_dir: &'a Path,
    /// Calibration runs route the lateral flows ngen-cal writes to its
    /// working directory.
    pub calibration: bool,
}

/// Patch the template and write `<config_dir>/troute_config.yaml`.
pub fn write_config(inputs: &RoutingInputs<'_>, config_dir: &Path) -> Result<PathBuf> {
    let mut doc = yaml::load(inputs.template)?;
    let gpkg = inputs.gpkg.display().to_string();
    let title = inputs
        .gpkg
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('.').next())
        .unwrap_or_default()
        .to_string();

    let sn = [NETWORK, "supernetwork_parameters"];
    yaml::set(&mut doc, &[sn[0], sn[1], "geo_file_path"], gpkg.as_str())?;
    yaml::set(&mut doc, &[sn[0], sn[1], "title_string"], title)?;
    let columns = serde_yaml::to_value(inputs.columns).context("serializing routing columns")?;
    yaml::set(&mut doc, &[sn[0], sn[1], "columns"], columns)?;
    yaml::set(
        &mut doc,
        &[
            NETWORK,
            "waterbody_parameters",
            "level_pool",
            "level_pool_waterbody_parameter_file_path",
        ],
        gpkg.as_str(),
    )?;

    yaml::set(
        &mut doc,
        &[COMPUTE, "restart_parameters", "start_datetime"],
        inputs.window.start_restart(),
    )?;

    let fp = [COMPUTE, "forcing_parameters"];
    let qlat_folder = if inputs.calibration {
        "./".to_string()
    } else {
        inputs.output_dir.join("div").display().to_string()
    };
    yaml::set(&mut doc, &[fp[0], fp[1], "qlat_input_folder"], qlat_folder)?;
    yaml::set(&mut doc, &[fp[0], fp[1], "qlat_file_pattern_filter"], "nex-*")?;
    yaml::remove(&mut doc, &[fp[0], fp[1], "binary_nexus_file_folder"]);
    yaml::set(
        &mut doc,
        &[fp[0], fp[1], "nts"],
        inputs.window.duration_seconds() / ROUTING_DT_S,
    )?;
    yaml::set(&mut doc, &[fp[0], fp[1], "max_loop_size"], MAX_LOOP_SIZE)?;
    yaml::set(&mut doc, &[COMPUTE, "cpu_pool"], CPU_POOL)?;

    let mut output = Mapping::new();
    if inputs.calibration {
        let mut csv = Mapping::new();
        csv.insert("csv_output_folder".into(), "./".into());
        output.insert("csv_output".into(), Value::Mapping(csv));
        output.insert("stream_output".into(), stream_output("./"));
    } else {
        let dir = inputs.output_dir.join("troute").display().to_string();
        output.insert("stream_output".into(), stream_output(&dir));
    }
    yaml::set(&mut doc, &["output_parameters"], Value::Mapping(output))?;

    let path = config_dir.join(TROUTE_CONFIG_FILE);
    yaml::save(&doc, &path)?;
    Ok(path)
}
