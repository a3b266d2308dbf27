/// Realization assembler.
///
/// Builds the ngen realization document for a basin: simulation window,
/// forcing provider, one `bmi_multi` formulation with the coupling's module
/// chain, and optional routing and output root. Assembly validates that
/// every mapped input and requested output is produced somewhere in the
/// chain, so a bad coupling table fails here instead of inside ngen.
pub mod blocks;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coupling::Coupling;
use crate::error::{Error, Result};
use crate::library::LibraryIndex;
use crate::scheme::{PartitioningScheme, RunoffScheme};
use crate::window::SimulationWindow;

use self::blocks::{module_block, sloth_outputs, FORCING_VARIABLES, ID_PLACEHOLDER};

/// Output interval of the realization [s].
pub const OUTPUT_INTERVAL_S: i64 = 3600;

/// Routing config file name inside the basin config dir.
pub const TROUTE_CONFIG_FILE: &str = "troute_config.yaml";

/// Realization file name for a coupling.
pub fn file_name(coupling: Coupling) -> String {
    format!("realization_{}.json", coupling.name())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realization {
    pub time: TimeBlock,
    pub global: GlobalBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start_time: String,
    pub end_time: String,
    pub output_interval: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalBlock {
    pub formulations: Vec<Formulation>,
    pub forcing: ForcingDescriptor,
}

/// Where ngen reads forcing from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum ForcingDescriptor {
    /// One CSV per catchment in `path`.
    CsvPerFeature { file_pattern: String, path: PathBuf },
    /// A single NetCDF file.
    NetCDF { path: PathBuf },
}

impl ForcingDescriptor {
    pub fn csv_per_feature(dir: &Path) -> Self {
        ForcingDescriptor::CsvPerFeature {
            file_pattern: format!(".*{ID_PLACEHOLDER}.*.csv"),
            path: dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ForcingDescriptor::CsvPerFeature { path, .. } | ForcingDescriptor::NetCDF { path } => {
                path
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingBlock {
    pub t_route_config_file_with_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formulation {
    pub name: String,
    pub params: MultiParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiParams {
    pub name: String,
    pub model_type_name: String,
    pub init_config: String,
    pub allow_exceed_end_time: bool,
    pub fixed_time_step: bool,
    pub uses_forcing_file: bool,
    pub main_output_variable: String,
    pub output_variables: Vec<String>,
    pub output_header_fields: Vec<String>,
    pub modules: Vec<ModuleBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleBlock {
    pub name: String,
    pub params: ModuleParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleParams {
    pub name: String,
    pub model_type_name: String,
    pub main_output_variable: String,
    pub library_file: PathBuf,
    pub init_config: String,
    pub allow_exceed_end_time: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_time_step: Option<bool>,
    pub uses_forcing_file: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables_names_map: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_function: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model_params: BTreeMap<String, f64>,
}

/// Everything the assembler needs for one basin.
#[derive(Debug, Clone)]
pub struct RealizationRequest {
    pub coupling: Coupling,
    pub runoff: RunoffScheme,
    pub partitioning: PartitioningScheme,
    pub window: SimulationWindow,
    /// Basin `configs` directory.
    pub config_dir: PathBuf,
    pub forcing: ForcingDescriptor,
    pub routing: bool,
    pub calibration: bool,
    /// Basin `outputs` directory; per-catchment output goes to `div/`.
    pub output_dir: PathBuf,
}

/// Requested outputs as parallel (variables, headers) lists.
pub fn output_fields(
    coupling: Coupling,
    runoff: RunoffScheme,
    partitioning: PartitioningScheme,
) -> (Vec<String>, Vec<String>) {
    coupling
        .output_fields()
        .iter()
        .filter(|(var, _)| !(runoff == RunoffScheme::NashCascade && *var == "GIUH_RUNOFF"))
        .map(|&(var, header)| {
            if partitioning == PartitioningScheme::Xinanjiang && var == "ice_fraction_schaake" {
                ("ice_fraction_xinanjiang", "ice_fraction_xinanjiang")
            } else {
                (var, header)
            }
        })
        .map(|(var, header)| (var.to_string(), header.to_string()))
        .unzip()
}

/// Assemble and validate the realization for `req`.
pub fn assemble(req: &RealizationRequest, libs: &LibraryIndex) -> Result<Realization> {
    let coupling = req.coupling;

    let mut modules = Vec::with_capacity(coupling.modules().len());
    for &model in coupling.modules() {
        let library = libs.require(model)?;
        modules.push(module_block(model, coupling, library, &req.config_dir));
    }

    let (output_variables, output_header_fields) =
        output_fields(coupling, req.runoff, req.partitioning);

    let realization = Realization {
        time: TimeBlock {
            start_time: req.window.start_string(),
            end_time: req.window.end_string(),
            output_interval: OUTPUT_INTERVAL_S,
        },
        global: GlobalBlock {
            formulations: vec![Formulation {
                name: "bmi_multi".to_string(),
                params: MultiParams {
                    name: "bmi_multi".to_string(),
                    model_type_name: coupling.model_type_name().to_string(),
                    init_config: String::new(),
                    allow_exceed_end_time: false,
                    fixed_time_step: false,
                    uses_forcing_file: false,
                    main_output_variable: coupling.main_output_variable().to_string(),
                    output_variables,
                    output_header_fields,
                    modules,
                },
            }],
            forcing: req.forcing.clone(),
        },
        routing: req.routing.then(|| RoutingBlock {
            t_route_config_file_with_path: req.config_dir.join(TROUTE_CONFIG_FILE),
        }),
        output_root: (!req.calibration).then(|| req.output_dir.join("div")),
    };

    realization.validate(coupling)?;
    Ok(realization)
}

impl Realization {
    pub fn formulation(&self) -> Option<&MultiParams> {
        self.global.formulations.first().map(|f| &f.params)
    }

    /// Model type names of the module chain, in order.
    pub fn module_names(&self) -> Vec<&str> {
        self.formulation()
            .map(|f| {
                f.modules
                    .iter()
                    .map(|m| m.params.model_type_name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check the variable graph: every mapped input and requested output
    /// must come from a chain module, SLOTH's constants, or the forcing.
    pub fn validate(&self, coupling: Coupling) -> Result<()> {
        let Some(f) = self.formulation() else {
            return Ok(());
        };
        if f.output_variables.len() != f.output_header_fields.len() {
            return Err(Error::OutputLengthMismatch {
                variables: f.output_variables.len(),
                headers: f.output_header_fields.len(),
            });
        }

        let mut produced: BTreeSet<&str> = coupling
            .modules()
            .iter()
            .flat_map(|m| m.outputs().iter().copied())
            .collect();
        produced.extend(sloth_outputs(coupling));

        for (block, &model) in f.modules.iter().zip(coupling.modules()) {
            for variable in block.params.variables_names_map.values() {
                let v = variable.as_str();
                if !produced.contains(v) && !FORCING_VARIABLES.contains(&v) {
                    return Err(Error::UnresolvedVariable {
                        module: model,
                        variable: variable.clone(),
                    });
                }
            }
        }

        let main = std::iter::once(&f.main_output_variable);
        for variable in f.output_variables.iter().chain(main) {
            if !produced.contains(variable.as_str()) {
                return Err(Error::UnresolvedOutput(variable.clone()));
            }
        }
        Ok(())
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Library paths referenced by the chain.
    pub fn libraries(&self) -> Vec<(&str, &Path)> {
        self.formulation()
            .map(|f| {
                f.modules
                    .iter()
                    .map(|m| (m.params.model_type_name.as_str(), m.params.library_file.as_path()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
