/// Parameter derivation engine.
///
/// Each sub-model module turns [`CatchmentAttributes`] plus its option struct
/// into native file content. [`ParameterEngine`] picks the modules a
/// coupling needs and names the files relative to the basin config dir.
pub mod cfe;
pub mod constants;
pub mod lasam;
pub mod nom;
pub mod pet;
pub mod sft;
pub mod smp;
pub mod topmodel;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::attributes::CatchmentAttributes;
use crate::config_file::ConfigLines;
use crate::coupling::Coupling;
use crate::error::{Error, Result};
use crate::scheme::{PartitioningScheme, RunoffScheme};
use crate::soil_class::SoilClassTable;
use crate::submodel::SubModel;
use crate::window::SimulationWindow;

use self::constants::DEFAULT_SOIL_TEMPERATURE_K;

/// One derived file, relative to the basin `configs` directory.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub model: SubModel,
    pub path: PathBuf,
    pub content: String,
}

pub(crate) fn require_soil_classes(table: Option<&SoilClassTable>) -> Result<&SoilClassTable> {
    table.ok_or_else(|| Error::SoilTable("soil class table not loaded".to_string()))
}

/// Per-basin derivation settings shared by every catchment.
#[derive(Debug, Clone)]
pub struct ParameterEngine<'a> {
    coupling: Coupling,
    partitioning: PartitioningScheme,
    runoff: RunoffScheme,
    window: SimulationWindow,
    config_dir: PathBuf,
    forcing_dir: PathBuf,
    soil_classes: Option<&'a SoilClassTable>,
    soil_temperatures: Option<&'a BTreeMap<String, f64>>,
    lasam_calib_params: bool,
}

impl<'a> ParameterEngine<'a> {
    pub fn new(
        coupling: Coupling,
        partitioning: PartitioningScheme,
        runoff: RunoffScheme,
        window: SimulationWindow,
        config_dir: &Path,
        forcing_dir: &Path,
    ) -> Self {
        Self {
            coupling,
            partitioning,
            runoff,
            window,
            config_dir: config_dir.to_path_buf(),
            forcing_dir: forcing_dir.to_path_buf(),
            soil_classes: None,
            soil_temperatures: None,
            lasam_calib_params: false,
        }
    }

    /// NWM soil classes, needed by SFT and by the Xinanjiang scheme.
    pub fn with_soil_classes(mut self, table: &'a SoilClassTable) -> Self {
        self.soil_classes = Some(table);
        self
    }

    /// Initial soil temperature per catchment [K].
    pub fn with_soil_temperatures(mut self, temps: &'a BTreeMap<String, f64>) -> Self {
        self.soil_temperatures = Some(temps);
        self
    }

    pub fn with_lasam_calib_params(mut self, enabled: bool) -> Self {
        self.lasam_calib_params = enabled;
        self
    }

    pub fn coupling(&self) -> Coupling {
        self.coupling
    }

    /// Absolute directory of a sub-model's files.
    pub fn model_dir(&self, model: SubModel) -> Option<PathBuf> {
        model.config_dir().map(|d| self.config_dir.join(d))
    }

    /// Whether the soil class table must be loaded for this coupling.
    pub fn needs_soil_classes(&self) -> bool {
        self.coupling.has(SubModel::Sft)
            || (self.coupling.has(SubModel::Cfe)
                && self.partitioning == PartitioningScheme::Xinanjiang)
    }

    fn soil_temperature(&self, id: &str) -> f64 {
        self.soil_temperatures
            .and_then(|t| t.get(id).copied())
            .unwrap_or(DEFAULT_SOIL_TEMPERATURE_K)
    }

    /// Every file the coupling needs for one catchment.
    pub fn derive(&self, c: &CatchmentAttributes) -> Result<Vec<GeneratedFile>> {
        let mut files = Vec::new();
        for model in self.coupling.configured_models() {
            files.extend(self.derive_model(model, c)?);
        }
        Ok(files)
    }

    pub fn derive_model(
        &self,
        model: SubModel,
        c: &CatchmentAttributes,
    ) -> Result<Vec<GeneratedFile>> {
        let (Some(dir), Some(name)) = (model.config_dir(), model.config_file_name(&c.id)) else {
            return Ok(Vec::new());
        };
        let file = |content: String| GeneratedFile {
            model,
            path: Path::new(dir).join(&name),
            content,
        };

        let out = match model {
            SubModel::Sloth => Vec::new(),
            SubModel::Cfe => {
                let opts =
                    cfe::CfeOptions::for_coupling(self.coupling, self.partitioning, self.runoff);
                vec![file(cfe::derive(c, &opts, self.soil_classes)?.render())]
            }
            SubModel::Pet => vec![file(pet::derive(c, &pet::PetOptions::default()).render())],
            SubModel::Sft => {
                let opts = sft::SftOptions {
                    ice_fraction_scheme: self.partitioning,
                    soil_temperature_k: self.soil_temperature(&c.id),
                };
                vec![file(sft::derive(c, &opts, self.soil_classes)?.render())]
            }
            SubModel::Smp => {
                let storage = smp::SoilStorageModel::for_coupling(self.coupling);
                vec![file(smp::derive(c, storage).render())]
            }
            SubModel::Lasam => {
                let opts = lasam::LasamOptions {
                    soil_params_file: self.config_dir.join(dir).join(lasam::SOIL_PARAMS_FILE),
                    sft_coupled: self.coupling.has(SubModel::Sft),
                    calib_params: self.lasam_calib_params,
                };
                vec![file(lasam::derive(c, &opts)?.render())]
            }
            SubModel::Nom => {
                let opts = nom::NomOptions {
                    forcing_dir: self.forcing_dir.clone(),
                    parameter_dir: self.config_dir.join(dir).join(nom::PARAMETERS_DIR),
                    dt: 3600.0,
                };
                vec![file(nom::derive(c, &self.window, &opts).render())]
            }
            SubModel::Topmodel => {
                let opts = topmodel::TopmodelOptions {
                    forcing_dir: self.forcing_dir.clone(),
                    topmodel_dir: self.config_dir.join(dir),
                };
                let tm = topmodel::derive(c, &opts)?;
                let dir = Path::new(dir);
                vec![
                    file(tm.run),
                    GeneratedFile {
                        model,
                        path: dir.join(topmodel::params_file_name(&c.id)),
                        content: tm.params,
                    },
                    GeneratedFile {
                        model,
                        path: dir.join(topmodel::subcat_file_name(&c.id)),
                        content: tm.subcat,
                    },
                ]
            }
        };
        Ok(out)
    }
}
