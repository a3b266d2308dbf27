/// Soil moisture profile (SMP) module configuration.
use basinflow_macros::ConfigLines;

use super::constants::{CFE_SOIL_DEPTH_M, SMP_MOISTURE_FRACTION_DEPTH_M, SOIL_Z_M};
use crate::attributes::CatchmentAttributes;
use crate::coupling::Coupling;
use crate::submodel::SubModel;

/// How the upstream runoff model reports soil storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoilStorageModel {
    /// Single reservoir (CFE).
    Conceptual,
    /// Wetting-front layers (LASAM).
    Layered,
}

impl SoilStorageModel {
    pub fn for_coupling(coupling: Coupling) -> Option<Self> {
        if coupling.has(SubModel::Cfe) {
            Some(SoilStorageModel::Conceptual)
        } else if coupling.has(SubModel::Lasam) {
            Some(SoilStorageModel::Layered)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, ConfigLines)]
pub struct SmpConfig {
    pub verbosity: &'static str,
    #[config(key = "soil_params.smcmax", unit = "[m/m]")]
    pub smcmax: f64,
    #[config(key = "soil_params.b", unit = "[]")]
    pub b: f64,
    #[config(key = "soil_params.satpsi", unit = "[m]")]
    pub satpsi: f64,
    #[config(unit = "[m]")]
    pub soil_z: Vec<f64>,
    #[config(unit = "[m]")]
    pub soil_moisture_fraction_depth: f64,
    pub soil_storage_model: Option<&'static str>,
    pub soil_storage_depth: Option<f64>,
    pub soil_moisture_profile_option: Option<&'static str>,
    pub soil_depth_layers: Option<f64>,
    #[config(unit = "[m]")]
    pub water_table_depth: Option<i64>,
}

pub fn derive(c: &CatchmentAttributes, storage: Option<SoilStorageModel>) -> SmpConfig {
    let mut cfg = SmpConfig {
        verbosity: "none",
        smcmax: c.soil_smcmax,
        b: c.soil_b,
        satpsi: c.soil_satpsi,
        soil_z: SOIL_Z_M.to_vec(),
        soil_moisture_fraction_depth: SMP_MOISTURE_FRACTION_DEPTH_M,
        soil_storage_model: None,
        soil_storage_depth: None,
        soil_moisture_profile_option: None,
        soil_depth_layers: None,
        water_table_depth: None,
    };
    match storage {
        Some(SoilStorageModel::Conceptual) => {
            cfg.soil_storage_model = Some("conceptual");
            cfg.soil_storage_depth = Some(CFE_SOIL_DEPTH_M);
        }
        Some(SoilStorageModel::Layered) => {
            cfg.soil_storage_model = Some("layered");
            cfg.soil_moisture_profile_option = Some("constant");
            cfg.soil_depth_layers = Some(CFE_SOIL_DEPTH_M);
            cfg.water_table_depth = Some(10);
        }
        None => {}
    }
    cfg
}
