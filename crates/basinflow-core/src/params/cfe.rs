/// Conceptual Functional Equivalent (CFE) runoff model configuration.
use basinflow_macros::ConfigLines;

use super::constants::*;
use crate::attributes::CatchmentAttributes;
use crate::coupling::Coupling;
use crate::error::Result;
use crate::scheme::{PartitioningScheme, RunoffScheme};
use crate::soil_class::SoilClassTable;
use crate::submodel::SubModel;

/// Scheme choices that change the CFE file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CfeOptions {
    pub partitioning: PartitioningScheme,
    pub runoff: RunoffScheme,
    /// Append the frozen-soil keys read when SFT feeds ice fraction to CFE.
    pub sft_coupled: bool,
}

impl CfeOptions {
    pub fn for_coupling(
        coupling: Coupling,
        partitioning: PartitioningScheme,
        runoff: RunoffScheme,
    ) -> Self {
        Self {
            partitioning,
            runoff,
            sft_coupled: coupling.has(SubModel::Cfe) && coupling.has(SubModel::Sft),
        }
    }
}

#[derive(Debug, Clone, PartialEq, ConfigLines)]
pub struct CfeConfig {
    pub forcing_file: &'static str,
    pub surface_water_partitioning_scheme: PartitioningScheme,
    pub surface_runoff_scheme: RunoffScheme,
    #[config(key = "soil_params.depth", unit = "[m]")]
    pub soil_depth: f64,
    #[config(key = "soil_params.b", unit = "[]")]
    pub soil_b: f64,
    #[config(key = "soil_params.satdk", unit = "[m s-1]")]
    pub soil_satdk: f64,
    #[config(key = "soil_params.satpsi", unit = "[m]")]
    pub soil_satpsi: f64,
    #[config(key = "soil_params.slop", unit = "[m/m]")]
    pub soil_slop: f64,
    #[config(key = "soil_params.smcmax", unit = "[m/m]")]
    pub soil_smcmax: f64,
    #[config(key = "soil_params.wltsmc", unit = "[m/m]")]
    pub soil_wltsmc: f64,
    #[config(key = "soil_params.expon", unit = "[]")]
    pub soil_expon: f64,
    #[config(key = "soil_params.expon_secondary", unit = "[]")]
    pub soil_expon_secondary: f64,
    pub refkdt: f64,
    #[config(unit = "[m]")]
    pub max_gw_storage: f64,
    #[config(key = "Cgw", unit = "[m h-1]")]
    pub cgw: f64,
    #[config(key = "expon", unit = "[]")]
    pub gw_expon: f64,
    #[config(unit = "[m/m]")]
    pub gw_storage: f64,
    pub alpha_fc: f64,
    #[config(unit = "[m/m]")]
    pub soil_storage: f64,
    #[config(key = "K_nash_subsurface", unit = "[]")]
    pub k_nash_subsurface: f64,
    #[config(key = "N_nash_subsurface")]
    pub n_nash_subsurface: usize,
    #[config(key = "K_lf", unit = "[]")]
    pub k_lf: f64,
    pub nash_storage_subsurface: Vec<f64>,
    pub num_timesteps: usize,
    pub verbosity: i64,

    // -- GIUH tail --
    pub giuh_ordinates: Option<Vec<f64>>,

    // -- Nash cascade tail --
    #[config(key = "N_nash_surface", unit = "[]")]
    pub n_nash_surface: Option<usize>,
    #[config(key = "K_nash_surface", unit = "[h-1]")]
    pub k_nash_surface: Option<f64>,
    #[config(unit = "[]")]
    pub nash_storage_surface: Option<Vec<f64>>,

    // -- Xinanjiang tail --
    #[config(key = "a_Xinanjiang_inflection_point_parameter")]
    pub a_xinanjiang: Option<f64>,
    #[config(key = "b_Xinanjiang_shape_parameter")]
    pub b_xinanjiang: Option<f64>,
    #[config(key = "x_Xinanjiang_shape_parameter")]
    pub x_xinanjiang: Option<f64>,
    pub urban_decimal_fraction: Option<f64>,

    // -- SFT coupling tail --
    pub sft_coupled: Option<bool>,
    pub ice_content_threshold: Option<f64>,
}

/// Derive the CFE configuration of one catchment.
///
/// `soil_classes` is only consulted for the Xinanjiang scheme.
pub fn derive(
    c: &CatchmentAttributes,
    opts: &CfeOptions,
    soil_classes: Option<&SoilClassTable>,
) -> Result<CfeConfig> {
    let soil_b = if c.soil_b == CFE_SOIL_B_MARKER {
        CFE_SOIL_B_OVERRIDE
    } else {
        c.soil_b
    };

    let mut cfg = CfeConfig {
        forcing_file: "BMI",
        surface_water_partitioning_scheme: opts.partitioning,
        surface_runoff_scheme: opts.runoff,
        soil_depth: CFE_SOIL_DEPTH_M,
        soil_b,
        soil_satdk: c.soil_satdk,
        soil_satpsi: c.soil_satpsi,
        soil_slop: c.soil_slope,
        soil_smcmax: c.soil_smcmax,
        soil_wltsmc: c.soil_wltsmc,
        soil_expon: 1.0,
        soil_expon_secondary: 1.0,
        refkdt: c.soil_refkdt,
        max_gw_storage: c.max_gw_storage,
        cgw: c.cgw,
        gw_expon: c.gw_expon,
        gw_storage: CFE_GW_STORAGE,
        alpha_fc: CFE_ALPHA_FC,
        soil_storage: c.soil_smcmax,
        k_nash_subsurface: CFE_K_NASH_SUBSURFACE,
        n_nash_subsurface: CFE_N_NASH_SUBSURFACE,
        k_lf: CFE_K_LF,
        nash_storage_subsurface: vec![0.0; CFE_N_NASH_SUBSURFACE],
        num_timesteps: 1,
        verbosity: 0,
        giuh_ordinates: None,
        n_nash_surface: None,
        k_nash_surface: None,
        nash_storage_surface: None,
        a_xinanjiang: None,
        b_xinanjiang: None,
        x_xinanjiang: None,
        urban_decimal_fraction: None,
        sft_coupled: None,
        ice_content_threshold: None,
    };

    match opts.runoff {
        RunoffScheme::Giuh => {
            cfg.giuh_ordinates = Some(c.giuh()?.frequencies());
        }
        RunoffScheme::NashCascade => {
            let (n, k) = c.require_nash()?;
            let n = n as usize;
            cfg.n_nash_surface = Some(n);
            cfg.k_nash_surface = Some(k);
            cfg.nash_storage_surface = Some(vec![0.0; n]);
        }
    }

    if opts.partitioning == PartitioningScheme::Xinanjiang {
        let class = super::require_soil_classes(soil_classes)?.get(c.isltyp)?;
        cfg.a_xinanjiang = Some(class.axaj);
        cfg.b_xinanjiang = Some(class.bxaj);
        cfg.x_xinanjiang = Some(class.xxaj);
        cfg.urban_decimal_fraction = Some(CFE_URBAN_DECIMAL_FRACTION);
    }

    if opts.sft_coupled {
        cfg.sft_coupled = Some(true);
        cfg.ice_content_threshold = Some(CFE_ICE_CONTENT_THRESHOLD);
    }

    Ok(cfg)
}
