/// Lumped arid/semi-arid model (LASAM) configuration.
use std::path::PathBuf;

use basinflow_macros::ConfigLines;

use super::constants::SOIL_Z_CM;
use crate::attributes::CatchmentAttributes;
use crate::error::Result;

/// Van Genuchten soil parameter file shipped with LASAM.
pub const SOIL_PARAMS_FILE: &str = "vG_default_params.dat";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LasamOptions {
    /// Copied van Genuchten parameter file.
    pub soil_params_file: PathBuf,
    pub sft_coupled: bool,
    /// Expose soil parameters for calibration; only honored with SFT.
    pub calib_params: bool,
}

#[derive(Debug, Clone, PartialEq, ConfigLines)]
pub struct LasamConfig {
    pub verbosity: &'static str,
    pub soil_params_file: PathBuf,
    #[config(unit = "[cm]")]
    pub layer_thickness: f64,
    #[config(unit = "[cm]")]
    pub initial_psi: f64,
    #[config(unit = "[sec]")]
    pub timestep: i64,
    #[config(unit = "[hr]")]
    pub endtime: i64,
    #[config(unit = "[sec]")]
    pub forcing_resolution: i64,
    #[config(unit = "[cm]")]
    pub ponded_depth_max: i64,
    #[config(key = "use_closed_form_G")]
    pub use_closed_form_g: bool,
    pub layer_soil_type: i64,
    #[config(unit = "[cm]")]
    pub wilting_point_psi: f64,
    #[config(unit = "[cm]")]
    pub field_capacity_psi: f64,
    pub giuh_ordinates: Vec<f64>,
    pub sft_coupled: Option<bool>,
    #[config(unit = "[cm]")]
    pub soil_z: Option<Vec<f64>>,
    pub calib_params: Option<bool>,
}

pub fn derive(c: &CatchmentAttributes, opts: &LasamOptions) -> Result<LasamConfig> {
    Ok(LasamConfig {
        verbosity: "none",
        soil_params_file: opts.soil_params_file.clone(),
        layer_thickness: 200.0,
        initial_psi: 2000.0,
        timestep: 300,
        endtime: 1000,
        forcing_resolution: 3600,
        ponded_depth_max: 0,
        use_closed_form_g: false,
        layer_soil_type: c.isltyp,
        wilting_point_psi: 15495.0,
        field_capacity_psi: 340.9,
        giuh_ordinates: c.giuh()?.frequencies(),
        sft_coupled: opts.sft_coupled.then_some(true),
        soil_z: opts.sft_coupled.then(|| SOIL_Z_CM.to_vec()),
        calib_params: (opts.sft_coupled && opts.calib_params).then_some(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::tests::sample_table;
    use crate::config_file::ConfigLines;

    fn opts(sft_coupled: bool, calib_params: bool) -> LasamOptions {
        LasamOptions {
            soil_params_file: PathBuf::from("/basin/configs/lasam").join(SOIL_PARAMS_FILE),
            sft_coupled,
            calib_params,
        }
    }

    #[test]
    fn standalone_layout() {
        let table = sample_table();
        let lines = derive(table.get("cat-1").unwrap(), &opts(false, true)).unwrap().lines();
        assert_eq!(lines.len(), 13);
        assert_eq!(
            lines[1],
            "soil_params_file=/basin/configs/lasam/vG_default_params.dat"
        );
        assert_eq!(lines[4], "timestep=300[sec]");
        assert_eq!(lines[7], "ponded_depth_max=0[cm]");
        assert_eq!(lines[8], "use_closed_form_G=false");
        assert_eq!(lines[9], "layer_soil_type=3");
        assert_eq!(lines[12], "giuh_ordinates=0.6,0.4");
    }

    #[test]
    fn sft_keys_only_when_coupled() {
        let table = sample_table();
        let c = table.get("cat-1").unwrap();
        let lines = derive(c, &opts(true, false)).unwrap().lines();
        assert_eq!(lines[13], "sft_coupled=true");
        assert!(lines[14].starts_with("soil_z=10.0,15.0,"));
        assert!(lines[14].ends_with(",600.0[cm]"));
        assert_eq!(lines.len(), 15);

        let lines = derive(c, &opts(true, true)).unwrap().lines();
        assert_eq!(lines.last().unwrap(), "calib_params=true");
    }
}
