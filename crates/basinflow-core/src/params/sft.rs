/// Soil freeze-thaw (SFT) model configuration.
use basinflow_macros::ConfigLines;

use super::constants::{DEFAULT_SOIL_TEMPERATURE_K, N_SOIL_CELLS, SOIL_Z_M, STEPS_PER_YEAR};
use crate::attributes::CatchmentAttributes;
use crate::error::Result;
use crate::scheme::PartitioningScheme;
use crate::soil_class::SoilClassTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SftOptions {
    /// Ice fraction scheme; follows the CFE partitioning scheme.
    pub ice_fraction_scheme: PartitioningScheme,
    /// Initial temperature of every soil cell [K].
    pub soil_temperature_k: f64,
}

impl Default for SftOptions {
    fn default() -> Self {
        Self {
            ice_fraction_scheme: PartitioningScheme::default(),
            soil_temperature_k: DEFAULT_SOIL_TEMPERATURE_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, ConfigLines)]
pub struct SftConfig {
    pub verbosity: &'static str,
    pub soil_moisture_bmi: i64,
    #[config(unit = "[d]")]
    pub end_time: f64,
    #[config(unit = "[h]")]
    pub dt: f64,
    #[config(key = "soil_params.smcmax", unit = "[m/m]")]
    pub smcmax: f64,
    #[config(key = "soil_params.b", unit = "[]")]
    pub b: f64,
    #[config(key = "soil_params.satpsi", unit = "[m]")]
    pub satpsi: f64,
    #[config(key = "soil_params.quartz", unit = "[]")]
    pub quartz: f64,
    pub ice_fraction_scheme: PartitioningScheme,
    #[config(unit = "[m]")]
    pub soil_z: Vec<f64>,
    #[config(unit = "[K]")]
    pub soil_temperature: Vec<f64>,
}

pub fn derive(
    c: &CatchmentAttributes,
    opts: &SftOptions,
    soil_classes: Option<&SoilClassTable>,
) -> Result<SftConfig> {
    let class = super::require_soil_classes(soil_classes)?.get(c.isltyp)?;
    Ok(SftConfig {
        verbosity: "none",
        soil_moisture_bmi: 1,
        end_time: 1.0,
        dt: 1.0,
        smcmax: c.soil_smcmax,
        b: c.soil_b,
        satpsi: c.soil_satpsi,
        quartz: class.qtz,
        ice_fraction_scheme: opts.ice_fraction_scheme,
        soil_z: SOIL_Z_M.to_vec(),
        soil_temperature: vec![opts.soil_temperature_k; N_SOIL_CELLS],
    })
}

/// Mean annual air temperature rounded to two decimals, from the leading
/// hourly `T2D` samples. `None` for an empty series.
pub fn mean_annual_temperature(samples: &[f64]) -> Option<f64> {
    let n = samples.len().min(STEPS_PER_YEAR);
    if n == 0 {
        return None;
    }
    let mean = samples[..n].iter().sum::<f64>() / n as f64;
    Some((mean * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::tests::sample_table;
    use crate::config_file::ConfigLines;
    use crate::soil_class::tests::sample;

    #[test]
    fn layers_share_initial_temperature() {
        let table = sample_table();
        let soil = sample();
        let opts = SftOptions {
            ice_fraction_scheme: PartitioningScheme::Xinanjiang,
            soil_temperature_k: 271.35,
        };
        let cfg = derive(table.get("cat-1").unwrap(), &opts, Some(&soil)).unwrap();
        assert_eq!(cfg.soil_temperature.len(), cfg.soil_z.len());
        let lines = cfg.lines();
        assert_eq!(lines[7], "soil_params.quartz=0.6[]");
        assert_eq!(lines[8], "ice_fraction_scheme=Xinanjiang");
        assert!(lines[9].starts_with("soil_z=0.1,0.15,0.18,"));
        assert!(lines[9].ends_with(",5.0,6.0[m]"));
        assert!(lines[10].starts_with("soil_temperature=271.35,271.35,"));
        assert!(lines[10].ends_with("[K]"));
    }

    #[test]
    fn maat_uses_first_year_only() {
        let mut samples = vec![270.0; STEPS_PER_YEAR];
        samples.extend(vec![300.0; 100]);
        assert_eq!(mean_annual_temperature(&samples), Some(270.0));
        assert_eq!(mean_annual_temperature(&[271.0, 272.0, 272.5]), Some(271.83));
        assert_eq!(mean_annual_temperature(&[]), None);
    }
}
