/// BMI sub-models that can appear in a NextGen realization.
///
/// Each variant knows where its native config files live, how its shared
/// library is laid out under `ngen/extern`, and which variables it produces.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubModel {
    /// Helper module emitting constant fields for its siblings.
    Sloth,
    /// Noah-OWP-Modular land surface model.
    Nom,
    /// Potential evapotranspiration.
    Pet,
    /// Conceptual Functional Equivalent runoff/groundwater model.
    Cfe,
    Topmodel,
    /// Lumped arid/semi-arid model.
    Lasam,
    /// Soil moisture profiles.
    Smp,
    /// Soil freeze-thaw.
    Sft,
}

impl SubModel {
    pub const ALL: [SubModel; 8] = [
        SubModel::Sloth,
        SubModel::Nom,
        SubModel::Pet,
        SubModel::Cfe,
        SubModel::Topmodel,
        SubModel::Lasam,
        SubModel::Smp,
        SubModel::Sft,
    ];

    /// Name used in `model_type_name` of the realization module block.
    pub fn model_type_name(self) -> &'static str {
        match self {
            SubModel::Sloth => "SLOTH",
            SubModel::Nom => "NoahOWP",
            SubModel::Pet => "PET",
            SubModel::Cfe => "CFE",
            SubModel::Topmodel => "TOPMODEL",
            SubModel::Lasam => "LASAM",
            SubModel::Smp => "SMP",
            SubModel::Sft => "SFT",
        }
    }

    /// Subdirectory of `configs/` holding this model's files. SLOTH has none.
    pub fn config_dir(self) -> Option<&'static str> {
        match self {
            SubModel::Sloth => None,
            SubModel::Nom => Some("nom"),
            SubModel::Pet => Some("pet"),
            SubModel::Cfe => Some("cfe"),
            SubModel::Topmodel => Some("topmodel"),
            SubModel::Lasam => Some("lasam"),
            SubModel::Smp => Some("smp"),
            SubModel::Sft => Some("sft"),
        }
    }

    /// Name of the init config file for catchment `id`.
    ///
    /// Passing `"{{id}}"` yields the realization's per-feature pattern.
    pub fn config_file_name(self, id: &str) -> Option<String> {
        let name = match self {
            SubModel::Sloth => return None,
            SubModel::Nom => format!("nom_config_{id}.input"),
            SubModel::Pet => format!("pet_config_{id}.txt"),
            SubModel::Cfe => format!("cfe_config_{id}.txt"),
            SubModel::Topmodel => format!("topmod_{id}.run"),
            SubModel::Lasam => format!("lasam_config_{id}.txt"),
            SubModel::Smp => format!("smp_config_{id}.txt"),
            SubModel::Sft => format!("sft_config_{id}.txt"),
        };
        Some(name)
    }

    /// Candidate directory names under `ngen/extern`, in probe order.
    pub fn extern_names(self) -> &'static [&'static str] {
        match self {
            SubModel::Sloth => &["sloth"],
            SubModel::Nom => &["noah-owp-modular"],
            SubModel::Pet => &["evapotranspiration"],
            SubModel::Cfe => &["cfe"],
            SubModel::Topmodel => &["topmodel"],
            SubModel::Lasam => &["LASAM", "LGAR-C"],
            SubModel::Smp => &["SoilMoistureProfiles"],
            SubModel::Sft => &["SoilFreezeThaw"],
        }
    }

    /// Whether the build lives at `extern/<name>/cmake_build` rather than
    /// the nested `extern/<name>/<name>/cmake_build`.
    pub fn flat_build(self) -> bool {
        matches!(self, SubModel::Sloth | SubModel::Nom | SubModel::Topmodel)
    }

    /// Output variables exposed through BMI. SLOTH outputs depend on its
    /// `model_params` and are resolved by the assembler.
    pub fn outputs(self) -> &'static [&'static str] {
        match self {
            SubModel::Sloth => &[],
            SubModel::Nom => &[
                "QINSUR", "EVAPOTRANS", "TGS", "ACSNOM", "SNOWH", "SNEQV", "ETRAN", "ECAN", "EDIR",
            ],
            SubModel::Pet => &["water_potential_evaporation_flux"],
            SubModel::Cfe => &[
                "RAIN_RATE",
                "DIRECT_RUNOFF",
                "GIUH_RUNOFF",
                "INFILTRATION_EXCESS",
                "NASH_LATERAL_RUNOFF",
                "DEEP_GW_TO_CHANNEL_FLUX",
                "SOIL_TO_GW_FLUX",
                "Q_OUT",
                "SOIL_STORAGE",
                "SOIL_STORAGE_CHANGE",
                "POTENTIAL_ET",
                "ACTUAL_ET",
                "GW_STORAGE",
            ],
            SubModel::Topmodel => &[
                "Qout",
                "soil_water__domain_volume_deficit",
                "land_surface_water__runoff_mass_flux",
            ],
            SubModel::Lasam => &[
                "precipitation_rate",
                "precipitation",
                "potential_evapotranspiration",
                "actual_evapotranspiration",
                "soil_storage",
                "surface_runoff",
                "giuh_runoff",
                "groundwater_to_stream_recharge",
                "percolation",
                "total_discharge",
                "infiltration",
                "soil_moisture_wetting_fronts",
                "soil_depth_wetting_fronts",
                "soil_num_wetting_fronts",
            ],
            SubModel::Smp => &[
                "soil_water_table",
                "soil_moisture_profile",
                "soil_moisture_fraction",
            ],
            SubModel::Sft => &[
                "num_cells",
                "soil_ice_fraction",
                "ice_fraction_schaake",
                "ice_fraction_xinanjiang",
                "soil_temperature_profile",
            ],
        }
    }
}

impl fmt::Display for SubModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_pattern_uses_placeholder() {
        assert_eq!(
            SubModel::Cfe.config_file_name("{{id}}").unwrap(),
            "cfe_config_{{id}}.txt"
        );
        assert_eq!(
            SubModel::Topmodel.config_file_name("cat-7").unwrap(),
            "topmod_cat-7.run"
        );
    }

    #[test]
    fn sloth_has_no_config() {
        assert!(SubModel::Sloth.config_dir().is_none());
        assert!(SubModel::Sloth.config_file_name("cat-1").is_none());
    }

    #[test]
    fn every_configured_model_has_a_directory_and_file() {
        for model in SubModel::ALL.iter().filter(|m| **m != SubModel::Sloth) {
            assert!(model.config_dir().is_some(), "{model}");
            assert!(model.config_file_name("cat-1").is_some(), "{model}");
        }
    }
}
