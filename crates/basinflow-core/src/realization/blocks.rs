/// Per-sub-model BMI module blocks of a `bmi_multi` formulation.
use std::collections::BTreeMap;
use std::path::Path;

use super::{ModuleBlock, ModuleParams};
use crate::coupling::Coupling;
use crate::submodel::SubModel;

/// Per-feature placeholder ngen substitutes with each catchment id.
pub const ID_PLACEHOLDER: &str = "{{id}}";

/// Standard name ngen's forcing providers expose for liquid precipitation.
pub const PRECIP_STANDARD_NAME: &str = "atmosphere_water__liquid_equivalent_precipitation_rate";

/// Variables any forcing provider can satisfy: AORC column names and the
/// CSDMS standard names ngen aliases them to.
pub const FORCING_VARIABLES: &[&str] = &[
    "APCP_surface",
    "DLWRF_surface",
    "DSWRF_surface",
    "PRES_surface",
    "SPFH_2maboveground",
    "TMP_2maboveground",
    "UGRD_10maboveground",
    "VGRD_10maboveground",
    "precip_rate",
    PRECIP_STANDARD_NAME,
    "atmosphere_air_water~vapor__relative_saturation",
    "land_surface_air__temperature",
    "land_surface_air__pressure",
    "land_surface_wind__x_component_of_velocity",
    "land_surface_wind__y_component_of_velocity",
    "land_surface_radiation~incoming~longwave__energy_flux",
    "land_surface_radiation~incoming~shortwave__energy_flux",
];

/// NOM inputs read from the AORC forcing columns.
const NOM_FORCING_MAP: &[(&str, &str)] = &[
    ("PRCPNONC", "APCP_surface"),
    ("Q2", "SPFH_2maboveground"),
    ("SFCTMP", "TMP_2maboveground"),
    ("UU", "UGRD_10maboveground"),
    ("VV", "VGRD_10maboveground"),
    ("LWDN", "DLWRF_surface"),
    ("SOLDN", "DSWRF_surface"),
    ("SFCPRS", "PRES_surface"),
];

/// ngen adapter that loads the library.
pub fn adapter(model: SubModel) -> &'static str {
    match model {
        SubModel::Nom => "bmi_fortran",
        SubModel::Pet | SubModel::Cfe | SubModel::Topmodel => "bmi_c",
        SubModel::Sloth | SubModel::Sft | SubModel::Smp | SubModel::Lasam => "bmi_c++",
    }
}

pub fn main_output_variable(model: SubModel) -> &'static str {
    match model {
        SubModel::Sloth => "z",
        SubModel::Nom => "QINSUR",
        SubModel::Pet => "water_potential_evaporation_flux",
        SubModel::Cfe => "Q_OUT",
        SubModel::Topmodel => "Qout",
        SubModel::Lasam => "precipitation_rate",
        SubModel::Smp => "soil_water_table",
        SubModel::Sft => "num_cells",
    }
}

fn registration_function(model: SubModel) -> Option<&'static str> {
    match model {
        SubModel::Pet => Some("register_bmi_pet"),
        SubModel::Cfe => Some("register_bmi_cfe"),
        SubModel::Topmodel => Some("register_bmi_topmodel"),
        _ => None,
    }
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Input-name to provider-name mapping of `model` within `coupling`.
pub fn variables_names_map(model: SubModel, coupling: Coupling) -> BTreeMap<String, String> {
    match model {
        SubModel::Sloth | SubModel::Pet => BTreeMap::new(),
        SubModel::Nom => map(NOM_FORCING_MAP),
        SubModel::Cfe => {
            let precip = if coupling.has(SubModel::Nom) {
                "QINSUR"
            } else {
                PRECIP_STANDARD_NAME
            };
            let pet = if coupling.has(SubModel::Pet) {
                "water_potential_evaporation_flux"
            } else {
                "EVAPOTRANS"
            };
            map(&[
                (PRECIP_STANDARD_NAME, precip),
                ("water_potential_evaporation_flux", pet),
            ])
        }
        SubModel::Topmodel => map(&[
            (PRECIP_STANDARD_NAME, "QINSUR"),
            ("water_potential_evaporation_flux", "EVAPOTRANS"),
        ]),
        SubModel::Lasam => map(&[
            ("precipitation_rate", "QINSUR"),
            ("potential_evapotranspiration_rate", "EVAPOTRANS"),
        ]),
        SubModel::Sft => map(&[("ground_temperature", "TGS")]),
        SubModel::Smp => {
            if coupling.has(SubModel::Lasam) {
                map(&[
                    ("soil_storage", "sloth_soil_storage"),
                    ("soil_storage_change", "sloth_soil_storage_change"),
                    ("soil_moisture_wetting_fronts", "soil_moisture_wetting_fronts"),
                    ("soil_depth_wetting_fronts", "soil_depth_wetting_fronts"),
                    ("num_wetting_fronts", "soil_num_wetting_fronts"),
                ])
            } else {
                map(&[
                    ("soil_storage", "SOIL_STORAGE"),
                    ("soil_storage_change", "SOIL_STORAGE_CHANGE"),
                ])
            }
        }
    }
}

/// Module block for `model`, loading `library` and reading its per-feature
/// init config from `config_dir`.
pub fn module_block(
    model: SubModel,
    coupling: Coupling,
    library: &Path,
    config_dir: &Path,
) -> ModuleBlock {
    let init_config = match (model.config_dir(), model.config_file_name(ID_PLACEHOLDER)) {
        (Some(dir), Some(file)) => config_dir.join(dir).join(file).display().to_string(),
        _ => "/dev/null".to_string(),
    };
    let fixed_time_step = matches!(
        model,
        SubModel::Sloth | SubModel::Nom | SubModel::Cfe | SubModel::Topmodel
    )
    .then_some(false);
    let model_params = if model == SubModel::Sloth {
        coupling
            .sloth_params()
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    } else {
        BTreeMap::new()
    };

    let name = adapter(model).to_string();
    ModuleBlock {
        name: name.clone(),
        params: ModuleParams {
            name,
            model_type_name: model.model_type_name().to_string(),
            main_output_variable: main_output_variable(model).to_string(),
            library_file: library.to_path_buf(),
            init_config,
            allow_exceed_end_time: true,
            fixed_time_step,
            uses_forcing_file: false,
            variables_names_map: variables_names_map(model, coupling),
            registration_function: registration_function(model).map(str::to_string),
            model_params,
        },
    }
}

/// Variables SLOTH provides: its `model_params` names up to the first `(`.
pub fn sloth_outputs(coupling: Coupling) -> impl Iterator<Item = &'static str> {
    coupling
        .sloth_params()
        .iter()
        .map(|&(k, _)| k.split('(').next().unwrap_or(k))
}
