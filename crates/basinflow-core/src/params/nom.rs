/// Noah-OWP-Modular (NOM) land surface namelist.
///
/// Unlike the other sub-models NOM reads a Fortran namelist, so the file is
/// assembled block by block rather than through `ConfigLines`.
use std::path::PathBuf;

use crate::attributes::CatchmentAttributes;
use crate::window::SimulationWindow;

/// Directory under the NOM config dir holding the copied parameter tables.
pub const PARAMETERS_DIR: &str = "parameters";

#[derive(Debug, Clone, PartialEq)]
pub struct NomOptions {
    /// Basin forcing directory; NOM reads `<dir>/<id>.csv`.
    pub forcing_dir: PathBuf,
    /// Copied parameter tables (`configs/nom/parameters`).
    pub parameter_dir: PathBuf,
    /// [s]
    pub dt: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NomConfig {
    pub dt: f64,
    /// `YYYYMMDDhhmm`
    pub startdate: String,
    pub enddate: String,
    pub forcing_filename: PathBuf,
    pub output_filename: String,
    pub parameter_dir: PathBuf,
    pub lat: f64,
    pub lon: f64,
    pub isltyp: i64,
    pub vegtyp: i64,
}

pub fn derive(c: &CatchmentAttributes, window: &SimulationWindow, opts: &NomOptions) -> NomConfig {
    NomConfig {
        dt: opts.dt,
        startdate: window.start_compact(),
        enddate: window.end_compact(),
        forcing_filename: opts.forcing_dir.join(format!("{}.csv", c.id)),
        output_filename: format!("output-{}.csv", c.id),
        parameter_dir: opts.parameter_dir.clone(),
        lat: c.centroid.lat,
        lon: c.centroid.lon,
        isltyp: c.isltyp,
        vegtyp: c.ivgtyp,
    }
}

impl NomConfig {
    pub fn lines(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(64);

        // -- timing --
        out.push("&timing                                   ! and input/output paths".into());
        out.push(format!("  dt                 = {:?}             ! timestep [seconds]", self.dt));
        out.push(format!(
            "  startdate          = \"{}\"             ! UTC time start of simulation (YYYYMMDDhhmm)",
            self.startdate
        ));
        out.push(format!(
            "  enddate            = \"{}\"             ! UTC time end of simulation (YYYYMMDDhhmm)",
            self.enddate
        ));
        out.push(format!(
            "  forcing_filename   = \"{}\"         ! file containing forcing data",
            self.forcing_filename.display()
        ));
        out.push(format!("  output_filename    = \"{}\"", self.output_filename));
        out.push("/\n".into());

        // -- parameters --
        out.push("&parameters".into());
        out.push(format!(
            "  parameter_dir      = \"{}\"  ! location of input parameter files",
            self.parameter_dir.display()
        ));
        out.extend(
            [
                "  general_table      = \"GENPARM.TBL\"                ! general param tables and misc params",
                "  soil_table         = \"SOILPARM.TBL\"               ! soil param table",
                "  noahowp_table      = \"MPTABLE.TBL\"                ! model param tables (includes veg)",
                "  soil_class_name    = \"STAS\"                       ! soil class data source - STAS or STAS-RUC",
                "  veg_class_name     = \"MODIFIED_IGBP_MODIS_NOAH\"   ! vegetation class data source - MODIFIED_IGBP_MODIS_NOAH or USGS",
                "/\n",
            ]
            .map(String::from),
        );

        // -- location --
        out.push("&location                                         ! for point runs".into());
        out.push(format!(
            "  lat              = {:?}                           ! latitude [degrees]  (-90 to 90)",
            self.lat
        ));
        out.push(format!(
            "  lon              = {:?}                           ! longitude [degrees] (-180 to 180)",
            self.lon
        ));
        out.extend(
            [
                "  terrain_slope    = 0.0                          ! terrain slope [degrees]",
                "  azimuth          = 0.0                          ! terrain azimuth or aspect [degrees clockwise from north]",
                "/ \n",
                "&forcing",
                "  ZREF               = 10.0                        ! measurement height for wind speed (m)",
                "  rain_snow_thresh   = 1.0                         ! rain-snow temperature threshold (degrees Celcius)",
                "/ \n",
            ]
            .map(String::from),
        );

        // -- model options --
        out.push(
            "&model_options                                   ! see OptionsType.f90 for details"
                .into(),
        );
        for (name, value) in MODEL_OPTIONS {
            out.push(format!("  {name:<34}= {value}"));
        }
        out.push("/\n".into());

        // -- structure --
        out.push("&structure".into());
        out.push(format!(
            "  isltyp           = {}               ! soil texture class",
            self.isltyp
        ));
        out.extend(
            [
                "  nsoil            = 4               ! number of soil levels",
                "  nsnow            = 3               ! number of snow levels",
                "  nveg             = 27              ! number of vegetation types",
            ]
            .map(String::from),
        );
        out.push(format!(
            "  vegtyp           = {}               ! vegetation type",
            self.vegtyp
        ));
        out.extend(
            [
                "  croptype         = 0               ! crop type (0 = no crops; this option is currently inactive)",
                "  sfctyp           = 1               ! land surface type, 1:soil, 2:lake",
                "  soilcolor       = 4               ! soil color code",
                "/\n",
                "&initial_values",
                "  dzsnso    =  0.0,  0.0,  0.0,  0.1,  0.3,  0.6,  1.0     ! level thickness [m]",
                "  sice      =  0.0,  0.0,  0.0,  0.0                       ! initial soil ice profile [m3/m3]",
                "  sh2o      =  0.3,  0.3,  0.3,  0.3                       ! initial soil liquid profile [m3/m3]",
                "  zwt       =  -2.0                                        ! initial water table depth below surface [m]",
                "/\n",
            ]
            .map(String::from),
        );
        out
    }

    pub fn render(&self) -> String {
        self.lines().join("\n")
    }
}

/// Physics options, in namelist order.
const MODEL_OPTIONS: [(&str, u8); 17] = [
    ("precip_phase_option", 1),
    ("snow_albedo_option", 1),
    ("dynamic_veg_option", 4),
    ("runoff_option", 3),
    ("drainage_option", 8),
    ("frozen_soil_option", 1),
    ("dynamic_vic_option", 1),
    ("radiative_transfer_option", 3),
    ("sfc_drag_coeff_option", 1),
    ("canopy_stom_resist_option", 1),
    ("crop_model_option", 0),
    ("snowsoil_temp_time_option", 3),
    ("soil_temp_boundary_option", 2),
    ("supercooled_water_option", 1),
    ("stomatal_resistance_option", 1),
    ("evap_srfc_resistance_option", 4),
    ("subsurface_option", 2),
];
