/// Potential evapotranspiration (PET) module configuration.
use basinflow_macros::ConfigLines;

use super::constants::PET_METHOD;
use crate::attributes::CatchmentAttributes;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetOptions {
    pub method: u32,
    /// [s]
    pub time_step_size_s: i64,
    pub num_timesteps: i64,
    /// [m]
    pub vegetation_height_m: f64,
    pub surface_shortwave_albedo: f64,
}

impl Default for PetOptions {
    fn default() -> Self {
        Self {
            method: PET_METHOD,
            time_step_size_s: 3600,
            num_timesteps: 720,
            vegetation_height_m: 16.0,
            surface_shortwave_albedo: 0.17,
        }
    }
}

#[derive(Debug, Clone, PartialEq, ConfigLines)]
pub struct PetConfig {
    pub verbose: i64,
    pub pet_method: u32,
    pub forcing_file: &'static str,
    pub run_unit_tests: i64,
    pub yes_aorc: i64,
    pub yes_wrf: i64,
    pub wind_speed_measurement_height_m: f64,
    pub humidity_measurement_height_m: f64,
    pub vegetation_height_m: f64,
    pub zero_plane_displacement_height_m: f64,
    pub momentum_transfer_roughness_length: f64,
    pub heat_transfer_roughness_length_m: f64,
    pub surface_longwave_emissivity: f64,
    pub surface_shortwave_albedo: f64,
    pub cloud_base_height_known: &'static str,
    pub time_step_size_s: i64,
    pub num_timesteps: i64,
    pub shortwave_radiation_provided: i64,
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
    pub site_elevation_m: f64,
}

/// PET configuration at the catchment centroid (geographic coordinates).
pub fn derive(c: &CatchmentAttributes, opts: &PetOptions) -> PetConfig {
    PetConfig {
        verbose: 0,
        pet_method: opts.method,
        forcing_file: "BMI",
        run_unit_tests: 0,
        yes_aorc: 1,
        yes_wrf: 0,
        wind_speed_measurement_height_m: 10.0,
        humidity_measurement_height_m: 2.0,
        vegetation_height_m: opts.vegetation_height_m,
        zero_plane_displacement_height_m: 0.0003,
        momentum_transfer_roughness_length: 0.0,
        heat_transfer_roughness_length_m: 0.0,
        surface_longwave_emissivity: 1.0,
        surface_shortwave_albedo: opts.surface_shortwave_albedo,
        cloud_base_height_known: "FALSE",
        time_step_size_s: opts.time_step_size_s,
        num_timesteps: opts.num_timesteps,
        shortwave_radiation_provided: 1,
        latitude_degrees: c.centroid.lat,
        longitude_degrees: c.centroid.lon,
        site_elevation_m: c.elevation_mean,
    }
}
