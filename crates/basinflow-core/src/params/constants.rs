/// Fixed values shared by the sub-model parameter files.

// -- Soil column discretization --

/// Soil layer depths for SFT and SMP [m].
pub const SOIL_Z_M: [f64; 19] = [
    0.1, 0.15, 0.18, 0.23, 0.29, 0.36, 0.44, 0.55, 0.69, 0.86, 1.07, 1.34, 1.66, 2.07, 2.58, 3.22,
    4.01, 5.0, 6.0,
];

/// Same layer depths for LASAM [cm].
pub const SOIL_Z_CM: [f64; 19] = [
    10.0, 15.0, 18.0, 23.0, 29.0, 36.0, 44.0, 55.0, 69.0, 86.0, 107.0, 134.0, 166.0, 207.0, 258.0,
    322.0, 401.0, 500.0, 600.0,
];

/// Number of SFT soil cells.
pub const N_SOIL_CELLS: usize = SOIL_Z_M.len();

// -- Soil temperature initialization --

/// Forcing rows averaged for the mean annual air temperature [h].
pub const STEPS_PER_YEAR: usize = 365 * 24;

/// Initial soil temperature when no forcing is readable [K].
pub const DEFAULT_SOIL_TEMPERATURE_K: f64 = 275.15;

// -- CFE --

/// Soil column depth [m].
pub const CFE_SOIL_DEPTH_M: f64 = 2.0;

/// `soil_b` value that triggers the fixed override.
pub const CFE_SOIL_B_MARKER: f64 = 1.0;

/// Value written in place of [`CFE_SOIL_B_MARKER`], as a regular
/// `soil_params.b=1.1[]` line rather than a bare number.
pub const CFE_SOIL_B_OVERRIDE: f64 = 1.1;

/// Initial groundwater storage fraction [m/m].
pub const CFE_GW_STORAGE: f64 = 0.05;

/// Field capacity fraction of porosity [-].
pub const CFE_ALPHA_FC: f64 = 0.33;

/// Subsurface Nash cascade reservoir coefficient [-].
pub const CFE_K_NASH_SUBSURFACE: f64 = 0.03;

/// Subsurface Nash cascade reservoir count.
pub const CFE_N_NASH_SUBSURFACE: usize = 2;

/// Lateral flow coefficient [-].
pub const CFE_K_LF: f64 = 0.01;

/// Ice content above which soil is treated as impermeable [-].
pub const CFE_ICE_CONTENT_THRESHOLD: f64 = 0.3;

/// Urban fraction for the Xinanjiang scheme [-].
pub const CFE_URBAN_DECIMAL_FRACTION: f64 = 0.0;

// -- PET --

/// Penman-Monteith.
pub const PET_METHOD: u32 = 3;

// -- SMP --

/// Depth over which the soil moisture fraction is reported [m].
pub const SMP_MOISTURE_FRACTION_DEPTH_M: f64 = 1.0;

// -- TOPMODEL --

/// `szm td chv rv srmax Q0 sr0 infex xk0 hf dth` line of the params file.
pub const TOPMODEL_PARAMS: &str =
    "0.032  5.0  50.  3600.0  3600.0  0.05  0.0000328  0.002  0  1.0  0.02  0.1";
