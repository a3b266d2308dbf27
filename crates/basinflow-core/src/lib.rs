/// basinflow-core: per-basin configuration logic for NextGen simulations.
///
/// Resolves hydrofabric attribute schemas, derives sub-model parameter files,
/// and assembles realization documents. Pure functions over in-memory data;
/// filesystem access is limited to the library probe.
extern crate self as basinflow_core;

pub mod attributes;
pub mod config_file;
pub mod coupling;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod library;
pub mod params;
pub mod partition;
pub mod realization;
pub mod schema;
pub mod scheme;
pub mod soil_class;
pub mod submodel;
pub mod window;

pub use error::{Error, Result};
