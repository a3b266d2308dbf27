/// basinflow: NextGen basin workflow.
///
/// Discovers basins, generates their sub-model configuration and
/// realization, and drives the external partitioning, simulation and
/// calibration tools over a worker pool. Per-catchment derivation lives in
/// `basinflow-core`; this crate owns the filesystem, the GeoPackage reader
/// and the process plumbing.
pub mod batch;
pub mod calib;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod forcing;
pub mod generate;
pub mod geometry;
pub mod hydrofabric;
pub mod lifecycle;
pub mod manifest;
pub mod pipeline;
pub mod settings;
pub mod troute;
pub mod workflow;
pub mod yaml;
