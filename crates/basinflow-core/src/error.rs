/// Errors raised while resolving attributes, deriving parameters or
/// assembling realizations.
use std::path::PathBuf;

use crate::submodel::SubModel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown model coupling option `{0}`")]
    UnknownCoupling(String),

    #[error("model coupling option `{0}` is under development")]
    UnsupportedCoupling(String),

    #[error("precipitation partitioning scheme should be Schaake or Xinanjiang, got `{0}`")]
    UnsupportedPartitioning(String),

    #[error("surface runoff scheme should be GIUH or NASH_CASCADE, got `{0}`")]
    UnsupportedRunoff(String),

    #[error("unknown hydrofabric schema type `{0}`")]
    UnknownSchemaType(String),

    #[error("catchment {catchment}: attribute `{key}` is required but missing")]
    MissingAttribute { catchment: String, key: &'static str },

    #[error("catchment {catchment}: malformed `{key}` distribution: {source}")]
    MalformedDistribution {
        catchment: String,
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("soil class {0} is not present in the soil parameter table")]
    UnknownSoilClass(i64),

    #[error("soil parameter table: {0}")]
    SoilTable(String),

    #[error("no {model} library found under {dir}")]
    MissingLibrary { model: SubModel, dir: PathBuf },

    #[error("module {module} consumes `{variable}` but no module or forcing provides it")]
    UnresolvedVariable { module: SubModel, variable: String },

    #[error("output variable `{0}` is not produced by any module")]
    UnresolvedOutput(String),

    #[error("{variables} output variables but {headers} header fields")]
    OutputLengthMismatch { variables: usize, headers: usize },

    #[error("invalid simulation time: {0}")]
    InvalidTime(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
