//! Error taxonomy for the adaptive testing engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatError>;

/// Fatal conditions raised by the engine.
///
/// Estimation non-convergence is deliberately absent: estimators degrade
/// to the best iterate reached so a simulation always produces a result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatError {
    #[error("point or model belongs to an incompatible latent space ({0})")]
    SpaceMismatch(String),

    #[error("value {value} out of range for dimension {dim}")]
    OutOfRange { dim: String, value: f64 },

    #[error("response {resp} exceeds model maximum {max}")]
    InvalidResponse { resp: u8, max: u8 },

    #[error("unknown parameter name: {0}")]
    UnknownParameter(String),

    #[error("unknown characteristic name: {0}")]
    UnknownCharacteristic(String),

    #[error("unknown covariate name: {0}")]
    UnknownCovariate(String),

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("item {index} was already administered to examinee {examinee}")]
    AlreadyAdministered { index: usize, examinee: String },

    #[error("test {test} is missing a required {phase} algorithm")]
    IncompleteConfiguration {
        test: String,
        phase: &'static str,
    },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("singular matrix in {0}")]
    SingularMatrix(&'static str),
}
