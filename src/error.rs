use thiserror::Error;

/// Reasons a prediction request cannot produce a room.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocalizationError {
    #[error("training data is empty after aggregation and filtering")]
    EmptyTrainingData,

    #[error("live scan has no usable reading for the training routers")]
    EmptyQueryData,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("model training failed: {0}")]
    Training(String),
}

pub type LocalizationResult<T> = Result<T, LocalizationError>;
