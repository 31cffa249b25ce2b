use thiserror::Error;
use uuid::Uuid;

use crate::meta::ParamKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("Unknown indicator instance: {0}")]
    UnknownInstance(Uuid),

    #[error("Unknown parameter '{key}' for {indicator}")]
    UnknownParameter { indicator: String, key: String },

    #[error("Parameter '{key}' expects {expected:?}")]
    WrongKind { key: String, expected: ParamKind },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Calculation failed: {0}")]
    Calculation(String),
}

pub type IndicatorResult<T> = std::result::Result<T, IndicatorError>;
