//! Pipeline error taxonomy.
//!
//! Configuration and missing-symbol errors abort a run. `InsufficientData` is
//! reported per instrument and never aborts the other instruments. Undefined
//! numeric results are not errors at all; see [`crate::num::Num`].

use thiserror::Error;

use crate::data::LoaderError;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient data for {instrument}: {reason}")]
    InsufficientData { instrument: String, reason: String },

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
}

pub type SignalResult<T> = Result<T, SignalError>;

impl SignalError {
    pub fn insufficient(instrument: &str, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            instrument: instrument.to_string(),
            reason: reason.into(),
        }
    }
}
