use thiserror::Error;

use crate::store::StoreError;

/// Progression engine error type.
///
/// None of these escape `process_activity`: validation failures degrade to
/// zero-reward defaults, corrupt persisted state is replaced by the default
/// state, and store failures are absorbed into the degraded-persistence flag.
#[derive(Error, Debug)]
pub enum ProgressionError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type ProgressionResult<T> = Result<T, ProgressionError>;
