use thiserror::Error;
use uuid::Uuid;

/// Failures the engine reports as errors. Missing scores and missing subject
/// names are not errors; they show up as fields on the returned values.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("student {0} not found")]
    StudentNotFound(Uuid),

    #[error("invalid promotion criteria: {0}")]
    InvalidCriteria(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
