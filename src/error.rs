use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no pressure solver selected")]
    NoSolverSelected,

    #[error("more than one pressure solver selected: {0}")]
    AmbiguousSolver(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("malformed checkpoint: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
