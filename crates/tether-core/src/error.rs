use thiserror::Error;

use crate::domain::ExecutionToken;

#[derive(Debug, Error)]
pub enum TetherError {
    #[error("no running item for token={0}")]
    UnknownToken(ExecutionToken),

    #[error("queue is already instrumented")]
    AlreadyInstrumented,

    #[error("tracker is not attached to a queue")]
    NotAttached,

    #[error("config: {0}")]
    Config(String),

    #[error("tracker route failed: {0}")]
    Route(String),
}

pub type Result<T> = std::result::Result<T, TetherError>;
