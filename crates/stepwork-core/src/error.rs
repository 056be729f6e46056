use crate::types::Step;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepworkError {
    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error("no active questions configured for {0}")]
    EmptyStep(Step),

    #[error("invalid question script: {0}")]
    ScriptInvalid(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("step already complete")]
    StepAlreadyComplete,

    #[error("answer must not be empty")]
    EmptyAnswer,

    #[error("conversation history does not match the script at turn {turn}: expected '{expected}', found '{found}'")]
    HistoryMismatch {
        turn: usize,
        expected: String,
        found: String,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: String, expected: u64, found: u64 },

    #[error("invalid trigger pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StepworkError>;
