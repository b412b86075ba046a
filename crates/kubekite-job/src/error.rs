//! Job-specific error types

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("looking up job '{name}' failed: {source}")]
    Lookup {
        name: String,
        source: kubekite_common::Error,
    },

    #[error("could not launch job '{name}': {source}")]
    Create {
        name: String,
        source: kubekite_common::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Common(#[from] kubekite_common::Error),

    #[error("job template has no containers")]
    MissingContainer,

    #[error("invalid queue entry: {0}")]
    InvalidEntry(String),
}

impl JobError {
    /// Whether re-invoking the same call may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Lookup { source, .. } | JobError::Create { source, .. } => {
                source.is_retryable()
            }
            JobError::Common(e) => e.is_retryable(),
            JobError::Serialization(_) | JobError::MissingContainer | JobError::InvalidEntry(_) => {
                false
            }
        }
    }
}
