use thiserror::Error;

use crate::models::SessionId;
use crate::services::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("session {0} is not open for voting")]
    SessionNotActive(SessionId),

    #[error("you have already voted in session {0}")]
    AlreadyVoted(SessionId),

    #[error("a vote for session {0} is already being submitted")]
    SubmissionInProgress(SessionId),

    #[error("not allowed: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Remote(String),
}

impl From<ServiceError> for VoteError {
    fn from(err: ServiceError) -> Self {
        VoteError::Remote(err.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    Validation(String),

    #[error("a login request is already in progress")]
    InProgress,

    #[error("{0}")]
    Remote(String),
}

impl From<ServiceError> for AuthError {
    fn from(err: ServiceError) -> Self {
        AuthError::Remote(err.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read fixture {path}: {source}")]
    Fixture {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {0}")]
    FixtureFormat(#[from] serde_json::Error),
}
