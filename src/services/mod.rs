//! Seams to the remote collaborators: identity, session directory, vote
//! casting and results. The core only talks to these traits.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    Credentials, Identity, Registration, SessionId, User, ValidSession, VoteSession,
};

/// Error reported by a collaborator: a rejection or an unreachable service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ServiceResult<Identity>;
    async fn logout(&self) -> ServiceResult<()>;
    /// Creates the account. Does not sign it in.
    async fn register(&self, registration: &Registration) -> ServiceResult<User>;
}

/// Cookie-like persisted client store.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str);
    fn delete(&self, name: &str);
}

#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn list_sessions(&self) -> ServiceResult<Vec<VoteSession>>;
    async fn session(&self, id: SessionId) -> ServiceResult<VoteSession>;
    async fn sessions_voted_by(&self, user_id: &str) -> ServiceResult<Vec<SessionId>>;
    async fn create_session(
        &self,
        session: &ValidSession,
        creator_id: &str,
    ) -> ServiceResult<VoteSession>;
    async fn delete_session(&self, id: SessionId) -> ServiceResult<()>;
    async fn sessions_created_by(&self, user_id: &str) -> ServiceResult<Vec<VoteSession>>;
}

/// Registered accounts, as the admin screens see them.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> ServiceResult<Vec<User>>;
    async fn delete_user(&self, id: &str) -> ServiceResult<()>;
}

#[async_trait]
pub trait VoteService: Send + Sync {
    /// Records the vote. Must reject a second vote for the same (session, user).
    async fn cast_vote(&self, session_id: SessionId, user_id: &str, option: &str)
    -> ServiceResult<()>;
}

#[async_trait]
pub trait ResultsService: Send + Sync {
    /// Raw results payload; `None` while the backend has nothing yet.
    async fn results(&self, session_id: SessionId) -> ServiceResult<Option<Value>>;
}
