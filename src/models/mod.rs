use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::VoteError;

pub type SessionId = i64;
pub type UserId = String;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }

    /// Where a freshly logged-in user lands.
    pub fn landing_route(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard/admin",
            Role::User => "/dashboard/user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a session. Owned by the backend; the client only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    NotStarted,
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::NotStarted => "NOT_STARTED",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Ended => "ENDED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSession {
    pub id: SessionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub creator_id: UserId,
    pub status: SessionStatus,
}

impl VoteSession {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// A session as shown to one voter.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: VoteSession,
    pub has_voted: bool,
}

/// Admin-side draft of a session, validated before it is sent anywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub options: Vec<String>,
}

/// A draft that passed validation. Options are trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidSession {
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub options: Vec<String>,
}

impl NewSession {
    pub fn validate(&self) -> Result<ValidSession, VoteError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(VoteError::Validation("title is required".into()));
        }

        let (start_at, end_at) = match (self.start_at, self.end_at) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(VoteError::Validation(
                    "start and end dates are required".into(),
                ))
            }
        };
        if end_at <= start_at {
            return Err(VoteError::Validation(
                "end date must be after the start date".into(),
            ));
        }

        let options: Vec<String> = self
            .options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if options.len() < MIN_OPTIONS {
            return Err(VoteError::Validation(format!(
                "at least {} options are required",
                MIN_OPTIONS
            )));
        }
        if options.len() > MAX_OPTIONS {
            return Err(VoteError::Validation(format!(
                "at most {} options are allowed",
                MAX_OPTIONS
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = options.iter().find(|o| !seen.insert(o.as_str())) {
            return Err(VoteError::Validation(format!("duplicate option: {}", dup)));
        }

        Ok(ValidSession {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            start_at,
            end_at,
            options,
        })
    }
}

/// Confirmed identity returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// A registered account. The backend sends the display name as `userName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "userName")]
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Sign-up form, posted as `{userName, email, password, role}`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl Registration {
    /// New accounts are regular users unless an admin says otherwise.
    pub fn user(
        user_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            email: email.into(),
            password: password.into(),
            role: Role::User,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}
