//! Client core for collective-decision voting: session lifecycle gating,
//! one-vote-per-user casting, results normalization and tallying, and the
//! client-held identity cache.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod results;
pub mod services;
pub mod voting;

pub use auth::{AuthState, AuthStore, RouteDecision};
pub use error::{AuthError, ConfigError, VoteError};
pub use handlers::{AdminStats, ResultsOutcome, SessionAdmin, VoteCoordinator};
pub use models::{Identity, Registration, Role, SessionStatus, SessionView, User, VoteSession};
pub use results::{CanonicalResult, normalize};
pub use voting::{Tally, TallyEntry, compute_tally};
