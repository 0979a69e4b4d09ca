pub mod admin;
pub mod vote;

pub use admin::{AdminStats, SessionAdmin};
pub use vote::{ResultsOutcome, VoteCoordinator};
