//! Session lifecycle rules.
//!
//! [`classify`] is the time-window rule the backend applies when it stamps
//! `status` on a session; [`classify_window`] is the same rule over a bare
//! `[start, end)` pair, for stores that hold the window before a session
//! exists. Client code gates on `session.status` alone and never calls
//! either, so a skewed local clock cannot disagree with the server.

use chrono::{DateTime, Utc};

use crate::models::{SessionStatus, SessionView, VoteSession};

/// Status of `session` at `now`, from its window. Ignores the stamped `status`.
pub fn classify(session: &VoteSession, now: DateTime<Utc>) -> SessionStatus {
    classify_window(session.start_at, session.end_at, now)
}

pub fn classify_window(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SessionStatus {
    if now < start_at {
        SessionStatus::NotStarted
    } else if now < end_at {
        SessionStatus::Active
    } else {
        SessionStatus::Ended
    }
}

/// Voting is open only on an active session the user hasn't voted in.
pub fn can_vote(session: &VoteSession, has_voted: bool) -> bool {
    session.status == SessionStatus::Active && !has_voted
}

/// What the results panel may show for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsAccess {
    NotStarted,
    /// Voting still open; show "results pending" and don't query.
    Pending,
    Available,
}

pub fn results_access(session: &VoteSession) -> ResultsAccess {
    match session.status {
        SessionStatus::NotStarted => ResultsAccess::NotStarted,
        SessionStatus::Active => ResultsAccess::Pending,
        SessionStatus::Ended => ResultsAccess::Available,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Ended,
    NotStarted,
}

impl StatusFilter {
    fn admits(&self, status: SessionStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == SessionStatus::Active,
            StatusFilter::Ended => status == SessionStatus::Ended,
            StatusFilter::NotStarted => status == SessionStatus::NotStarted,
        }
    }
}

/// Status filter plus a case-insensitive search over title and description.
pub fn filter_sessions<'a>(
    views: &'a [SessionView],
    filter: StatusFilter,
    search: &str,
) -> Vec<&'a SessionView> {
    let needle = search.trim().to_lowercase();
    views
        .iter()
        .filter(|view| filter.admits(view.session.status))
        .filter(|view| {
            needle.is_empty()
                || view.session.title.to_lowercase().contains(&needle)
                || view.session.description.to_lowercase().contains(&needle)
        })
        .collect()
}
