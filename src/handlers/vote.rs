use log::{info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::VoteError;
use crate::lifecycle::{ResultsAccess, results_access};
use crate::models::{SessionId, SessionStatus, SessionView, UserId, VoteSession};
use crate::results::{CanonicalResult, normalize};
use crate::services::{ResultsService, SessionDirectory, VoteService};
use crate::voting::{Tally, compute_tally};

/// What the results panel gets for a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsOutcome {
    NotStarted,
    /// Voting is still open; nothing was fetched.
    Pending,
    /// Session ended but the backend has no results yet.
    Unavailable,
    Ready {
        canonical: CanonicalResult,
        tally: Tally,
    },
}

// Sessions one voter has voted in, as last reported by the directory.
struct VotedCache {
    voter: UserId,
    sessions: HashSet<SessionId>,
}

#[derive(Default)]
struct Cache {
    voted: Option<VotedCache>,
    views: Vec<SessionView>,
}

impl Cache {
    fn voted_for(&self, voter: &str) -> Option<&HashSet<SessionId>> {
        self.voted
            .as_ref()
            .filter(|v| v.voter == voter)
            .map(|v| &v.sessions)
    }

    fn mark_voted(&mut self, voter: &str, session_id: SessionId) {
        match self.voted.as_mut().filter(|v| v.voter == voter) {
            Some(cache) => {
                cache.sessions.insert(session_id);
            }
            None => {
                self.voted = Some(VotedCache {
                    voter: voter.to_string(),
                    sessions: HashSet::from([session_id]),
                });
                self.views.clear();
            }
        }
        for view in self.views.iter_mut().filter(|v| v.session.id == session_id) {
            view.has_voted = true;
        }
    }
}

/// Enforces one vote per user per session on the client side and keeps the
/// voter's session list fresh after each cast.
pub struct VoteCoordinator {
    directory: Arc<dyn SessionDirectory>,
    votes: Arc<dyn VoteService>,
    results: Arc<dyn ResultsService>,
    cache: Mutex<Cache>,
    in_flight: Mutex<HashSet<SessionId>>,
}

impl VoteCoordinator {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        votes: Arc<dyn VoteService>,
        results: Arc<dyn ResultsService>,
    ) -> Self {
        Self {
            directory,
            votes,
            results,
            cache: Mutex::new(Cache::default()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the session list and the voter's voted sessions together and
    /// replaces the cached view wholesale.
    pub async fn refresh_sessions(&self, voter: &str) -> Result<Vec<SessionView>, VoteError> {
        // Fetch both lists concurrently
        let (sessions, voted) = tokio::join!(
            self.directory.list_sessions(),
            self.directory.sessions_voted_by(voter)
        );
        let sessions = sessions?;
        let voted: HashSet<SessionId> = voted?.into_iter().collect();

        let views: Vec<SessionView> = sessions
            .into_iter()
            .map(|session| SessionView {
                has_voted: voted.contains(&session.id),
                session,
            })
            .collect();

        // Replace the cache in one step
        let mut cache = self.cache();
        cache.voted = Some(VotedCache {
            voter: voter.to_string(),
            sessions: voted,
        });
        cache.views = views.clone();
        Ok(views)
    }

    /// Last fetched session list.
    pub fn sessions(&self) -> Vec<SessionView> {
        self.cache().views.clone()
    }

    /// `None` until the voter's voted sessions have been fetched.
    pub fn has_voted(&self, voter: &str, session_id: SessionId) -> Option<bool> {
        self.cache()
            .voted_for(voter)
            .map(|sessions| sessions.contains(&session_id))
    }

    pub async fn cast_vote(
        &self,
        session: &VoteSession,
        voter: &str,
        option: Option<&str>,
    ) -> Result<(), VoteError> {
        // Check the session is open
        if session.status != SessionStatus::Active {
            return Err(VoteError::SessionNotActive(session.id));
        }

        // Validate the selection and the voter
        let option = match option {
            Some(option) if session.has_option(option) => option,
            Some(option) => {
                return Err(VoteError::Validation(format!(
                    "'{}' is not an option of this session",
                    option
                )))
            }
            None => return Err(VoteError::Validation("select an option to vote".into())),
        };
        if voter.trim().is_empty() {
            return Err(VoteError::Validation("sign in to vote".into()));
        }

        // One submission per session at a time
        let _flight = InFlight::enter(&self.in_flight, session.id)
            .ok_or(VoteError::SubmissionInProgress(session.id))?;

        // Load the user's existing votes
        if self.voted_in(voter, session.id).await? {
            return Err(VoteError::AlreadyVoted(session.id));
        }

        // Record the vote
        info!("User {} casting vote in session {}", voter, session.id);
        if let Err(e) = self.votes.cast_vote(session.id, voter, option).await {
            warn!("Vote by {} in session {} rejected: {}", voter, session.id, e);
            return Err(e.into());
        }

        // The cast is durable now; report success only after the list is fresh.
        if let Err(e) = self.refresh_sessions(voter).await {
            warn!("Vote recorded but session refresh failed: {}", e);
        }
        self.cache().mark_voted(voter, session.id);
        info!("Vote by {} in session {} recorded", voter, session.id);
        Ok(())
    }

    async fn voted_in(&self, voter: &str, session_id: SessionId) -> Result<bool, VoteError> {
        if let Some(voted) = self.has_voted(voter, session_id) {
            return Ok(voted);
        }
        let ids = self.directory.sessions_voted_by(voter).await?;
        let sessions: HashSet<SessionId> = ids.into_iter().collect();
        let voted = sessions.contains(&session_id);

        let mut cache = self.cache();
        if cache.voted_for(voter).is_none() {
            cache.views.clear();
        }
        cache.voted = Some(VotedCache {
            voter: voter.to_string(),
            sessions,
        });
        Ok(voted)
    }

    /// Results only for ended sessions; an open session never queries the service.
    pub async fn load_results(&self, session: &VoteSession) -> Result<ResultsOutcome, VoteError> {
        match results_access(session) {
            ResultsAccess::NotStarted => Ok(ResultsOutcome::NotStarted),
            ResultsAccess::Pending => Ok(ResultsOutcome::Pending),
            ResultsAccess::Available => {
                let raw = self.results.results(session.id).await?;
                Ok(match normalize(raw.as_ref()) {
                    Some(canonical) => {
                        let tally = compute_tally(&session.options, &canonical);
                        ResultsOutcome::Ready { canonical, tally }
                    }
                    None => ResultsOutcome::Unavailable,
                })
            }
        }
    }
}

// Held while a cast for one session is outstanding.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<SessionId>>,
    session_id: SessionId,
}

impl<'a> InFlight<'a> {
    fn enter(set: &'a Mutex<HashSet<SessionId>>, session_id: SessionId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id);
        inserted.then_some(Self { set, session_id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}
