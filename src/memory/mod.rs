//! In-process stand-in for the remote services, used by the demo binary and
//! the tests. It plays the server: it stamps session status from its own
//! clock and enforces one vote per (session, user).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::lifecycle::classify_window;
use crate::models::{
    Credentials, Identity, NewSession, Registration, Role, SessionId, SessionStatus, User, UserId,
    ValidSession, VoteSession,
};
use crate::services::{
    CookieStore, IdentityService, ResultsService, ServiceError, ServiceResult, SessionDirectory,
    UserDirectory, VoteService,
};

/// Layout the results service answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    #[default]
    Nested,
    Flat,
}

impl FromStr for ResultShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nested" => Ok(ResultShape::Nested),
            "flat" => Ok(ResultShape::Flat),
            other => Err(format!("expected 'nested' or 'flat', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureUser {
    pub id: UserId,
    #[serde(default, alias = "userName")]
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl FixtureUser {
    fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureSession {
    pub id: SessionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub creator_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureVote {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub option: String,
}

/// Seed data for [`MemoryBackend`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub sessions: Vec<FixtureSession>,
    #[serde(default)]
    pub votes: Vec<FixtureVote>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// An admin, a user, three voters and one session in each lifecycle
    /// phase, relative to `now`.
    pub fn demo(now: DateTime<Utc>) -> Self {
        let user = |id: &str, name: &str, email: &str, password: &str, role| FixtureUser {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role,
        };
        let session = |id, title: &str, options: &[&str], start_at, end_at| FixtureSession {
            id,
            title: title.into(),
            description: String::new(),
            options: options.iter().map(|o| o.to_string()).collect(),
            start_at,
            end_at,
            creator_id: "1".into(),
        };
        let vote = |session_id, user_id: &str, option: &str| FixtureVote {
            session_id,
            user_id: user_id.into(),
            option: option.into(),
        };

        Self {
            users: vec![
                user("1", "Admin", "admin@example.com", "admin", Role::Admin),
                user("2", "Regular User", "user@example.com", "password", Role::User),
                user("3", "Carla Mendes", "carla@example.com", "carla123", Role::User),
                user("4", "Davi Rocha", "davi@example.com", "davi123", Role::User),
                user("5", "Elisa Prado", "elisa@example.com", "elisa123", Role::User),
            ],
            sessions: vec![
                session(
                    1,
                    "Adopt the four-day week",
                    &["Sim", "Não"],
                    now - Duration::days(3),
                    now - Duration::days(1),
                ),
                session(
                    2,
                    "Office lunch",
                    &["Pizza", "Sushi", "Tacos"],
                    now - Duration::hours(1),
                    now + Duration::days(1),
                ),
                session(
                    3,
                    "Board election",
                    &["Alice", "Bruno"],
                    now + Duration::days(2),
                    now + Duration::days(3),
                ),
            ],
            votes: vec![
                vote(1, "3", "Sim"),
                vote(1, "4", "Sim"),
                vote(1, "5", "Não"),
                vote(2, "3", "Tacos"),
            ],
        }
    }
}

struct StoredSession {
    id: SessionId,
    title: String,
    description: String,
    options: Vec<String>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    creator_id: UserId,
}

impl StoredSession {
    fn from_valid(id: SessionId, valid: ValidSession, creator_id: UserId) -> Self {
        Self {
            id,
            title: valid.title,
            description: valid.description,
            options: valid.options,
            start_at: valid.start_at,
            end_at: valid.end_at,
            creator_id,
        }
    }

    fn to_session(&self, now: DateTime<Utc>) -> VoteSession {
        VoteSession {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            options: self.options.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
            creator_id: self.creator_id.clone(),
            status: classify_window(self.start_at, self.end_at, now),
        }
    }
}

#[derive(Default)]
struct State {
    sessions: BTreeMap<SessionId, StoredSession>,
    // (session, user) is the primary key: one vote each
    votes: HashMap<(SessionId, UserId), String>,
    users: Vec<FixtureUser>,
    signed_in: Option<UserId>,
    next_id: SessionId,
    next_user_id: u64,
}

pub struct MemoryBackend {
    state: Mutex<State>,
    clock: Mutex<Option<DateTime<Utc>>>,
    shape: ResultShape,
}

impl MemoryBackend {
    /// Seeds the store. Entries that break the session rules are logged
    /// and skipped; the first of two entries with the same key wins.
    pub fn new(fixture: Fixture, shape: ResultShape) -> Self {
        let mut state = State::default();

        // Seeded sessions pass the same checks as an admin's draft
        for seed in fixture.sessions {
            if state.sessions.contains_key(&seed.id) {
                warn!("Skipping seeded session {} '{}': id already taken", seed.id, seed.title);
                continue;
            }
            let draft = NewSession {
                title: seed.title,
                description: seed.description,
                start_at: Some(seed.start_at),
                end_at: Some(seed.end_at),
                options: seed.options,
            };
            match draft.validate() {
                Ok(valid) => {
                    let stored = StoredSession::from_valid(seed.id, valid, seed.creator_id);
                    state.sessions.insert(seed.id, stored);
                }
                Err(e) => warn!("Skipping seeded session {}: {}", seed.id, e),
            }
        }

        // Votes must name a loaded session and one of its options
        for vote in fixture.votes {
            let Some(session) = state.sessions.get(&vote.session_id) else {
                warn!("Skipping seeded vote for unknown session {}", vote.session_id);
                continue;
            };
            if !session.options.contains(&vote.option) {
                warn!(
                    "Skipping seeded vote for '{}': not an option of session {}",
                    vote.option, vote.session_id
                );
                continue;
            }
            match state.votes.entry((vote.session_id, vote.user_id)) {
                Entry::Occupied(taken) => warn!(
                    "Skipping second seeded vote by user {} in session {}",
                    taken.key().1,
                    taken.key().0
                ),
                Entry::Vacant(slot) => {
                    slot.insert(vote.option);
                }
            }
        }

        for user in fixture.users {
            let taken = state
                .users
                .iter()
                .any(|u| u.id == user.id || u.email.eq_ignore_ascii_case(&user.email));
            if taken {
                warn!("Skipping seeded user {} <{}>: id or email already taken", user.id, user.email);
                continue;
            }
            state.users.push(user);
        }

        state.next_id = state.sessions.keys().max().copied().unwrap_or(0) + 1;
        // Seeded voters need not have accounts, so new ids skip theirs too
        state.next_user_id = state
            .users
            .iter()
            .map(|u| u.id.as_str())
            .chain(state.votes.keys().map(|(_, voter)| voter.as_str()))
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        info!(
            "Seeded memory backend with {} session(s), {} vote(s), {} user(s)",
            state.sessions.len(),
            state.votes.len(),
            state.users.len()
        );
        Self {
            state: Mutex::new(state),
            clock: Mutex::new(None),
            shape,
        }
    }

    /// Pins the server clock; `None` follows the wall clock.
    pub fn set_now(&self, now: Option<DateTime<Utc>>) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn now(&self) -> DateTime<Utc> {
        let pinned = *self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        pinned.unwrap_or_else(Utc::now)
    }

    pub fn vote_count(&self, session_id: SessionId) -> usize {
        self.lock().votes.keys().filter(|(s, _)| *s == session_id).count()
    }

    pub fn signed_in(&self) -> Option<UserId> {
        self.lock().signed_in.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn results_payload(&self, session: &StoredSession, votes: &HashMap<(SessionId, UserId), String>) -> Value {
        // Every option starts at zero so unvoted ones still show up
        let mut counts: Map<String, Value> = session
            .options
            .iter()
            .map(|option| (option.clone(), json!(0)))
            .collect();

        // Count this session's ballots
        let mut total = 0u64;
        for ((session_id, _), option) in votes {
            if *session_id != session.id {
                continue;
            }
            total += 1;
            let current = counts.get(option).and_then(Value::as_u64).unwrap_or(0);
            counts.insert(option.clone(), json!(current + 1));
        }
        let updated_at = self.now().timestamp_millis();

        // Answer in whichever layout this backend was configured with
        match self.shape {
            ResultShape::Nested => json!({
                "totalVotos": total,
                "resultado": counts,
                "_updatedAt": updated_at,
            }),
            ResultShape::Flat => {
                let mut flat = counts;
                flat.insert("total".into(), json!(total));
                flat.insert("_updatedAt".into(), json!(updated_at));
                Value::Object(flat)
            }
        }
    }
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn login(&self, credentials: &Credentials) -> ServiceResult<Identity> {
        let mut state = self.lock();
        let user = state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(credentials.email.trim()) && u.password == credentials.password)
            .map(|u| Identity {
                user_id: u.id.clone(),
                role: u.role,
            })
            .ok_or_else(|| ServiceError::new("invalid email or password"))?;
        state.signed_in = Some(user.user_id.clone());
        Ok(user)
    }

    async fn logout(&self) -> ServiceResult<()> {
        self.lock().signed_in = None;
        Ok(())
    }

    async fn register(&self, registration: &Registration) -> ServiceResult<User> {
        let mut state = self.lock();
        let email = registration.email.trim();
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(ServiceError::new("email is already registered"));
        }

        let id = state.next_user_id.to_string();
        state.next_user_id += 1;
        let stored = FixtureUser {
            id,
            name: registration.user_name.trim().to_string(),
            email: email.to_string(),
            password: registration.password.clone(),
            role: registration.role,
        };
        let user = stored.to_user();
        state.users.push(stored);
        debug!("Registered user {} <{}> as {}", user.id, user.email, user.role);
        Ok(user)
    }
}

#[async_trait]
impl SessionDirectory for MemoryBackend {
    async fn list_sessions(&self) -> ServiceResult<Vec<VoteSession>> {
        let now = self.now();
        Ok(self.lock().sessions.values().map(|s| s.to_session(now)).collect())
    }

    async fn session(&self, id: SessionId) -> ServiceResult<VoteSession> {
        let now = self.now();
        self.lock()
            .sessions
            .get(&id)
            .map(|s| s.to_session(now))
            .ok_or_else(|| ServiceError::new(format!("session {} not found", id)))
    }

    async fn sessions_voted_by(&self, user_id: &str) -> ServiceResult<Vec<SessionId>> {
        let mut ids: Vec<SessionId> = self
            .lock()
            .votes
            .keys()
            .filter(|(_, voter)| voter == user_id)
            .map(|(session_id, _)| *session_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn create_session(&self, session: &ValidSession, creator_id: &str) -> ServiceResult<VoteSession> {
        let now = self.now();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let stored = StoredSession::from_valid(id, session.clone(), creator_id.to_string());
        let created = stored.to_session(now);
        state.sessions.insert(id, stored);
        debug!("Created session {} '{}'", id, created.title);
        Ok(created)
    }

    async fn delete_session(&self, id: SessionId) -> ServiceResult<()> {
        let mut state = self.lock();
        if state.sessions.remove(&id).is_none() {
            return Err(ServiceError::new(format!("session {} not found", id)));
        }
        state.votes.retain(|(session_id, _), _| *session_id != id);
        Ok(())
    }

    async fn sessions_created_by(&self, user_id: &str) -> ServiceResult<Vec<VoteSession>> {
        let now = self.now();
        Ok(self
            .lock()
            .sessions
            .values()
            .filter(|s| s.creator_id == user_id)
            .map(|s| s.to_session(now))
            .collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.lock().users.iter().map(FixtureUser::to_user).collect())
    }

    /// Ballots the user already cast stay counted.
    async fn delete_user(&self, id: &str) -> ServiceResult<()> {
        let mut state = self.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(ServiceError::new(format!("user {} not found", id)));
        }
        if state.signed_in.as_deref() == Some(id) {
            state.signed_in = None;
        }
        Ok(())
    }
}

#[async_trait]
impl VoteService for MemoryBackend {
    async fn cast_vote(&self, session_id: SessionId, user_id: &str, option: &str) -> ServiceResult<()> {
        let now = self.now();
        let mut state = self.lock();
        let session = state
            .sessions
            .get(&session_id)
            .ok_or_else(|| ServiceError::new(format!("session {} not found", session_id)))?;

        // Window, then option, then the (session, user) key
        if classify_window(session.start_at, session.end_at, now) != SessionStatus::Active {
            return Err(ServiceError::new("session is not accepting votes"));
        }
        if !session.options.iter().any(|o| o == option) {
            return Err(ServiceError::new(format!("'{}' is not an option of this session", option)));
        }

        let key = (session_id, user_id.to_string());
        if state.votes.contains_key(&key) {
            return Err(ServiceError::new("user has already voted in this session"));
        }
        state.votes.insert(key, option.to_string());
        Ok(())
    }
}

#[async_trait]
impl ResultsService for MemoryBackend {
    async fn results(&self, session_id: SessionId) -> ServiceResult<Option<Value>> {
        let state = self.lock();
        let session = state
            .sessions
            .get(&session_id)
            .ok_or_else(|| ServiceError::new(format!("session {} not found", session_id)))?;
        Ok(Some(self.results_payload(session, &state.votes)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Mutex<HashMap<String, String>>,
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn set(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
    }

    fn delete(&self, name: &str) {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}
