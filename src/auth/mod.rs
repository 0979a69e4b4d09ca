//! Client-held identity.
//!
//! One [`AuthStore`] is built at startup and shared (behind an `Arc`) with
//! whatever needs the current user. `login` and `logout` are the only
//! writers, and both replace the whole state, so `user_id` and `role` can
//! never drift apart.

use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::AuthError;
use crate::models::{Credentials, Identity, Registration, Role, User};
use crate::services::{CookieStore, IdentityService};

pub const COOKIE_USER_ID: &str = "userId";
pub const COOKIE_ROLE: &str = "role";

const MIN_NAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    /// Cookie store has been read. Before that, nobody is known to be anonymous.
    pub loaded: bool,
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.user_id.as_str())
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|i| i.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }
}

/// What a guarded route should do for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Still loading: render nothing, don't redirect.
    Wait,
    RedirectToLogin,
    Forbidden,
    Allow,
}

pub struct AuthStore {
    identity: Arc<dyn IdentityService>,
    cookies: Arc<dyn CookieStore>,
    state: RwLock<AuthState>,
    login_in_flight: AtomicBool,
}

impl AuthStore {
    pub fn new(identity: Arc<dyn IdentityService>, cookies: Arc<dyn CookieStore>) -> Self {
        Self {
            identity,
            cookies,
            state: RwLock::new(AuthState::default()),
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// Reads the persisted identity. Runs once; later calls return the current state.
    pub fn initialize(&self) -> AuthState {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.loaded {
            return state.clone();
        }

        let user_id = self.cookies.get(COOKIE_USER_ID);
        let role = self.cookies.get(COOKIE_ROLE);
        let identity = match (user_id, role) {
            (Some(user_id), Some(role)) => match Role::parse(&role) {
                Some(role) => Some(Identity { user_id, role }),
                None => {
                    warn!("Ignoring persisted identity with unknown role '{}'", role);
                    None
                }
            },
            _ => None,
        };

        match &identity {
            Some(id) => info!("Restored session for user {} ({})", id.user_id, id.role),
            None => info!("No persisted session found"),
        }

        *state = AuthState {
            identity,
            loaded: true,
        };
        state.clone()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        validate_credentials(credentials)?;

        if self.login_in_flight.swap(true, Ordering::AcqRel) {
            return Err(AuthError::InProgress);
        }
        let _reset = FlightReset(&self.login_in_flight);

        let identity = self.identity.login(credentials).await.map_err(|e| {
            warn!("Login failed for {}: {}", credentials.email, e);
            AuthError::from(e)
        })?;

        self.cookies.set(COOKIE_USER_ID, &identity.user_id);
        self.cookies.set(COOKIE_ROLE, identity.role.as_str());
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = AuthState {
            identity: Some(identity.clone()),
            loaded: true,
        };
        info!("User {} logged in as {}", identity.user_id, identity.role);
        Ok(identity)
    }

    /// Creates an account. The caller stays as they were; the new user signs
    /// in separately.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        validate_registration(registration)?;

        let user = self.identity.register(registration).await.map_err(|e| {
            warn!("Registration failed for {}: {}", registration.email, e);
            AuthError::from(e)
        })?;
        info!("Registered user {} as {}", user.id, user.role);
        Ok(user)
    }

    /// Always ends the local session, even when the remote call fails.
    pub async fn logout(&self) {
        if let Err(e) = self.identity.logout().await {
            warn!("Remote logout failed, clearing local session anyway: {}", e);
        }

        self.cookies.delete(COOKIE_USER_ID);
        self.cookies.delete(COOKIE_ROLE);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = AuthState {
            identity: None,
            loaded: true,
        };
        info!("Logged out");
    }

    /// `required = None` admits any signed-in user.
    pub fn guard(&self, required: Option<Role>) -> RouteDecision {
        let state = self.snapshot();
        if !state.loaded {
            return RouteDecision::Wait;
        }
        match (state.role(), required) {
            (None, _) => RouteDecision::RedirectToLogin,
            (Some(_), None) => RouteDecision::Allow,
            (Some(have), Some(need)) if have == need => RouteDecision::Allow,
            (Some(_), Some(_)) => RouteDecision::Forbidden,
        }
    }
}

struct FlightReset<'a>(&'a AtomicBool);

impl Drop for FlightReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<(), AuthError> {
    if !EMAIL_RE.is_match(credentials.email.trim()) {
        return Err(AuthError::Validation("email address is malformed".into()));
    }
    if credentials.password.is_empty() {
        return Err(AuthError::Validation("password is required".into()));
    }
    Ok(())
}

fn validate_registration(registration: &Registration) -> Result<(), AuthError> {
    let name = registration.user_name.trim();
    if name.is_empty() {
        return Err(AuthError::Validation("name is required".into()));
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(AuthError::Validation(format!(
            "name must have at least {} characters",
            MIN_NAME_LEN
        )));
    }
    if !EMAIL_RE.is_match(registration.email.trim()) {
        return Err(AuthError::Validation("email address is malformed".into()));
    }
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
