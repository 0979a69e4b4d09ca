use log::info;
use std::sync::Arc;

use crate::auth::AuthStore;
use crate::error::VoteError;
use crate::models::{Identity, NewSession, Role, SessionId, SessionStatus, User, VoteSession};
use crate::services::{SessionDirectory, UserDirectory};

/// Counters for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminStats {
    /// Sessions the signed-in admin created.
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_users: usize,
}

/// Session and user management for administrators.
pub struct SessionAdmin {
    directory: Arc<dyn SessionDirectory>,
    users: Arc<dyn UserDirectory>,
    auth: Arc<AuthStore>,
}

impl SessionAdmin {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        users: Arc<dyn UserDirectory>,
        auth: Arc<AuthStore>,
    ) -> Self {
        Self {
            directory,
            users,
            auth,
        }
    }

    fn require_admin(&self) -> Result<Identity, VoteError> {
        match self.auth.snapshot().identity {
            Some(identity) if identity.role == Role::Admin => Ok(identity),
            Some(_) => Err(VoteError::Forbidden("administrator role required".into())),
            None => Err(VoteError::Forbidden("sign in as an administrator".into())),
        }
    }

    pub async fn sessions(&self) -> Result<Vec<VoteSession>, VoteError> {
        self.require_admin()?;
        Ok(self.directory.list_sessions().await?)
    }

    pub async fn find_session(&self, id: SessionId) -> Result<VoteSession, VoteError> {
        self.require_admin()?;
        Ok(self.directory.session(id).await?)
    }

    /// Sessions a given user has voted in.
    pub async fn sessions_voted_by(&self, user_id: &str) -> Result<Vec<VoteSession>, VoteError> {
        self.require_admin()?;
        let (sessions, voted) = tokio::join!(
            self.directory.list_sessions(),
            self.directory.sessions_voted_by(user_id)
        );
        let voted = voted?;
        Ok(sessions?
            .into_iter()
            .filter(|s| voted.contains(&s.id))
            .collect())
    }

    /// Validates the draft and creates it with the signed-in admin as creator.
    pub async fn create_session(&self, draft: &NewSession) -> Result<VoteSession, VoteError> {
        let admin = self.require_admin()?;
        let valid = draft.validate()?;
        let created = self.directory.create_session(&valid, &admin.user_id).await?;
        info!("Admin {} created session {} '{}'", admin.user_id, created.id, created.title);
        Ok(created)
    }

    /// Deletes a session and returns the refreshed list.
    pub async fn delete_session(&self, id: SessionId) -> Result<Vec<VoteSession>, VoteError> {
        let admin = self.require_admin()?;
        self.directory.delete_session(id).await?;
        info!("Admin {} deleted session {}", admin.user_id, id);
        Ok(self.directory.list_sessions().await?)
    }

    pub async fn sessions_created_by(&self, user_id: &str) -> Result<Vec<VoteSession>, VoteError> {
        self.require_admin()?;
        Ok(self.directory.sessions_created_by(user_id).await?)
    }

    /// Dashboard counters: the admin's own sessions and every registered user.
    pub async fn stats(&self) -> Result<AdminStats, VoteError> {
        let admin = self.require_admin()?;
        let (users, created) = tokio::join!(
            self.users.list_users(),
            self.directory.sessions_created_by(&admin.user_id)
        );
        let created = created?;
        Ok(AdminStats {
            total_sessions: created.len(),
            active_sessions: created
                .iter()
                .filter(|s| s.status == SessionStatus::Active)
                .count(),
            total_users: users?.len(),
        })
    }

    pub async fn users(&self) -> Result<Vec<User>, VoteError> {
        self.require_admin()?;
        Ok(self.users.list_users().await?)
    }

    /// Users whose name or email contains `query`, ignoring case. A blank query lists everyone.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>, VoteError> {
        let users = self.users().await?;
        Ok(filter_users(users, query))
    }

    /// Deletes an account and returns the refreshed user list.
    pub async fn delete_user(&self, id: &str) -> Result<Vec<User>, VoteError> {
        let admin = self.require_admin()?;
        if id.trim().is_empty() {
            return Err(VoteError::Validation("user id is required".into()));
        }
        self.users.delete_user(id).await?;
        info!("Admin {} deleted user {}", admin.user_id, id);
        Ok(self.users.list_users().await?)
    }
}

pub fn filter_users(users: Vec<User>, query: &str) -> Vec<User> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return users;
    }
    users
        .into_iter()
        .filter(|u| {
            u.name.to_lowercase().contains(&needle) || u.email.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fixture, MemoryBackend, MemoryCookieStore, ResultShape};
    use crate::models::Credentials;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    async fn admin_as(email: &str, password: &str) -> (SessionAdmin, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(Fixture::demo(now()), ResultShape::Nested));
        backend.set_now(Some(now()));
        let auth = Arc::new(AuthStore::new(backend.clone(), Arc::new(MemoryCookieStore::default())));
        auth.initialize();
        if !email.is_empty() {
            auth.login(&Credentials::new(email, password)).await.unwrap();
        }
        (SessionAdmin::new(backend.clone(), backend.clone(), auth), backend)
    }

    fn draft() -> NewSession {
        NewSession {
            title: "Retro day".into(),
            description: "pick one".into(),
            start_at: Some(now() - Duration::minutes(5)),
            end_at: Some(now() + Duration::hours(1)),
            options: vec!["Mon".into(), " Fri ".into(), "".into()],
        }
    }

    #[tokio::test]
    async fn admin_creates_session_as_creator() {
        let (admin, _) = admin_as("admin@example.com", "admin").await;
        let created = admin.create_session(&draft()).await.unwrap();
        assert_eq!(created.creator_id, "1");
        assert_eq!(created.options, vec!["Mon", "Fri"]);
        assert_eq!(created.status, SessionStatus::Active);
        assert_eq!(admin.find_session(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_before_the_directory() {
        let (admin, backend) = admin_as("admin@example.com", "admin").await;
        let mut bad = draft();
        bad.options = vec!["Solo".into()];
        assert!(matches!(admin.create_session(&bad).await, Err(VoteError::Validation(_))));
        assert_eq!(backend.list_sessions().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn regular_users_and_anonymous_are_forbidden() {
        let (as_user, _) = admin_as("user@example.com", "password").await;
        assert!(matches!(as_user.create_session(&draft()).await, Err(VoteError::Forbidden(_))));
        assert!(matches!(as_user.delete_session(1).await, Err(VoteError::Forbidden(_))));

        let (anonymous, _) = admin_as("", "").await;
        assert!(matches!(anonymous.sessions().await, Err(VoteError::Forbidden(_))));
    }

    #[tokio::test]
    async fn delete_returns_remaining_sessions() {
        let (admin, _) = admin_as("admin@example.com", "admin").await;
        let remaining = admin.delete_session(2).await.unwrap();
        let ids: Vec<SessionId> = remaining.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(admin.delete_session(2).await, Err(VoteError::Remote("session 2 not found".into())));
    }

    #[tokio::test]
    async fn lists_sessions_a_user_voted_in() {
        let (admin, _) = admin_as("admin@example.com", "admin").await;
        let voted: Vec<SessionId> = admin
            .sessions_voted_by("3")
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(voted, vec![1, 2]);
    }

    #[tokio::test]
    async fn sessions_created_by_and_stats_follow_the_signed_in_admin() {
        let (admin, _) = admin_as("admin@example.com", "admin").await;
        assert_eq!(
            admin.stats().await.unwrap(),
            AdminStats { total_sessions: 3, active_sessions: 1, total_users: 5 }
        );

        admin.create_session(&draft()).await.unwrap();
        let created: Vec<SessionId> = admin
            .sessions_created_by("1")
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(created, vec![1, 2, 3, 4]);
        assert!(admin.sessions_created_by("2").await.unwrap().is_empty());

        let stats = admin.stats().await.unwrap();
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.active_sessions, 2);
    }

    #[tokio::test]
    async fn search_matches_name_or_email_ignoring_case() {
        let (admin, _) = admin_as("admin@example.com", "admin").await;
        let ids = |users: Vec<User>| users.into_iter().map(|u| u.id).collect::<Vec<_>>();

        assert_eq!(ids(admin.search_users("  ").await.unwrap()).len(), 5);
        assert_eq!(ids(admin.search_users("CARLA").await.unwrap()), vec!["3"]);
        assert_eq!(ids(admin.search_users("davi@").await.unwrap()), vec!["4"]);
        // "a" is in every name or address
        assert_eq!(ids(admin.search_users("a").await.unwrap()).len(), 5);
        assert!(admin.search_users("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_user_returns_remaining_users() {
        let (admin, _) = admin_as("admin@example.com", "admin").await;
        let remaining = admin.delete_user("4").await.unwrap();
        assert_eq!(remaining.len(), 4);
        assert!(remaining.iter().all(|u| u.id != "4"));
        assert_eq!(admin.delete_user("4").await, Err(VoteError::Remote("user 4 not found".into())));
        assert!(matches!(admin.delete_user(" ").await, Err(VoteError::Validation(_))));
    }

    #[tokio::test]
    async fn user_management_is_admin_only() {
        let (as_user, backend) = admin_as("user@example.com", "password").await;
        assert!(matches!(as_user.users().await, Err(VoteError::Forbidden(_))));
        assert!(matches!(as_user.search_users("a").await, Err(VoteError::Forbidden(_))));
        assert!(matches!(as_user.delete_user("3").await, Err(VoteError::Forbidden(_))));
        assert!(matches!(as_user.stats().await, Err(VoteError::Forbidden(_))));
        assert!(matches!(as_user.sessions_created_by("1").await, Err(VoteError::Forbidden(_))));
        assert_eq!(backend.list_users().await.unwrap().len(), 5);
    }
}
