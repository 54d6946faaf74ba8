//! In-process user store
//!
//! Mirrors the PostgreSQL schema rules that matter to callers: unique
//! usernames and emails, a non-empty password hash, and the user/credential
//! pairing. All mutations happen under one write lock, so compound
//! operations are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserStore;
use crate::error::{UserError, UserResult};
use crate::models::{Credential, NewUser, UpdateUser, User};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    credentials: HashMap<Uuid, Credential>,
    last_tick: Option<DateTime<Utc>>,
}

impl State {
    /// Current time, strictly after any timestamp handed out before
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn check_unique(&self, new_user: &NewUser) -> UserResult<()> {
        if self.users.values().any(|u| u.username == new_user.username) {
            return Err(UserError::ConstraintViolation("users_username_key".to_string()));
        }
        if self.users.values().any(|u| u.email == new_user.email) {
            return Err(UserError::ConstraintViolation("users_email_key".to_string()));
        }
        Ok(())
    }

    fn check_credential(&self, credential: &Credential) -> UserResult<()> {
        if credential.password_hash.is_empty() {
            return Err(UserError::Store(
                "violates check constraint user_credentials_password_hash_check".to_string(),
            ));
        }
        if !self.users.contains_key(&credential.user_id) {
            return Err(UserError::Store(
                "violates foreign key constraint user_credentials_user_id_fkey".to_string(),
            ));
        }
        if self.credentials.contains_key(&credential.user_id) {
            return Err(UserError::ConstraintViolation(
                "user_credentials_pkey".to_string(),
            ));
        }
        Ok(())
    }

    fn insert_user(&mut self, new_user: &NewUser) -> UserResult<User> {
        self.check_unique(new_user)?;

        let now = self.tick();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            full_name: new_user.full_name.clone(),
            profile_picture_url: new_user.profile_picture_url.clone(),
            bio: new_user.bio.clone(),
            website: None,
            location: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_credential(&mut self, credential: &Credential) -> UserResult<()> {
        self.check_credential(credential)?;
        self.credentials
            .insert(credential.user_id, credential.clone());
        Ok(())
    }
}

/// Users in `(created_at, id)` order
fn ordered<'a>(users: impl Iterator<Item = &'a User>) -> Vec<User> {
    let mut users: Vec<User> = users.cloned().collect();
    users.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    users
}

fn page(users: Vec<User>, limit: i64, offset: i64) -> Vec<User> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    users.into_iter().skip(offset).take(limit).collect()
}

/// User store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    state: RwLock<State>,
}

impl InMemoryUserStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of credential rows, for pairing checks in tests
    pub async fn credential_count(&self) -> usize {
        self.state.read().await.credentials.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert_user(&self, new_user: &NewUser) -> UserResult<User> {
        self.state.write().await.insert_user(new_user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users_by_username(
        &self,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<User>> {
        let needle = pattern.to_lowercase();
        let state = self.state.read().await;
        let matches = ordered(
            state
                .users
                .values()
                .filter(|u| u.username.to_lowercase().contains(&needle)),
        );
        Ok(page(matches, limit, offset))
    }

    async fn list_users(&self, limit: i64, offset: i64) -> UserResult<Vec<User>> {
        let state = self.state.read().await;
        let users = ordered(state.users.values());
        Ok(page(users, limit, offset))
    }

    async fn update_user(&self, update: &UpdateUser) -> UserResult<Option<User>> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&update.id) {
            return Ok(None);
        }

        let now = state.tick();
        let Some(user) = state.users.get_mut(&update.id) else {
            return Ok(None);
        };
        user.full_name = update.full_name.clone();
        user.profile_picture_url = update.profile_picture_url.clone();
        user.bio = update.bio.clone();
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> UserResult<bool> {
        let mut state = self.state.write().await;
        state.credentials.remove(&id);
        Ok(state.users.remove(&id).is_some())
    }

    async fn insert_credential(&self, credential: &Credential) -> UserResult<()> {
        self.state.write().await.insert_credential(credential)
    }

    async fn get_credential(&self, user_id: Uuid) -> UserResult<Option<Credential>> {
        Ok(self.state.read().await.credentials.get(&user_id).cloned())
    }

    async fn update_credential(&self, credential: &Credential) -> UserResult<bool> {
        let mut state = self.state.write().await;
        match state.credentials.get_mut(&credential.user_id) {
            Some(existing) => {
                *existing = credential.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> UserResult<bool> {
        let mut state = self.state.write().await;
        match state.credentials.get_mut(&user_id) {
            Some(credential) => {
                credential.last_login = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_user_with_credential(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> UserResult<User> {
        let mut state = self.state.write().await;

        let user = state.insert_user(new_user)?;
        let credential = Credential::new(user.id, password_hash.to_string());
        if let Err(err) = state.insert_credential(&credential) {
            state.users.remove(&user.id);
            return Err(err);
        }

        Ok(user)
    }
}
