//! Persistence for users and their credentials
//!
//! [`UserStore`] is the seam between the service and the backing store.
//! [`PgUserStore`] runs against PostgreSQL; [`InMemoryUserStore`] keeps the
//! same contract in process memory and backs the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::UserResult;
use crate::models::{Credential, NewUser, UpdateUser, User};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

/// Store operations over the `users` and `user_credentials` tables
///
/// Lookups return `Ok(None)` when nothing matches; only genuine store
/// failures come back as errors. Paged queries are ordered by
/// `(created_at, id)` so consecutive pages never overlap.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user row, returning it with generated id and timestamps
    async fn insert_user(&self, new_user: &NewUser) -> UserResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> UserResult<Option<User>>;

    /// Case-insensitive substring match on the username
    async fn find_users_by_username(
        &self,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<User>>;

    async fn list_users(&self, limit: i64, offset: i64) -> UserResult<Vec<User>>;

    /// Update the mutable profile fields and refresh `updated_at`
    async fn update_user(&self, update: &UpdateUser) -> UserResult<Option<User>>;

    /// Delete a user together with its credential; `false` if no user row existed
    async fn delete_user(&self, id: Uuid) -> UserResult<bool>;

    async fn insert_credential(&self, credential: &Credential) -> UserResult<()>;

    async fn get_credential(&self, user_id: Uuid) -> UserResult<Option<Credential>>;

    /// Replace hash, last login and active flag; `false` if no row matched
    async fn update_credential(&self, credential: &Credential) -> UserResult<bool>;

    /// Stamp `last_login` without touching the hash or the active flag
    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> UserResult<bool>;

    /// Insert a user and its credential as one unit of work
    ///
    /// Either both rows exist afterwards or neither does.
    async fn create_user_with_credential(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> UserResult<User>;

    /// Whether the backing store is reachable
    async fn health_check(&self) -> UserResult<bool> {
        Ok(true)
    }
}

/// Escape `LIKE` metacharacters so a search pattern matches literally
pub(crate) fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
