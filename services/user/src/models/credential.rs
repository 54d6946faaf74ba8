//! Credential model paired 1:1 with a user

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Credential entity, one row per user in `user_credentials`
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct Credential {
    pub user_id: Uuid,
    pub password_hash: String,
    /// `None` until the principal authenticates for the first time
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Credential {
    /// Fresh credential for a newly created user
    pub fn new(user_id: Uuid, password_hash: String) -> Self {
        Self {
            user_id,
            password_hash,
            last_login: None,
            is_active: true,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("password_hash", &"<redacted>")
            .field("last_login", &self.last_login)
            .field("is_active", &self.is_active)
            .finish()
    }
}
