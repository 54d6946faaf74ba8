//! User model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
    pub website: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User creation request as received by the service
#[derive(Clone, Default)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
    pub password: String,
}

impl fmt::Debug for CreateUserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserInput")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("profile_picture_url", &self.profile_picture_url)
            .field("bio", &self.bio)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Row payload for inserting a user; carries no secret material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
}

impl From<&CreateUserInput> for NewUser {
    fn from(input: &CreateUserInput) -> Self {
        Self {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            full_name: input.full_name.clone(),
            profile_picture_url: input.profile_picture_url.clone(),
            bio: input.bio.clone(),
        }
    }
}

/// User update payload; only these fields are mutable after creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUser {
    pub id: Uuid,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
}

/// User login credentials
#[derive(Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
