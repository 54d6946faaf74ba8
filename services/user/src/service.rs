//! User business logic
//!
//! [`UserService`] composes the [`PasswordHasher`] and a [`UserStore`]. It owns
//! the rules around the user/credential pairing, authentication and paging;
//! it keeps no mutable state of its own and is safe to share across tasks.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{CreateUserInput, Credential, LoginCredentials, NewUser, UpdateUser, User};
use crate::password::PasswordHasher;
use crate::repositories::UserStore;
use crate::validation::{validate_email, validate_page, validate_password, validate_username};

/// Largest page handed out by list and search operations
pub const MAX_PAGE_SIZE: i64 = 100;

/// User service independent of transport
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Whether the backing store answers
    pub async fn health_check(&self) -> UserResult<bool> {
        self.store.health_check().await
    }

    /// Hash off the async runtime; Argon2 is deliberately slow.
    async fn hash_password(&self, password: &str) -> UserResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| UserError::Hashing(format!("hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .unwrap_or(false)
    }

    /// Create a user and its credential in one unit of work.
    ///
    /// The password is hashed before the store is touched, so no transaction
    /// is held open while Argon2 runs.
    #[instrument(skip(self, input), fields(username = %input.username, email = %input.email))]
    pub async fn create_user(&self, input: CreateUserInput) -> UserResult<User> {
        let new_user = NewUser::from(&input);
        validate_username(&new_user.username).map_err(UserError::Validation)?;
        validate_email(&new_user.email).map_err(UserError::Validation)?;
        validate_password(&input.password).map_err(UserError::Validation)?;

        let password_hash = self.hash_password(&input.password).await?;
        let user = self
            .store
            .create_user_with_credential(&new_user, &password_hash)
            .await?;

        info!(user_id = %user.id, "user_created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_id(&self, id: Uuid) -> UserResult<User> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or(UserError::NotFound)
    }

    /// Replace the mutable profile fields of a user
    #[instrument(skip(self, update), fields(user_id = %update.id))]
    pub async fn update_user(&self, update: UpdateUser) -> UserResult<User> {
        let user = self
            .store
            .update_user(&update)
            .await?
            .ok_or(UserError::NotFound)?;

        info!(user_id = %user.id, "user_updated");
        Ok(user)
    }

    /// Delete a user and its credential; `false` if there was no such user
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> UserResult<bool> {
        let deleted = self.store.delete_user(id).await?;
        if deleted {
            info!(user_id = %id, "user_deleted");
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, limit: i64, offset: i64) -> UserResult<Vec<User>> {
        validate_page(limit, offset).map_err(UserError::Validation)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.store
            .list_users(limit.min(MAX_PAGE_SIZE), offset)
            .await
    }

    #[instrument(skip(self))]
    pub async fn search_by_email(&self, email: &str) -> UserResult<User> {
        self.store
            .find_user_by_email(email.trim())
            .await?
            .ok_or(UserError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn search_by_username(
        &self,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<User>> {
        validate_page(limit, offset).map_err(UserError::Validation)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.store
            .find_users_by_username(pattern.trim(), limit.min(MAX_PAGE_SIZE), offset)
            .await
    }

    /// Replace a user's password.
    ///
    /// Also stamps `last_login` and reactivates the credential. Returns
    /// `false` if the user has no credential.
    #[instrument(skip(self, new_password))]
    pub async fn change_password(&self, id: Uuid, new_password: &str) -> UserResult<bool> {
        validate_password(new_password).map_err(UserError::Validation)?;

        let password_hash = self.hash_password(new_password).await?;
        let credential = Credential {
            user_id: id,
            password_hash,
            last_login: Some(Utc::now()),
            is_active: true,
        };

        let changed = self.store.update_credential(&credential).await?;
        if changed {
            info!(user_id = %id, "password_changed");
        }
        Ok(changed)
    }

    /// Look up the principal and check the password, without writing anything
    async fn check_credentials(&self, credentials: &LoginCredentials) -> UserResult<User> {
        let user = self
            .store
            .find_user_by_email(credentials.email.trim())
            .await?
            .ok_or(UserError::NotFound)?;

        let credential = self
            .store
            .get_credential(user.id)
            .await?
            .ok_or(UserError::NotFound)?;

        if !credential.is_active {
            warn!(user_id = %user.id, "authentication attempt on inactive account");
            return Err(UserError::Unauthorized);
        }

        if !self
            .verify_password(&credentials.password, &credential.password_hash)
            .await
        {
            debug!(user_id = %user.id, "password mismatch");
            return Err(UserError::Unauthorized);
        }

        Ok(user)
    }

    /// Authenticate a principal by email and password.
    ///
    /// Fails with `NotFound` for an unknown email and `Unauthorized` for a
    /// wrong password or a deactivated account. On success the credential's
    /// `last_login` is refreshed.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: LoginCredentials) -> UserResult<User> {
        let user = self.check_credentials(&credentials).await?;
        self.store.record_login(user.id, Utc::now()).await?;

        info!(user_id = %user.id, "user_logged_in");
        Ok(user)
    }

    /// Check an email/password pair without failing and without side effects
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn validate(&self, credentials: LoginCredentials) -> bool {
        match self.check_credentials(&credentials).await {
            Ok(_) => true,
            Err(UserError::NotFound | UserError::Unauthorized) => false,
            Err(err) => {
                warn!(error = %err, "credential validation failed");
                false
            }
        }
    }

    /// Disable authentication for a user without deleting the account
    #[instrument(skip(self))]
    pub async fn deactivate_user(&self, id: Uuid) -> UserResult<bool> {
        let Some(mut credential) = self.store.get_credential(id).await? else {
            return Ok(false);
        };

        credential.is_active = false;
        let deactivated = self.store.update_credential(&credential).await?;
        if deactivated {
            info!(user_id = %id, "user_deactivated");
        }
        Ok(deactivated)
    }
}
