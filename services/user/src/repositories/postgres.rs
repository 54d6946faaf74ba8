//! PostgreSQL-backed user store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{UserStore, escape_like};
use crate::error::{UserError, UserResult};
use crate::models::{Credential, NewUser, UpdateUser, User};

macro_rules! user_columns {
    () => {
        "id, username, email, full_name, profile_picture_url, bio, website, location, created_at, updated_at"
    };
}

/// User store over a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        info!("Running user schema migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }
}

async fn insert_user_with<'e, E: PgExecutor<'e>>(executor: E, new_user: &NewUser) -> UserResult<User> {
    let user = sqlx::query_as::<_, User>(concat!(
        "INSERT INTO users (username, email, full_name, profile_picture_url, bio, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, now(), now()) \
         RETURNING ",
        user_columns!()
    ))
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.full_name)
    .bind(&new_user.profile_picture_url)
    .bind(&new_user.bio)
    .fetch_one(executor)
    .await?;

    Ok(user)
}

async fn insert_credential_with<'e, E: PgExecutor<'e>>(
    executor: E,
    credential: &Credential,
) -> UserResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_credentials (user_id, password_hash, last_login, is_active)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(credential.user_id)
    .bind(&credential.password_hash)
    .bind(credential.last_login)
    .bind(credential.is_active)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_user(&self, new_user: &NewUser) -> UserResult<User> {
        insert_user_with(&self.pool, new_user).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_users_by_username(
        &self,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            r" FROM users WHERE username ILIKE $1 ESCAPE '\' ORDER BY created_at, id LIMIT $2 OFFSET $3"
        ))
        .bind(format!("%{}%", escape_like(pattern)))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> UserResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update_user(&self, update: &UpdateUser) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "UPDATE users SET full_name = $1, profile_picture_url = $2, bio = $3, updated_at = now() \
             WHERE id = $4 RETURNING ",
            user_columns!()
        ))
        .bind(&update.full_name)
        .bind(&update.profile_picture_url)
        .bind(&update.bio)
        .bind(update.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> UserResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_credentials WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        debug!(user_id = %id, deleted, "delete_user");
        Ok(deleted)
    }

    async fn insert_credential(&self, credential: &Credential) -> UserResult<()> {
        insert_credential_with(&self.pool, credential).await
    }

    async fn get_credential(&self, user_id: Uuid) -> UserResult<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT user_id, password_hash, last_login, is_active
            FROM user_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn update_credential(&self, credential: &Credential) -> UserResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_credentials
            SET password_hash = $1, last_login = $2, is_active = $3
            WHERE user_id = $4
            "#,
        )
        .bind(&credential.password_hash)
        .bind(credential.last_login)
        .bind(credential.is_active)
        .bind(credential.user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> UserResult<bool> {
        let result = sqlx::query("UPDATE user_credentials SET last_login = $1 WHERE user_id = $2")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_user_with_credential(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> UserResult<User> {
        // Dropping `tx` on an early return rolls both inserts back.
        let mut tx = self.pool.begin().await?;

        let user = insert_user_with(&mut *tx, new_user).await?;
        let credential = Credential::new(user.id, password_hash.to_string());
        insert_credential_with(&mut *tx, &credential).await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn health_check(&self) -> UserResult<bool> {
        common::database::health_check(&self.pool)
            .await
            .map_err(|e| UserError::Store(e.to_string()))
    }
}
