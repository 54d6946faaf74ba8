//! RPC endpoint for the user service
//!
//! Translates wire messages to service calls and back. This is the only place
//! where [`UserError`] kinds become transport status codes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::error::UserError;
use crate::models::{CreateUserInput, LoginCredentials, UpdateUser, User};
use crate::service::UserService;
use crate::token::TokenIssuer;

/// Wire representation of a user; never carries credential data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
    pub website: String,
    pub location: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserMessage {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            profile_picture_url: user.profile_picture_url,
            bio: user.bio,
            website: user.website.unwrap_or_default(),
            location: user.location.unwrap_or_default(),
            created_at: user.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            updated_at: user.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdRequest {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub id: String,
    pub full_name: String,
    pub profile_picture_url: String,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListUsersRequest {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchByEmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchByUsernameRequest {
    pub username: String,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserMessage,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub id: String,
    pub new_password: String,
}

/// Transport-level failure: a status plus a diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointError {
    pub status: StatusCode,
    pub message: String,
}

impl EndpointError {
    fn invalid_id(raw: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid user id: {:?}", raw),
        }
    }
}

impl From<UserError> for EndpointError {
    fn from(err: UserError) -> Self {
        let status = match &err {
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::Validation(_) => StatusCode::BAD_REQUEST,
            UserError::Unauthorized => StatusCode::UNAUTHORIZED,
            UserError::ConstraintViolation(_)
            | UserError::Hashing(_)
            | UserError::Store(_)
            | UserError::Canceled => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %err, "user service call failed");
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Undecodable request bodies are malformed input, whatever axum's own status
impl From<JsonRejection> for EndpointError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("malformed request: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message,
            "code": self.status.as_u16(),
        }));

        (self.status, body).into_response()
    }
}

pub type EndpointResult<T> = Result<T, EndpointError>;

fn parse_id(raw: &str) -> EndpointResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| EndpointError::invalid_id(raw))
}

/// RPC handler over a [`UserService`]
#[derive(Clone)]
pub struct UserServiceEndpoint {
    service: Arc<UserService>,
    tokens: Arc<dyn TokenIssuer>,
    deadline: Option<Duration>,
}

impl UserServiceEndpoint {
    pub fn new(service: Arc<UserService>, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self {
            service,
            tokens,
            deadline: None,
        }
    }

    /// Abort calls that run longer than `deadline`, reporting them as canceled
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn service(&self) -> &UserService {
        &self.service
    }

    /// Run a service call under the configured deadline.
    ///
    /// On expiry the call's future is dropped, which abandons in-flight store
    /// queries and rolls back any open transaction.
    async fn run<T, F>(&self, call: F) -> EndpointResult<T>
    where
        F: Future<Output = Result<T, UserError>>,
    {
        let result = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .unwrap_or(Err(UserError::Canceled)),
            None => call.await,
        };
        result.map_err(EndpointError::from)
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> EndpointResult<UserResponse> {
        let input = CreateUserInput {
            username: req.username,
            email: req.email,
            full_name: req.full_name,
            profile_picture_url: req.profile_picture_url,
            bio: req.bio,
            password: req.password,
        };
        let user = self.run(self.service.create_user(input)).await?;
        Ok(UserResponse { user: user.into() })
    }

    pub async fn get_user(&self, req: IdRequest) -> EndpointResult<UserResponse> {
        let id = parse_id(&req.id)?;
        let user = self.run(self.service.get_user_by_id(id)).await?;
        Ok(UserResponse { user: user.into() })
    }

    pub async fn update_user(&self, req: UpdateUserRequest) -> EndpointResult<UserResponse> {
        let update = UpdateUser {
            id: parse_id(&req.id)?,
            full_name: req.full_name,
            profile_picture_url: req.profile_picture_url,
            bio: req.bio,
        };
        let user = self.run(self.service.update_user(update)).await?;
        Ok(UserResponse { user: user.into() })
    }

    pub async fn delete_user(&self, req: IdRequest) -> EndpointResult<SuccessResponse> {
        let id = parse_id(&req.id)?;
        let success = self.run(self.service.delete_user(id)).await?;
        Ok(SuccessResponse { success })
    }

    pub async fn list_users(&self, req: ListUsersRequest) -> EndpointResult<UsersResponse> {
        let users = self
            .run(self.service.list_users(req.limit, req.offset))
            .await?;
        Ok(UsersResponse {
            users: users.into_iter().map(UserMessage::from).collect(),
        })
    }

    pub async fn search_by_email(&self, req: SearchByEmailRequest) -> EndpointResult<UserResponse> {
        let user = self.run(self.service.search_by_email(&req.email)).await?;
        Ok(UserResponse { user: user.into() })
    }

    pub async fn search_by_username(
        &self,
        req: SearchByUsernameRequest,
    ) -> EndpointResult<UsersResponse> {
        let users = self
            .run(
                self.service
                    .search_by_username(&req.username, req.limit, req.offset),
            )
            .await?;
        Ok(UsersResponse {
            users: users.into_iter().map(UserMessage::from).collect(),
        })
    }

    pub async fn login(&self, req: CredentialsRequest) -> EndpointResult<LoginResponse> {
        let credentials = LoginCredentials {
            email: req.email,
            password: req.password,
        };
        let user = self.run(self.service.login(credentials)).await?;
        let token = self.tokens.issue(&user)?;
        Ok(LoginResponse {
            user: user.into(),
            token,
        })
    }

    pub async fn validate(&self, req: CredentialsRequest) -> EndpointResult<ValidateResponse> {
        let credentials = LoginCredentials {
            email: req.email,
            password: req.password,
        };
        let valid = self
            .run(async { Ok(self.service.validate(credentials).await) })
            .await?;
        Ok(ValidateResponse { valid })
    }

    pub async fn change_password(
        &self,
        req: ChangePasswordRequest,
    ) -> EndpointResult<SuccessResponse> {
        let id = parse_id(&req.id)?;
        let success = self
            .run(self.service.change_password(id, &req.new_password))
            .await?;
        Ok(SuccessResponse { success })
    }

    pub async fn deactivate_user(&self, req: IdRequest) -> EndpointResult<SuccessResponse> {
        let id = parse_id(&req.id)?;
        let success = self.run(self.service.deactivate_user(id)).await?;
        Ok(SuccessResponse { success })
    }
}
