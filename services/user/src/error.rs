//! Failure taxonomy for the user service
//!
//! Every layer below the endpoint reports failures through [`UserError`];
//! the endpoint is the only place that turns a kind into a transport status.

use thiserror::Error;

/// Closed set of failure kinds surfaced by the store and the service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    /// Malformed input, e.g. an empty required field
    #[error("validation failed: {0}")]
    Validation(String),

    /// No matching user or credential
    #[error("user not found")]
    NotFound,

    /// Uniqueness conflict on username or email
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Credential mismatch or inactive account
    #[error("invalid credentials")]
    Unauthorized,

    /// The password hash could not be computed
    #[error("hashing error: {0}")]
    Hashing(String),

    /// Any other persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// The caller gave up before the operation completed
    #[error("operation canceled")]
    Canceled,
}

impl UserError {
    pub fn validation(message: impl Into<String>) -> Self {
        UserError::Validation(message.into())
    }
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let constraint = db_err.constraint().unwrap_or("unique").to_string();
                UserError::ConstraintViolation(constraint)
            }
            sqlx::Error::RowNotFound => UserError::NotFound,
            _ => UserError::Store(err.to_string()),
        }
    }
}

/// Type alias for results produced by the user service
pub type UserResult<T> = Result<T, UserError>;
