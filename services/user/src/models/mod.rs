//! User service models

pub mod credential;
pub mod user;

// Re-export for convenience
pub use credential::Credential;
pub use user::{CreateUserInput, LoginCredentials, NewUser, UpdateUser, User};
