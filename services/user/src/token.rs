//! Login token seam
//!
//! Session issuance is not implemented by this service. The endpoint asks a
//! [`TokenIssuer`] for the token it returns from `Login`, so a real issuer can
//! be plugged in without touching the RPC surface.

use crate::error::UserResult;
use crate::models::User;

/// Token returned by [`PlaceholderTokenIssuer`]
pub const PLACEHOLDER_TOKEN: &str = "dummy-token";

/// Produces the token handed back to a successfully authenticated principal
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user: &User) -> UserResult<String>;
}

/// Issuer returning a fixed, meaningless token
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTokenIssuer;

impl TokenIssuer for PlaceholderTokenIssuer {
    fn issue(&self, _user: &User) -> UserResult<String> {
        Ok(PLACEHOLDER_TOKEN.to_string())
    }
}
