//! User identity and credential service
//!
//! Owns the `User`/`Credential` pair, authenticates principals and exposes
//! the operations over an RPC-style HTTP surface. Construction is explicit:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use user::{
//!     endpoint::UserServiceEndpoint, password::PasswordHasher,
//!     repositories::InMemoryUserStore, routes::create_router, service::UserService,
//!     token::PlaceholderTokenIssuer,
//! };
//!
//! let service = UserService::new(Arc::new(InMemoryUserStore::new()), PasswordHasher::default());
//! let endpoint = UserServiceEndpoint::new(Arc::new(service), Arc::new(PlaceholderTokenIssuer));
//! let app = create_router(endpoint);
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod token;
pub mod validation;
