//! Core library for cinedex.
//!
//! - `auth`: the session store (login, registration, logout, restore at
//!   startup) and credential persistence
//! - `api`: the authorized request gateway with transparent token renewal,
//!   the HTTP transport and typed resource calls
//! - `models`: wire types shared by every front-end
//! - `config`: on-disk configuration and session wiring

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ErrorPayload, Gateway};
pub use auth::{AuthError, Session, SessionState, SessionStatus, SignOutReason};
pub use config::Config;
