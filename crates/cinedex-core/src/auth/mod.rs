//! Session store and credential persistence.
//!
//! `Session` owns the login state. Tokens are persisted through a
//! `TokenStore`: a JSON file in the user's data directory, the OS keychain,
//! or memory for tests.

mod keyring_store;
pub mod session;
mod tokens;

pub use keyring_store::KeyringTokenStore;
pub use session::{
    AuthError, RenewalError, Session, SessionOptions, SessionState, SessionStatus, SignOutReason,
    DEFAULT_RENEWAL_TIMEOUT_SECS,
};
pub use tokens::{CredentialPair, FileTokenStore, MemoryTokenStore, TokenKey, TokenStore};
