//! The session store: who is logged in, and with which credentials.
//!
//! One `Session` exists per running client. It is created explicitly,
//! handed to every collaborator (it is cheap to clone), brought up with
//! `initialize()` and ended with `logout()`. The persisted credential pair
//! is written only here: by login, logout and token renewal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::tokens::{CredentialPair, TokenKey, TokenStore};
use crate::api::{ApiError, ApiRequest, ApiResponse, Endpoints, ErrorPayload, Gateway, Transport};
use crate::models::{Registration, UserProfile};

/// Upper bound on a token renewal call, in seconds.
/// Every request waiting on a renewal is stuck for at most this long.
pub const DEFAULT_RENEWAL_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Anonymous,
    AuthenticatingProfile,
    Authenticated,
}

/// Why the last session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    UserRequested,
    /// Stored credentials could not fetch a profile at startup
    ProfileUnavailable,
    /// An authorization failure with no refresh token to renew with
    MissingRefreshToken,
    /// The backend refused (or never answered) a token renewal
    RenewalFailed,
}

impl SignOutReason {
    /// True if the user did not ask for this and should be sent to log in again
    pub fn is_forced(&self) -> bool {
        !matches!(self, SignOutReason::UserRequested)
    }
}

/// Observable session state. Credentials themselves live in the token store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub current_user: Option<UserProfile>,
    /// True only while `initialize()` is fetching the stored user's profile
    pub loading: bool,
    /// User-visible message from the last failed login or registration
    pub error: Option<String>,
    pub signed_out: Option<SignOutReason>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Username and password required")]
    MissingCredentials,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to persist credentials: {0}")]
    Storage(String),
}

impl AuthError {
    /// The backend's error body (message or per-field errors), if any
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            AuthError::Api(e) => e.payload(),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum RenewalError {
    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("Token renewal rejected: {0}")]
    Rejected(ApiError),

    #[error("Token renewal timed out")]
    TimedOut,

    #[error("Failed to access stored tokens: {0}")]
    Storage(String),

    #[error("Session ended while the token was being renewed")]
    SessionEnded,
}

impl RenewalError {
    fn sign_out_reason(&self) -> SignOutReason {
        match self {
            RenewalError::MissingRefreshToken => SignOutReason::MissingRefreshToken,
            _ => SignOutReason::RenewalFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub endpoints: Endpoints,
    pub renewal_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            renewal_timeout: Duration::from_secs(DEFAULT_RENEWAL_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken", alias = "access")]
    access_token: String,
    #[serde(alias = "refreshToken", alias = "refresh")]
    refresh_token: String,
}

#[derive(Serialize)]
struct RenewalRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenewalResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    access: String,
    // present when the backend rotates refresh tokens
    #[serde(default, alias = "refreshToken", alias = "refresh_token")]
    refresh: Option<String>,
}

type RenewalFuture = Shared<BoxFuture<'static, Result<String, RenewalError>>>;

struct InflightRenewal {
    id: u64,
    future: RenewalFuture,
}

struct SessionInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    renewal: Mutex<Option<InflightRenewal>>,
    next_renewal_id: AtomicU64,
    // bumped whenever the stored pair is replaced by a login or cleared
    generation: Mutex<u64>,
}

/// Handle to the client's session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        options: SessionOptions,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(SessionInner {
                transport,
                store,
                options,
                state,
                renewal: Mutex::new(None),
                next_renewal_id: AtomicU64::new(0),
                generation: Mutex::new(0),
            }),
        }
    }

    /// Authorized request wrapper bound to this session
    pub fn gateway(&self) -> Gateway {
        Gateway::new(self.clone())
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.borrow().current_user.clone()
    }

    /// The persisted access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.inner.access_token()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Restore a persisted session at startup.
    ///
    /// With a stored pair the user's profile is fetched; if that fails for
    /// any reason the stored credentials are discarded so the client never
    /// runs half-authenticated. A partial pair counts as no pair.
    pub async fn initialize(&self) -> SessionStatus {
        let pair = match self.inner.store.credential_pair() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                None
            }
        };

        if pair.is_none() {
            if self.inner.store.has_any().unwrap_or(true) {
                debug!("Discarding incomplete stored credentials");
                if let Err(e) = self.inner.store.clear() {
                    warn!(error = %e, "Failed to clear stored credentials");
                }
            }
            self.inner.update(|s| {
                s.status = SessionStatus::Anonymous;
                s.current_user = None;
                s.loading = false;
            });
            return SessionStatus::Anonymous;
        }

        info!("Restoring stored session");
        let generation = self.inner.generation();
        self.inner.update(|s| {
            s.status = SessionStatus::AuthenticatingProfile;
            s.loading = true;
            s.signed_out = None;
        });

        match self.fetch_profile().await {
            Ok(user) => {
                let username = user.username.clone();
                let restored = self.inner.update_if_current(generation, |s| {
                    s.status = SessionStatus::Authenticated;
                    s.current_user = Some(user);
                });
                if restored {
                    info!(username = %username, "Session restored");
                }
            }
            Err(e) => {
                warn!(error = %e, "Stored session is not usable, signing out");
                self.inner
                    .end_session_if_current(generation, SignOutReason::ProfileUnavailable);
            }
        }

        self.inner.update(|s| s.loading = false);
        self.inner.state.borrow().status
    }

    /// Log in and persist the returned credential pair.
    ///
    /// The pair is persisted before the profile is fetched. A failed profile
    /// fetch does not undo the login: the session is authenticated without a
    /// profile and `refresh_profile()` can retry. Nothing is persisted when
    /// the login call itself fails.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            self.inner
                .update(|s| s.error = Some(AuthError::MissingCredentials.to_string()));
            return Err(AuthError::MissingCredentials);
        }

        self.inner.update(|s| s.error = None);

        let pair = match self.request_tokens(username, password).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(username, error = %e, "Login failed");
                let message = e
                    .payload()
                    .and_then(ErrorPayload::detail)
                    .unwrap_or("Login failed")
                    .to_string();
                self.inner.update(|s| s.error = Some(message));
                return Err(e);
            }
        };

        let generation = match self.inner.replace_pair(&pair) {
            Ok(generation) => generation,
            Err(e) => {
                warn!(error = %e, "Failed to persist credentials");
                self.inner.update(|s| s.error = Some("Login failed".to_string()));
                return Err(AuthError::Storage(e.to_string()));
            }
        };

        info!(username, "Logged in");
        self.inner.update(|s| {
            s.status = SessionStatus::AuthenticatingProfile;
            s.current_user = None;
            s.signed_out = None;
        });

        match self.fetch_profile().await {
            Ok(user) => {
                self.inner.update_if_current(generation, |s| {
                    s.status = SessionStatus::Authenticated;
                    s.current_user = Some(user);
                });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logged in but failed to fetch profile");
                let still_signed_in = self.inner.update_if_current(generation, |s| {
                    s.status = SessionStatus::Authenticated;
                });
                // the fetch can only sign us out by failing a token renewal
                if still_signed_in {
                    Ok(())
                } else {
                    Err(AuthError::Api(e))
                }
            }
        }
    }

    async fn request_tokens(&self, username: &str, password: &str) -> Result<CredentialPair, AuthError> {
        let request = ApiRequest::post(self.inner.options.endpoints.login.as_str())
            .json(&LoginRequest { username, password })?;

        // no bearer, no renewal: a rejected password is not an expired token
        let response = self.inner.transport.send(&request).await?.into_result()?;
        let tokens: LoginResponse = response.json()?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ApiError::InvalidResponse("Login response is missing tokens".to_string()).into());
        }
        Ok(CredentialPair::new(tokens.access_token, tokens.refresh_token))
    }

    /// Create an account. Does not log in.
    ///
    /// Validation failures come back as `AuthError::Api(ApiError::BadRequest(..))`
    /// with the backend's payload untouched.
    pub async fn register(&self, registration: &Registration) -> Result<(), AuthError> {
        self.inner.update(|s| s.error = None);

        let result = async {
            let request = ApiRequest::post(self.inner.options.endpoints.register.as_str())
                .json(registration)?;
            self.inner.transport.send(&request).await?.into_result()?;
            Ok::<(), ApiError>(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(username = %registration.username, "Registered new account");
                Ok(())
            }
            Err(e) => {
                warn!(username = %registration.username, error = %e, "Registration failed");
                let message = e
                    .payload()
                    .filter(|p| !p.is_empty())
                    .map(ErrorPayload::to_string)
                    .unwrap_or_else(|| "Registration failed".to_string());
                self.inner.update(|s| s.error = Some(message));
                Err(AuthError::Api(e))
            }
        }
    }

    /// Forget the stored credentials and the current user. Safe to call
    /// when nobody is logged in.
    pub fn logout(&self) {
        self.inner.end_session(SignOutReason::UserRequested);
    }

    /// Fetch the current user again, e.g. after a login whose profile fetch failed
    pub async fn refresh_profile(&self) -> Result<UserProfile, ApiError> {
        let user = self.fetch_profile().await?;
        let has_pair = matches!(self.inner.store.credential_pair(), Ok(Some(_)));
        if has_pair {
            let profile = user.clone();
            self.inner.update(|s| {
                s.status = SessionStatus::Authenticated;
                s.current_user = Some(profile);
            });
        }
        Ok(user)
    }

    async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let request = ApiRequest::get(self.inner.options.endpoints.current_user.as_str());
        self.gateway().execute_json(request).await
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Concurrent callers share one renewal call. `stale` is the access token
    /// the rejected request carried: if the store already holds a different
    /// one, a renewal finished in the meantime and its token is returned
    /// without calling the backend. On failure the session is ended before
    /// the error is returned.
    pub(crate) async fn renew(&self, stale: Option<&str>) -> Result<String, RenewalError> {
        let (id, future) = {
            let mut slot = self.inner.renewal.lock().unwrap_or_else(|p| p.into_inner());
            match slot.as_ref() {
                Some(inflight) => {
                    debug!("Joining in-flight token renewal");
                    (inflight.id, inflight.future.clone())
                }
                None => {
                    if let (Some(stale), Some(current)) = (stale, self.inner.access_token()) {
                        if stale != current {
                            debug!("Access token was already renewed");
                            return Ok(current);
                        }
                    }
                    let id = self.inner.next_renewal_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.inner.clone().renewal().boxed().shared();
                    *slot = Some(InflightRenewal {
                        id,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let result = future.await;

        let mut slot = self.inner.renewal.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().map(|r| r.id) == Some(id) {
            *slot = None;
        }
        result
    }
}

impl SessionInner {
    fn update(&self, modify: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(modify);
    }

    fn access_token(&self) -> Option<String> {
        match self.store.get(TokenKey::Access) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                None
            }
        }
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    /// Persist a freshly issued pair, starting a new generation
    fn replace_pair(&self, pair: &CredentialPair) -> anyhow::Result<u64> {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.store.save_pair(pair)?;
        Ok(*generation)
    }

    /// Apply `modify` only if no login or sign-out happened since `generation`
    fn update_if_current(&self, generation: u64, modify: impl FnOnce(&mut SessionState)) -> bool {
        let current = self.lock_generation();
        if *current != generation {
            return false;
        }
        self.update(modify);
        true
    }

    fn end_session(&self, reason: SignOutReason) {
        let mut generation = self.lock_generation();
        self.sign_out(&mut generation, reason);
    }

    fn end_session_if_current(&self, generation: u64, reason: SignOutReason) {
        let mut current = self.lock_generation();
        if *current == generation {
            self.sign_out(&mut current, reason);
        } else {
            debug!(?reason, "Session already replaced, not signing out");
        }
    }

    /// Clear credentials and user. Records `reason` only if there was a
    /// session to end, so repeated sign-outs keep the first reason.
    fn sign_out(&self, generation: &mut u64, reason: SignOutReason) {
        *generation += 1;
        let had_tokens = self.store.has_any().unwrap_or(true);
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }

        let was_signed_in = {
            let state = self.state.borrow();
            state.status != SessionStatus::Anonymous || state.current_user.is_some()
        };
        if had_tokens || was_signed_in {
            info!(?reason, "Signed out");
        }

        self.update(|s| {
            if had_tokens || was_signed_in {
                s.signed_out = Some(reason);
            }
            s.status = SessionStatus::Anonymous;
            s.current_user = None;
        });
    }

    async fn renewal(self: Arc<Self>) -> Result<String, RenewalError> {
        let generation = self.generation();
        let result = self.exchange_refresh_token(generation).await;
        match &result {
            Ok(_) => info!("Access token renewed"),
            Err(RenewalError::SessionEnded) => {
                debug!("Session ended during token renewal, discarding the new token")
            }
            Err(e) => {
                warn!(error = %e, "Token renewal failed, signing out");
                self.end_session_if_current(generation, e.sign_out_reason());
            }
        }
        result
    }

    async fn exchange_refresh_token(&self, generation: u64) -> Result<String, RenewalError> {
        let refresh = self
            .store
            .get(TokenKey::Refresh)
            .map_err(|e| RenewalError::Storage(e.to_string()))?
            .filter(|t| !t.is_empty())
            .ok_or(RenewalError::MissingRefreshToken)?;

        let request = ApiRequest::post(self.options.endpoints.refresh.as_str())
            .json(&RenewalRequest { refresh: &refresh })
            .map_err(RenewalError::Rejected)?;

        debug!("Requesting new access token");
        let response = tokio::time::timeout(self.options.renewal_timeout, self.transport.send(&request))
            .await
            .map_err(|_| RenewalError::TimedOut)?
            .and_then(ApiResponse::into_result)
            .map_err(RenewalError::Rejected)?;

        let renewed: RenewalResponse = response.json().map_err(RenewalError::Rejected)?;
        if renewed.access.is_empty() {
            return Err(RenewalError::Rejected(ApiError::InvalidResponse(
                "Renewal response is missing the access token".to_string(),
            )));
        }

        self.store_renewed(generation, &renewed)?;
        Ok(renewed.access)
    }

    /// Persist a renewal result, unless the session it belongs to is gone
    fn store_renewed(&self, generation: u64, renewed: &RenewalResponse) -> Result<(), RenewalError> {
        let current = self.lock_generation();
        if *current != generation {
            return Err(RenewalError::SessionEnded);
        }

        self.store
            .set(TokenKey::Access, &renewed.access)
            .map_err(|e| RenewalError::Storage(e.to_string()))?;
        if let Some(rotated) = renewed.refresh.as_deref().filter(|t| !t.is_empty()) {
            self.store
                .set(TokenKey::Refresh, rotated)
                .map_err(|e| RenewalError::Storage(e.to_string()))?;
            debug!("Refresh token rotated");
        }
        Ok(())
    }
}
