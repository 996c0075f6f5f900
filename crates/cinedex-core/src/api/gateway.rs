//! Authorized requests with transparent token renewal.
//!
//! Every request goes out with the currently persisted access token. If the
//! backend answers 401, the gateway asks the session to renew the token
//! (one renewal call no matter how many requests were rejected at once) and
//! replays the request a single time with the new token.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiError, ApiRequest, ApiResponse};
use crate::auth::Session;

/// A request rejected as unauthorized, held until the token is renewed.
/// It is replayed at most once.
struct PendingRequest {
    request: ApiRequest,
    rejection: ApiResponse,
}

impl PendingRequest {
    /// The original rejection, surfaced when no replay is possible
    fn into_error(self) -> ApiError {
        ApiError::from_status(self.rejection.status, &self.rejection.body)
    }
}

#[derive(Clone)]
pub struct Gateway {
    session: Session,
}

impl Gateway {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send `request`, renewing the access token once on a 401.
    ///
    /// Non-401 failures and transport errors are returned as-is. If renewal
    /// is impossible, or the session ended while it ran, the original 401 is
    /// returned without a replay. A 401 on the replay is final.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = self.session.access_token();
        let response = self.dispatch(&request, token.as_deref()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return response.into_result();
        }

        debug!(method = %request.method, path = %request.path, "Unauthorized, renewing access token");
        let pending = PendingRequest {
            request,
            rejection: response,
        };

        let renewed = match self.session.renew(token.as_deref()).await {
            Ok(renewed) => renewed,
            Err(e) => {
                warn!(path = %pending.request.path, error = %e, "Cannot renew access token");
                return Err(pending.into_error());
            }
        };

        let replay = self.dispatch(&pending.request, Some(&renewed)).await?;
        if replay.status == StatusCode::UNAUTHORIZED {
            warn!(path = %pending.request.path, "Request rejected again after token renewal");
        }
        replay.into_result()
    }

    /// `execute` and decode the JSON body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.json()
    }

    /// `execute` for calls whose response body is irrelevant (e.g. 204)
    pub async fn execute_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        let transport = self.session.transport();
        match token {
            Some(token) => transport.send(&request.with_bearer(token)?).await,
            None => transport.send(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::api::stub::{Reply, StubTransport};
    use crate::auth::{
        CredentialPair, MemoryTokenStore, SessionOptions, SessionStatus, SignOutReason, TokenKey,
        TokenStore,
    };

    const REFRESH: &str = "/users/token/refresh/";
    const TITLES: &str = "/titles/titles/";

    /// Titles accept only "A2"; refresh turns "R1" into "A2"
    fn backend(refresh_delay: Duration) -> Arc<StubTransport> {
        Arc::new(StubTransport::new(move |req| match req.path.as_str() {
            TITLES => match req.bearer() {
                Some("A2") => Reply::json(200, json!([{"id": 1, "primary_title": "Alien"}])),
                _ => Reply::json(401, json!({"detail": "Given token not valid"})),
            },
            REFRESH if req.body == Some(json!({"refresh": "R1"})) => {
                Reply::Delayed(refresh_delay, 200, json!({"access": "A2"}).to_string())
            }
            REFRESH => Reply::json(401, json!({"detail": "Token is invalid or expired"})),
            _ => Reply::empty(404),
        }))
    }

    fn gateway(transport: Arc<StubTransport>, store: Arc<MemoryTokenStore>) -> Gateway {
        Session::new(transport, store, SessionOptions::default()).gateway()
    }

    #[tokio::test]
    async fn test_attaches_current_token() {
        let transport = backend(Duration::ZERO);
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A2", "R1")));
        let gateway = gateway(transport.clone(), store);

        let response = gateway.execute(ApiRequest::get(TITLES)).await.unwrap();
        assert!(response.is_success());

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer(), Some("A2"));
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_authorization_header() {
        let transport = Arc::new(StubTransport::new(|_| Reply::json(200, json!([]))));
        let gateway = gateway(transport.clone(), Arc::new(MemoryTokenStore::new()));

        gateway.execute(ApiRequest::get("/titles/genres/")).await.unwrap();
        assert!(transport.requests()[0]
            .headers
            .get(reqwest::header::AUTHORIZATION)
            .is_none());
    }

    #[tokio::test]
    async fn test_renews_and_replays_once() {
        let transport = backend(Duration::ZERO);
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "R1")));
        let gateway = gateway(transport.clone(), store.clone());

        let titles: Vec<serde_json::Value> = gateway
            .execute_json(ApiRequest::get(TITLES).query("page", 2))
            .await
            .unwrap();
        assert_eq!(titles[0]["primary_title"], "Alien");

        let calls = transport.calls_to(Method::GET, TITLES);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].bearer(), Some("A1"));
        assert_eq!(calls[1].bearer(), Some("A2"));
        // replay is the same request apart from the token
        assert_eq!(calls[1].query, vec![("page".to_string(), "2".to_string())]);

        let refresh = transport.calls_to(Method::POST, REFRESH);
        assert_eq!(refresh.len(), 1);
        assert_eq!(refresh[0].bearer(), None);
        assert_eq!(store.get(TokenKey::Access).unwrap().as_deref(), Some("A2"));
        assert_eq!(store.get(TokenKey::Refresh).unwrap().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_concurrent_rejections_share_one_renewal() {
        let transport = backend(Duration::from_millis(50));
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "R1")));
        let gateway = gateway(transport.clone(), store);

        let (a, b, c) = tokio::join!(
            gateway.execute(ApiRequest::get(TITLES)),
            gateway.execute(ApiRequest::get(TITLES)),
            gateway.execute(ApiRequest::get(TITLES)),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        assert_eq!(transport.count(Method::POST, REFRESH), 1);
        let replays = transport
            .calls_to(Method::GET, TITLES)
            .into_iter()
            .filter(|r| r.bearer() == Some("A2"))
            .count();
        assert_eq!(replays, 3);
    }

    #[tokio::test]
    async fn test_late_rejection_reuses_renewed_token() {
        let transport = backend(Duration::ZERO);
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "R1")));
        let session = Session::new(transport.clone(), store, SessionOptions::default());

        session.gateway().execute(ApiRequest::get(TITLES)).await.unwrap();
        // a request that went out with the old token and came back after the renewal
        assert_eq!(session.renew(Some("A1")).await.unwrap(), "A2");
        assert_eq!(transport.count(Method::POST, REFRESH), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_ends_session() {
        let transport = backend(Duration::ZERO);
        let store = Arc::new(MemoryTokenStore::new());
        store.set(TokenKey::Access, "A1").unwrap();
        let session = Session::new(transport.clone(), store.clone(), SessionOptions::default());

        let err = session.gateway().execute(ApiRequest::get(TITLES)).await.unwrap_err();

        match err {
            ApiError::Unauthorized(payload) => {
                assert_eq!(payload.detail(), Some("Given token not valid"))
            }
            other => panic!("expected Unauthorized, got {:?}", other),
        }
        assert_eq!(transport.count(Method::POST, REFRESH), 0);
        assert_eq!(transport.count(Method::GET, TITLES), 1);
        assert!(!store.has_any().unwrap());
        assert_eq!(
            session.snapshot().signed_out,
            Some(SignOutReason::MissingRefreshToken)
        );
    }

    #[tokio::test]
    async fn test_rejected_renewal_ends_session() {
        let transport = backend(Duration::ZERO);
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "EXPIRED")));
        let session = Session::new(transport.clone(), store.clone(), SessionOptions::default());

        let err = session.gateway().execute(ApiRequest::get(TITLES)).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(transport.count(Method::POST, REFRESH), 1);
        assert_eq!(transport.count(Method::GET, TITLES), 1);
        assert!(!store.has_any().unwrap());
        let state = session.snapshot();
        assert!(state.current_user.is_none());
        assert_eq!(state.signed_out, Some(SignOutReason::RenewalFailed));
        assert!(state.signed_out.unwrap().is_forced());
    }

    #[tokio::test]
    async fn test_logout_during_renewal_discards_new_tokens() {
        let transport = Arc::new(StubTransport::new(|req| match req.path.as_str() {
            TITLES => match req.bearer() {
                Some("A2") => Reply::json(200, json!([])),
                _ => Reply::json(401, json!({"detail": "Given token not valid"})),
            },
            REFRESH => Reply::Delayed(
                Duration::from_millis(100),
                200,
                json!({"access": "A2", "refresh": "R2"}).to_string(),
            ),
            _ => Reply::empty(404),
        }));
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "R1")));
        let session = Session::new(transport.clone(), store.clone(), SessionOptions::default());

        let gateway = session.gateway();
        let request = tokio::spawn(async move { gateway.execute(ApiRequest::get(TITLES)).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        session.logout();

        let err = request.await.unwrap().unwrap_err();
        assert!(err.is_unauthorized());
        // no replay as the signed-out user, and nothing written back
        assert_eq!(transport.count(Method::GET, TITLES), 1);
        assert_eq!(transport.count(Method::POST, REFRESH), 1);
        assert!(!store.has_any().unwrap());
        assert_eq!(session.access_token(), None);

        let state = session.snapshot();
        assert_eq!(state.status, SessionStatus::Anonymous);
        assert_eq!(state.signed_out, Some(SignOutReason::UserRequested));
    }

    #[tokio::test]
    async fn test_replay_rejection_is_final() {
        let transport = Arc::new(StubTransport::new(|req| match req.path.as_str() {
            REFRESH => Reply::json(200, json!({"access": "A2"})),
            _ => Reply::json(401, json!({"detail": "nope"})),
        }));
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "R1")));
        let gateway = gateway(transport.clone(), store.clone());

        let err = gateway.execute(ApiRequest::get(TITLES)).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(transport.count(Method::GET, TITLES), 2);
        assert_eq!(transport.count(Method::POST, REFRESH), 1);
        // renewal itself worked, so the session survives
        assert_eq!(store.get(TokenKey::Access).unwrap().as_deref(), Some("A2"));
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let transport = Arc::new(StubTransport::new(|req| match req.path.as_str() {
            "/forbidden/" => Reply::json(403, json!({"detail": "no"})),
            "/broken/" => Reply::empty(500),
            _ => Reply::Fail(ApiError::NetworkError("connection reset".into())),
        }));
        let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("A1", "R1")));
        let gateway = gateway(transport.clone(), store.clone());

        assert!(matches!(
            gateway.execute(ApiRequest::get("/forbidden/")).await,
            Err(ApiError::AccessDenied(_))
        ));
        assert!(matches!(
            gateway.execute(ApiRequest::get("/broken/")).await,
            Err(ApiError::ServerError(_))
        ));
        assert!(matches!(
            gateway.execute(ApiRequest::get("/offline/")).await,
            Err(ApiError::NetworkError(_))
        ));

        assert_eq!(transport.count(Method::POST, REFRESH), 0);
        assert!(store.credential_pair().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_execute_empty_ignores_body() {
        let transport = Arc::new(StubTransport::new(|_| Reply::empty(204)));
        let gateway = gateway(transport, Arc::new(MemoryTokenStore::new()));
        gateway
            .execute_empty(ApiRequest::delete("/titles/watchlists/3/"))
            .await
            .unwrap();
    }
}
