//! Scripted transport for tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use super::{ApiError, ApiRequest, ApiResponse, Transport};

/// What the stub does with one request
pub(crate) enum Reply {
    Respond(u16, String),
    Delayed(Duration, u16, String),
    Fail(ApiError),
}

impl Reply {
    pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
        Reply::Respond(status, body.to_string())
    }

    pub(crate) fn empty(status: u16) -> Self {
        Reply::Respond(status, String::new())
    }
}

type Handler = Box<dyn Fn(&ApiRequest) -> Reply + Send + Sync>;

pub(crate) struct StubTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubTransport {
    pub(crate) fn new(handler: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.calls_to(method, path).len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        match (self.handler)(request) {
            Reply::Respond(status, body) => Ok(response(status, body)),
            Reply::Delayed(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(response(status, body))
            }
            Reply::Fail(err) => Err(err),
        }
    }
}

fn response(status: u16, body: String) -> ApiResponse {
    ApiResponse::new(
        StatusCode::from_u16(status).expect("stub status code"),
        body,
    )
}
