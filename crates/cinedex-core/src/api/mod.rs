//! Talking to the backend.
//!
//! - `transport`: request/response values and the HTTP transport
//! - `gateway`: bearer attachment and one-shot replay after token renewal
//! - `client`: typed resource calls on top of the gateway

pub mod client;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod transport;

#[cfg(test)]
pub(crate) mod stub;

pub use client::{ApiClient, SearchResults, SearchScope, TitleQuery, TriviaFilter};
pub use endpoints::Endpoints;
pub use error::{ApiError, ErrorPayload};
pub use gateway::Gateway;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, DEFAULT_REQUEST_TIMEOUT_SECS};
