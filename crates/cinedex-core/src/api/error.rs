use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Error body returned by the backend.
///
/// The backend answers either with a single message (`"..."` or
/// `{"detail": "..."}`) or with a map of field name to messages. Both shapes
/// are kept as sent so forms can render them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Message(String),
    Fields(BTreeMap<String, Vec<String>>),
}

/// Field names the backend uses for errors that are not tied to one input
const GENERAL_FIELDS: [&str; 2] = ["detail", "non_field_errors"];

impl ErrorPayload {
    /// Parse a response body. Non-JSON bodies become a (truncated) message.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::String(message)) => ErrorPayload::Message(message),
            Ok(serde_json::Value::Object(map)) if !map.is_empty() => {
                let fields = map
                    .into_iter()
                    .map(|(field, value)| (field, Self::messages(value)))
                    .collect();
                ErrorPayload::Fields(fields)
            }
            _ => ErrorPayload::Message(ApiError::truncate_body(body.trim())),
        }
    }

    fn messages(value: serde_json::Value) -> Vec<String> {
        match value {
            serde_json::Value::String(s) => vec![s],
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        }
    }

    /// The general (non-field) message, if the payload carries one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ErrorPayload::Message(message) if !message.is_empty() => Some(message),
            ErrorPayload::Message(_) => None,
            ErrorPayload::Fields(fields) => GENERAL_FIELDS
                .iter()
                .filter_map(|key| fields.get(*key))
                .flat_map(|messages| messages.first())
                .map(String::as_str)
                .find(|m| !m.is_empty()),
        }
    }

    /// Messages attached to one input field
    pub fn field(&self, name: &str) -> Option<&[String]> {
        match self {
            ErrorPayload::Fields(fields) => fields.get(name).map(Vec::as_slice),
            ErrorPayload::Message(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ErrorPayload::Message(message) => message.is_empty(),
            ErrorPayload::Fields(fields) => fields.is_empty(),
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPayload::Message(message) => f.write_str(message),
            ErrorPayload::Fields(fields) => {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(field, messages)| {
                        if GENERAL_FIELDS.contains(&field.as_str()) {
                            messages.join(" ")
                        } else {
                            format!("{}: {}", field, messages.join(" "))
                        }
                    })
                    .collect();
                f.write_str(&rendered.join("; "))
            }
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(ErrorPayload),

    #[error("Unauthorized - token may be expired")]
    Unauthorized(ErrorPayload),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Could not build request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 | 422 => ApiError::BadRequest(ErrorPayload::from_body(body)),
            401 => ApiError::Unauthorized(ErrorPayload::from_body(body)),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// The backend's error body, for the variants that carry one
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            ApiError::BadRequest(payload) | ApiError::Unauthorized(payload) => Some(payload),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}
