use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ErrorPayload;

/// Minimum password length accepted by the sign-up form
const MIN_PASSWORD_LENGTH: usize = 8;

/// The authenticated user, as returned by the "current user" endpoint.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
}

/// A user as embedded in other records (review authors, news authors).
///
/// Depending on the serializer the backend sends a bare id, a bare
/// username, or a nested object.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(i64),
    Name(String),
    Summary {
        #[serde(default)]
        id: Option<i64>,
        username: String,
        #[serde(default)]
        profile_picture: Option<String>,
    },
}

impl UserRef {
    pub fn display_name(&self) -> String {
        match self {
            UserRef::Id(id) => format!("user #{}", id),
            UserRef::Name(name) => name.clone(),
            UserRef::Summary { username, .. } => username.clone(),
        }
    }
}

/// Body of the registration endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Local checks run before submitting a sign-up form.
    ///
    /// Problems are reported in the same field-keyed shape the backend uses,
    /// so callers render local and remote errors the same way. The session
    /// does not run these; the server remains the authority.
    pub fn validate(&self) -> Result<(), ErrorPayload> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if self.username.trim().is_empty() {
            errors.insert("username".into(), vec!["Username is required".into()]);
        }

        if self.email.trim().is_empty() {
            errors.insert("email".into(), vec!["Email is required".into()]);
        } else if !looks_like_email(self.email.trim()) {
            errors.insert("email".into(), vec!["Email is invalid".into()]);
        }

        if self.password.is_empty() {
            errors.insert("password".into(), vec!["Password is required".into()]);
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.insert(
                "password".into(),
                vec![format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH)],
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ErrorPayload::Fields(errors))
        }
    }
}

/// Something@something.something, with no whitespace
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

/// Partial profile update; unset fields are left alone by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}
