//! Backend paths, relative to the API base URL.
//!
//! The backend owns its URL layout; the defaults match the current
//! deployment and every path can be overridden for other backends.

/// Paths used by the session store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub current_user: String,
    pub register: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/users/login/".to_string(),
            refresh: "/users/token/refresh/".to_string(),
            current_user: "/users/me/".to_string(),
            register: "/users/".to_string(),
        }
    }
}

// Resource paths used by `ApiClient`

pub(crate) const TITLES: &str = "/titles/titles/";
pub(crate) const GENRES: &str = "/titles/genres/";
pub(crate) const REVIEWS: &str = "/titles/reviews/";
pub(crate) const RATINGS: &str = "/titles/ratings/";
pub(crate) const WATCHLISTS: &str = "/titles/watchlists/";
pub(crate) const PERSONS: &str = "/users/persons/";
pub(crate) const USERS: &str = "/users/";
pub(crate) const NEWS: &str = "/news/news/";
pub(crate) const TRIVIA: &str = "/news/trivia/";

/// `{collection}{id}/`
pub(crate) fn item(collection: &str, id: i64) -> String {
    format!("{}{}/", collection, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_path() {
        assert_eq!(item(TITLES, 42), "/titles/titles/42/");
        assert_eq!(
            format!("{}filmography/", item(PERSONS, 7)),
            "/users/persons/7/filmography/"
        );
    }
}
