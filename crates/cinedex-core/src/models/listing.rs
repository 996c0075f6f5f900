use serde::{Deserialize, Serialize};

/// A list endpoint's body.
///
/// Unpaginated endpoints return a bare array; paginated ones wrap it as
/// `{count, next, previous, results}`. Callers usually just want the items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paged {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
}

impl<T> Listing<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Listing::Plain(items) => items,
            Listing::Paged { results, .. } => results,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Plain(items) => items,
            Listing::Paged { results, .. } => results,
        }
    }

    /// Total matches on the server; for plain lists, the list length
    pub fn total(&self) -> u64 {
        match self {
            Listing::Plain(items) => items.len() as u64,
            Listing::Paged { count, results, .. } => count.unwrap_or(results.len() as u64),
        }
    }

    pub fn has_more(&self) -> bool {
        matches!(self, Listing::Paged { next: Some(_), .. })
    }
}
