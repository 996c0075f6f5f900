use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PersonRef, TitleRef, UserRef};

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub related_title: Option<TitleRef>,
    #[serde(default)]
    pub related_person: Option<PersonRef>,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trivia {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub title: Option<TitleRef>,
    #[serde(default)]
    pub person: Option<PersonRef>,
}

impl Trivia {
    /// What the fact is about, for display
    pub fn subject(&self) -> Option<String> {
        if let Some(ref title) = self.title {
            return Some(
                title
                    .primary_title
                    .clone()
                    .unwrap_or_else(|| format!("title #{}", title.id)),
            );
        }
        self.person.as_ref().map(|p| {
            p.name
                .clone()
                .unwrap_or_else(|| format!("person #{}", p.id))
        })
    }
}

/// Body for submitting a trivia entry about a title or a person
#[derive(Debug, Clone, Serialize)]
pub struct NewTrivia {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_news_article() {
        let json = r#"{
            "id": 3,
            "title": "Festival lineup announced",
            "content": "...",
            "published_at": "2024-05-14T09:30:00Z",
            "author": {"id": 1, "username": "editor"},
            "related_title": {"id": 7, "primary_title": "Anora"},
            "related_person": null
        }"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.author.unwrap().display_name(), "editor");
        assert_eq!(article.related_title.unwrap().id, 7);
        assert!(article.related_person.is_none());
        assert!(article.published_at.is_some());
    }

    #[test]
    fn test_trivia_subject() {
        let about_title: Trivia = serde_json::from_str(
            r#"{"id": 1, "content": "Shot in 21 days.", "title": {"id": 2, "primary_title": "Clerks"}}"#,
        )
        .unwrap();
        assert_eq!(about_title.subject().as_deref(), Some("Clerks"));

        let about_person: Trivia =
            serde_json::from_str(r#"{"id": 1, "content": "Left-handed.", "person": {"id": 8}}"#).unwrap();
        assert_eq!(about_person.subject().as_deref(), Some("person #8"));
    }

    #[test]
    fn test_new_trivia_omits_unset_subject() {
        let trivia = NewTrivia {
            content: "Fact".into(),
            title: Some(4),
            person: None,
        };
        assert_eq!(
            serde_json::to_value(&trivia).unwrap(),
            serde_json::json!({"content": "Fact", "title": 4})
        );
    }
}
