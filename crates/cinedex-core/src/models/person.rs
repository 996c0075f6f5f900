use serde::{Deserialize, Serialize};

use super::Title;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub death_year: Option<i32>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl Person {
    /// "1940–2019", "b. 1970", or None when no years are known
    pub fn lifespan(&self) -> Option<String> {
        match (self.birth_year, self.death_year) {
            (Some(born), Some(died)) => Some(format!("{}–{}", born, died)),
            (Some(born), None) => Some(format!("b. {}", born)),
            (None, Some(died)) => Some(format!("d. {}", died)),
            (None, None) => None,
        }
    }
}

/// A person as embedded in other records
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// One row of a person's filmography
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmographyEntry {
    pub title: Title,
    pub role: String,
    #[serde(default)]
    pub characters: Vec<String>,
}

impl FilmographyEntry {
    /// Role for display: "Director", or "Actor as Vincent Hanna"
    pub fn role_display(&self) -> String {
        let mut chars = self.role.chars();
        let role: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
        if self.characters.is_empty() {
            role
        } else {
            format!("{} as {}", role, self.characters.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifespan() {
        let mut person: Person =
            serde_json::from_str(r#"{"id": 1, "name": "Agnès Varda", "birth_year": 1928, "death_year": 2019}"#)
                .unwrap();
        assert_eq!(person.lifespan().as_deref(), Some("1928–2019"));

        person.death_year = None;
        assert_eq!(person.lifespan().as_deref(), Some("b. 1928"));

        person.birth_year = None;
        assert_eq!(person.lifespan(), None);
    }

    #[test]
    fn test_filmography_role_display() {
        let entry: FilmographyEntry = serde_json::from_str(
            r#"{"title": {"id": 5, "primary_title": "Heat"}, "role": "ACTOR", "characters": ["Neil McCauley"]}"#,
        )
        .unwrap();
        assert_eq!(entry.role_display(), "Actor as Neil McCauley");
        assert_eq!(entry.title.primary_title, "Heat");

        let crew: FilmographyEntry =
            serde_json::from_str(r#"{"title": {"id": 5, "primary_title": "Heat"}, "role": "DIRECTOR"}"#)
                .unwrap();
        assert_eq!(crew.role_display(), "Director");
    }
}
