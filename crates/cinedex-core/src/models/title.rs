//! Titles (movies, series, episodes, games) and the records hanging off them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PersonRef, UserRef};

/// Lowest score accepted for ratings and reviews
pub const MIN_SCORE: u8 = 1;
/// Highest score accepted for ratings and reviews
pub const MAX_SCORE: u8 = 10;

/// Minimum review length, in characters
const MIN_REVIEW_LENGTH: usize = 10;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TitleType {
    Movie,
    TvSeries,
    TvEpisode,
    VideoGame,
    #[serde(other)]
    Other,
}

impl TitleType {
    /// Wire value, as used in the `title_type` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleType::Movie => "MOVIE",
            TitleType::TvSeries => "TV_SERIES",
            TitleType::TvEpisode => "TV_EPISODE",
            TitleType::VideoGame => "VIDEO_GAME",
            TitleType::Other => "OTHER",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TitleType::Movie => "Movie",
            TitleType::TvSeries => "TV Series",
            TitleType::TvEpisode => "TV Episode",
            TitleType::VideoGame => "Video Game",
            TitleType::Other => "Other",
        }
    }
}

impl fmt::Display for TitleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TitleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "MOVIE" => Ok(TitleType::Movie),
            "TV_SERIES" => Ok(TitleType::TvSeries),
            "TV_EPISODE" => Ok(TitleType::TvEpisode),
            "VIDEO_GAME" => Ok(TitleType::VideoGame),
            other => Err(format!("Unknown title type: {}", other)),
        }
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A person's part in a title: cast with character names, or crew
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleCredit {
    #[serde(default)]
    pub person: Option<PersonRef>,
    pub role: String,
    #[serde(default)]
    pub characters: Vec<String>,
}

impl TitleCredit {
    pub fn is_cast(&self) -> bool {
        self.role.eq_ignore_ascii_case("ACTOR") || self.role.eq_ignore_ascii_case("ACTRESS")
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    #[serde(default)]
    pub primary_title: Option<String>,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: i64,
    pub primary_title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub title_type: Option<TitleType>,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub runtime_minutes: Option<u32>,
    #[serde(default)]
    pub is_adult: bool,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub num_votes: Option<u64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub title_people: Vec<TitleCredit>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl Title {
    /// "1999", "2008–2013", or "2019–" for a series still running
    pub fn year_range(&self) -> Option<String> {
        let start = self.start_year?;
        let ongoing = matches!(self.title_type, Some(TitleType::TvSeries));
        Some(match self.end_year {
            Some(end) if end != start => format!("{}–{}", start, end),
            Some(_) => start.to_string(),
            None if ongoing => format!("{}–", start),
            None => start.to_string(),
        })
    }

    pub fn cast(&self) -> impl Iterator<Item = &TitleCredit> {
        self.title_people.iter().filter(|c| c.is_cast())
    }

    pub fn crew(&self) -> impl Iterator<Item = &TitleCredit> {
        self.title_people.iter().filter(|c| !c.is_cast())
    }

    pub fn genre_names(&self) -> Vec<&str> {
        self.genres.iter().map(|g| g.name.as_str()).collect()
    }
}

/// A title as embedded in other records
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRef {
    pub id: i64,
    #[serde(default)]
    pub primary_title: Option<String>,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub title: Option<i64>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub contains_spoilers: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for posting a review; the title id is added by the client.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub rating: u8,
    pub content: String,
    pub contains_spoilers: bool,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), String> {
        validate_score(self.rating)?;
        if self.content.trim().chars().count() < MIN_REVIEW_LENGTH {
            return Err(format!(
                "Review must be at least {} characters long",
                MIN_REVIEW_LENGTH
            ));
        }
        Ok(())
    }
}

pub fn validate_score(score: u8) -> Result<(), String> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(format!("Rating must be between {} and {}", MIN_SCORE, MAX_SCORE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(json: serde_json::Value) -> Title {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_title_with_credits() {
        let t = title(serde_json::json!({
            "id": 1,
            "primary_title": "Heat",
            "title_type": "MOVIE",
            "start_year": 1995,
            "runtime_minutes": 170,
            "average_rating": 8.3,
            "genres": [{"id": 2, "name": "Crime"}],
            "title_people": [
                {"person": {"id": 9, "name": "Al Pacino"}, "role": "ACTOR", "characters": ["Vincent Hanna"]},
                {"person": {"id": 10, "name": "Michael Mann"}, "role": "DIRECTOR"}
            ]
        }));
        assert_eq!(t.title_type, Some(TitleType::Movie));
        assert_eq!(t.cast().count(), 1);
        assert_eq!(t.crew().next().unwrap().role, "DIRECTOR");
        assert_eq!(t.genre_names(), vec!["Crime"]);
        assert_eq!(t.year_range().as_deref(), Some("1995"));
    }

    #[test]
    fn test_unknown_title_type_is_other() {
        let t = title(serde_json::json!({"id": 1, "primary_title": "X", "title_type": "SHORT"}));
        assert_eq!(t.title_type, Some(TitleType::Other));
    }

    #[test]
    fn test_year_range() {
        let series = title(serde_json::json!({
            "id": 1, "primary_title": "Lost", "title_type": "TV_SERIES", "start_year": 2004
        }));
        assert_eq!(series.year_range().as_deref(), Some("2004–"));

        let ended = title(serde_json::json!({
            "id": 1, "primary_title": "Lost", "title_type": "TV_SERIES",
            "start_year": 2004, "end_year": 2010
        }));
        assert_eq!(ended.year_range().as_deref(), Some("2004–2010"));

        let undated = title(serde_json::json!({"id": 1, "primary_title": "Untitled"}));
        assert_eq!(undated.year_range(), None);
    }

    #[test]
    fn test_title_type_from_str() {
        assert_eq!("movie".parse::<TitleType>(), Ok(TitleType::Movie));
        assert_eq!("tv-series".parse::<TitleType>(), Ok(TitleType::TvSeries));
        assert_eq!("VIDEO_GAME".parse::<TitleType>(), Ok(TitleType::VideoGame));
        assert!("person".parse::<TitleType>().is_err());
    }

    #[test]
    fn test_new_review_validation() {
        let short = NewReview {
            rating: 8,
            content: "Great".into(),
            contains_spoilers: false,
        };
        assert_eq!(
            short.validate().unwrap_err(),
            "Review must be at least 10 characters long"
        );

        let out_of_range = NewReview {
            rating: 11,
            content: "Long enough review text".into(),
            contains_spoilers: false,
        };
        assert!(out_of_range.validate().is_err());

        let ok = NewReview {
            rating: 10,
            content: "Long enough review text".into(),
            contains_spoilers: true,
        };
        assert!(ok.validate().is_ok());
    }
}
