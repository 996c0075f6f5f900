use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Title;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchStatus {
    #[default]
    PlanToWatch,
    Watching,
    Completed,
    Dropped,
}

impl WatchStatus {
    pub const ALL: [WatchStatus; 4] = [
        WatchStatus::PlanToWatch,
        WatchStatus::Watching,
        WatchStatus::Completed,
        WatchStatus::Dropped,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WatchStatus::PlanToWatch => "Plan to Watch",
            WatchStatus::Watching => "Watching",
            WatchStatus::Completed => "Completed",
            WatchStatus::Dropped => "Dropped",
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|status| status.label().to_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown watchlist status: {}", s))
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: i64,
    pub title: Title,
    #[serde(default)]
    pub status: WatchStatus,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&WatchStatus::PlanToWatch).unwrap(),
            r#""PLAN_TO_WATCH""#
        );
        let parsed: WatchStatus = serde_json::from_str(r#""COMPLETED""#).unwrap();
        assert_eq!(parsed, WatchStatus::Completed);
    }

    #[test]
    fn test_watch_status_from_str() {
        assert_eq!("plan-to-watch".parse::<WatchStatus>(), Ok(WatchStatus::PlanToWatch));
        assert_eq!("PLAN_TO_WATCH".parse::<WatchStatus>(), Ok(WatchStatus::PlanToWatch));
        assert_eq!("Watching".parse::<WatchStatus>(), Ok(WatchStatus::Watching));
        assert!("paused".parse::<WatchStatus>().is_err());
    }

    #[test]
    fn test_parse_watchlist_item() {
        let item: WatchlistItem = serde_json::from_str(
            r#"{"id": 11, "title": {"id": 3, "primary_title": "Stalker", "start_year": 1979}, "status": "WATCHING"}"#,
        )
        .unwrap();
        assert_eq!(item.title.id, 3);
        assert_eq!(item.status, WatchStatus::Watching);
    }
}
