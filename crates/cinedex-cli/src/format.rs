//! Text helpers for terminal output.

use chrono::{DateTime, Local, Utc};

use cinedex_core::models::{Title, MAX_SCORE};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// "2h 42m", "58m"
pub fn runtime(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// "7.8/10 (1,204 votes)", or "not rated"
pub fn rating(average: Option<f64>, votes: Option<u64>) -> String {
    match average {
        Some(avg) => match votes {
            Some(n) => format!("{:.1}/{} ({} votes)", avg, MAX_SCORE, thousands(n)),
            None => format!("{:.1}/{}", avg, MAX_SCORE),
        },
        None => "not rated".to_string(),
    }
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Local calendar date, e.g. "Mar 04, 2024"
pub fn date(timestamp: &DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%b %d, %Y").to_string()
}

pub fn optional_date(timestamp: Option<&DateTime<Utc>>) -> String {
    timestamp.map(date).unwrap_or_else(|| "-".to_string())
}

/// One-line summary: "Heat (1995) · Movie · 2h 50m"
pub fn title_line(title: &Title) -> String {
    let mut parts = vec![match title.year_range() {
        Some(years) => format!("{} ({})", title.primary_title, years),
        None => title.primary_title.clone(),
    }];
    if let Some(kind) = title.title_type {
        parts.push(kind.display_name().to_string());
    }
    if let Some(minutes) = title.runtime_minutes {
        parts.push(runtime(minutes));
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("Hi", 2), "Hi");
        assert_eq!(truncate("Amélie Poulain", 9), "Amélie...");
    }

    #[test]
    fn test_runtime() {
        assert_eq!(runtime(58), "58m");
        assert_eq!(runtime(120), "2h");
        assert_eq!(runtime(162), "2h 42m");
    }

    #[test]
    fn test_rating() {
        assert_eq!(rating(Some(7.84), Some(1204)), "7.8/10 (1,204 votes)");
        assert_eq!(rating(Some(9.0), None), "9.0/10");
        assert_eq!(rating(None, Some(3)), "not rated");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000_000), "1,000,000");
    }

    #[test]
    fn test_title_line() {
        let title: Title = serde_json::from_value(serde_json::json!({
            "id": 1,
            "primary_title": "Heat",
            "title_type": "MOVIE",
            "start_year": 1995,
            "runtime_minutes": 170
        }))
        .unwrap();
        assert_eq!(title_line(&title), "Heat (1995) · Movie · 2h 50m");
    }
}
