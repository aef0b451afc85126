//! "5 minutes ago" labels for the last draft save.

use chrono::{DateTime, Utc};

/// Human distance from `then` to `now`. A `then` in the future reads as
/// "less than a minute ago".
pub fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = (seconds + 30) / 60;

    let distance = match minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        m if m < 45 => format!("{} minutes", m),
        m if m < 90 => "about 1 hour".to_string(),
        m if m < 1_440 => format!("about {} hours", (m + 30) / 60),
        m if m < 2_520 => "1 day".to_string(),
        m if m < 43_200 => format!("{} days", (m + 720) / 1_440),
        m if m < 64_800 => "about 1 month".to_string(),
        m if m < 86_400 => "about 2 months".to_string(),
        m if m < 525_600 => format!("{} months", (m + 21_600) / 43_200),
        m => {
            let months = m / 43_200;
            let years = months / 12;
            match months % 12 {
                r if r < 3 => format!("about {}", years_label(years)),
                r if r < 9 => format!("over {}", years_label(years)),
                _ => format!("almost {}", years_label(years + 1)),
            }
        }
    };
    format!("{} ago", distance)
}

fn years_label(years: i64) -> String {
    if years == 1 {
        "1 year".to_string()
    } else {
        format!("{} years", years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ago(delta: Duration) -> String {
        let now = Utc::now();
        format_relative(now - delta, now)
    }

    #[test]
    fn test_minutes_and_hours() {
        assert_eq!(ago(Duration::seconds(0)), "less than a minute ago");
        assert_eq!(ago(Duration::seconds(45)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(ago(Duration::minutes(60)), "about 1 hour ago");
        assert_eq!(ago(Duration::minutes(90)), "about 2 hours ago");
        assert_eq!(ago(Duration::hours(3)), "about 3 hours ago");
    }

    #[test]
    fn test_days_months_years() {
        assert_eq!(ago(Duration::hours(26)), "1 day ago");
        assert_eq!(ago(Duration::days(4)), "4 days ago");
        assert_eq!(ago(Duration::days(40)), "about 1 month ago");
        assert_eq!(ago(Duration::days(100)), "3 months ago");
        assert_eq!(ago(Duration::days(400)), "about 1 year ago");
        assert_eq!(ago(Duration::days(550)), "over 1 year ago");
        assert_eq!(ago(Duration::days(800)), "about 2 years ago");
    }

    #[test]
    fn test_future_timestamp() {
        let now = Utc::now();
        assert_eq!(
            format_relative(now + Duration::minutes(3), now),
            "less than a minute ago"
        );
    }
}
