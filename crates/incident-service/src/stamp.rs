//! Record ids and display timestamps

use chrono::{DateTime, Local, NaiveDateTime};
use common::validation::safe_unix_millis;

/// Day-first local time, as shown to users
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// `timeAgo` value for freshly created alerts
pub const JUST_NOW: &str = "agora mesmo";

const ACCEPTED_FORMATS: [&str; 3] = ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y, %H:%M:%S", "%d/%m/%Y %H:%M"];

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn now_timestamp() -> String {
    format_timestamp(Local::now())
}

/// Parse any timestamp this service has written, including the shorter seed form
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

/// Creation-time-derived id, strictly greater than every existing id
pub fn next_id(existing: impl Iterator<Item = i64>) -> i64 {
    let floor = existing.max().map_or(0, |max| max.saturating_add(1));
    safe_unix_millis().max(floor)
}

/// Relative age such as "há 2 horas"
pub fn time_ago(created_at: &str, now: NaiveDateTime) -> Option<String> {
    let created = parse_timestamp(created_at)?;
    let minutes = (now - created).num_minutes();

    let text = match minutes {
        m if m < 1 => JUST_NOW.to_string(),
        1 => "há 1 minuto".to_string(),
        m if m < 60 => format!("há {} minutos", m),
        m if m < 120 => "há 1 hora".to_string(),
        m if m < 24 * 60 => format!("há {} horas", m / 60),
        m if m < 48 * 60 => "há 1 dia".to_string(),
        m => format!("há {} dias", m / (24 * 60)),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_round_trips() {
        let at = Local.with_ymd_and_hms(2025, 8, 12, 14, 30, 5).unwrap();
        let formatted = format_timestamp(at);
        assert_eq!(formatted, "12/08/2025 14:30:05");
        assert_eq!(parse_timestamp(&formatted), Some(at.naive_local()));
    }

    #[test]
    fn test_parses_seed_and_browser_forms() {
        assert!(parse_timestamp("12/08/2025 14:30").is_some());
        assert!(parse_timestamp("12/08/2025, 14:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_next_id_is_unique() {
        let now = safe_unix_millis();
        assert!(next_id([1, 2, 3].into_iter()) >= now);

        let future = now + 1_000_000;
        assert_eq!(next_id([future, 5].into_iter()), future + 1);
        assert!(next_id(std::iter::empty()) > 0);
    }

    #[test]
    fn test_time_ago_buckets() {
        let created = parse_timestamp("12/08/2025 10:00:00").unwrap();
        let at = |d: Duration| created + d;

        assert_eq!(time_ago("12/08/2025 10:00:00", at(Duration::seconds(20))).unwrap(), JUST_NOW);
        assert_eq!(time_ago("12/08/2025 10:00:00", at(Duration::minutes(1))).unwrap(), "há 1 minuto");
        assert_eq!(time_ago("12/08/2025 10:00:00", at(Duration::minutes(30))).unwrap(), "há 30 minutos");
        assert_eq!(time_ago("12/08/2025 10:00:00", at(Duration::hours(6))).unwrap(), "há 6 horas");
        assert_eq!(time_ago("12/08/2025 10:00:00", at(Duration::days(2))).unwrap(), "há 2 dias");
        assert_eq!(time_ago("not a date", created), None);
    }
}
