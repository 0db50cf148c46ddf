use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const INVALID_DATE_TIME: &str =
    "must be RFC 3339 (2024-01-02T03:04:05Z), a date-time (2024-01-02T03:04:05, UTC) or a date (2024-01-02, UTC)";

pub fn parse_date_time(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Ok(date_time.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    Err(INVALID_DATE_TIME.to_string())
}
