pub mod stats;
pub mod user;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parses the timestamp text `row_to_json` produces. `timestamptz` columns
/// carry an offset, `timestamp` columns do not and are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_flavours() {
        let with_offset = parse_timestamp("2024-03-01T10:00:00.123456+00:00").unwrap();
        let naive = parse_timestamp("2024-03-01T10:00:00.123456").unwrap();
        assert_eq!(with_offset, naive);
        assert!(parse_timestamp("yesterday").is_none());
    }
}
