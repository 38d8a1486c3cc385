// services/opportunities.rs - Listing cards for the opportunities board

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::services::extraction::parse_deadline;
use crate::types::OpportunityType;

pub const ORGANIZATION_LABEL: &str = "Zaytoonz NGO";

static DEADLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*deadline\*\*\s*\n?([^\n*]+)").expect("deadline regex should compile"));
static COMPENSATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\*\*(?:salary|compensation|pay|budget|amount)\*\*\s*\n?([^\n*]+)")
        .expect("compensation regex should compile")
});

/// Display label for an `opportunities.opportunity_type`
pub fn type_label(opportunity_type: Option<&str>) -> &'static str {
    match opportunity_type.and_then(|t| t.parse::<OpportunityType>().ok()) {
        Some(OpportunityType::Job) => "Full-time",
        Some(OpportunityType::Funding) => "Grant",
        Some(OpportunityType::Training) => "Course",
        None => "Opportunity",
    }
}

fn labeled_value(re: &Regex, description: &str) -> Option<String> {
    re.captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Text after a `**Deadline**` heading in the description markdown
pub fn deadline_of(description: &str) -> Option<String> {
    labeled_value(&DEADLINE_RE, description)
}

/// Text after a `**Salary**` (or compensation, pay, budget, amount) heading
pub fn compensation_of(description: &str) -> Option<String> {
    labeled_value(&COMPENSATION_RE, description)
}

/// `expired` once a recognizable deadline has passed, otherwise `active`
/// for published descriptions and `suspended` for everything else
pub fn card_status(description_status: Option<&str>, deadline: Option<&str>, now: DateTime<Utc>) -> &'static str {
    let passed = deadline
        .and_then(parse_deadline)
        .and_then(|d| chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(false, |d| d.and_utc() < now);
    if passed {
        "expired"
    } else if description_status == Some("published") {
        "active"
    } else {
        "suspended"
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|ts| ts.and_utc()))
}

/// "3 days ago" style age, in whole days rounded up
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let millis = (now - then).num_milliseconds().unsigned_abs();
    let days = millis.div_ceil(86_400_000);
    match days {
        1 => "1 day ago".to_string(),
        d if d < 7 => format!("{} days ago", d),
        d if d < 30 => format!("{} weeks ago", d.div_ceil(7)),
        d if d < 365 => format!("{} months ago", d.div_ceil(30)),
        d => format!("{} years ago", d.div_ceil(365)),
    }
}

/// Board card for an opportunity row carrying `description` (its first
/// published or completed description, or null) and `applicants`
pub fn listing_card(row: &Value, now: DateTime<Utc>) -> Value {
    let description = row.get("description").filter(|d| d.is_object());
    let desc_text = |key: &str| description.and_then(|d| d.get(key)).and_then(Value::as_str).filter(|s| !s.is_empty());

    let body = desc_text("description").unwrap_or_default();
    let deadline = deadline_of(body);
    let status = card_status(desc_text("status"), deadline.as_deref(), now);
    let opportunity_type = row.get("opportunity_type").and_then(Value::as_str);
    let created_at = desc_text("created_at").or_else(|| row.get("created_at").and_then(Value::as_str));

    json!({
        "id": row.get("id").cloned().unwrap_or(Value::Null),
        "title": desc_text("title").map(Value::from).or_else(|| row.get("title").cloned()).unwrap_or(Value::Null),
        "description": body,
        "category": opportunity_type,
        "organization": ORGANIZATION_LABEL,
        "location": desc_text("location").unwrap_or("Not specified"),
        "compensation": compensation_of(body).unwrap_or_else(|| "Competitive".to_string()),
        "type": type_label(opportunity_type),
        "deadline": deadline,
        "posted": created_at.and_then(parse_timestamp).map(|ts| time_ago(ts, now)),
        "status": status,
        "applicants": row.get("applicants").and_then(Value::as_i64).unwrap_or(0),
        "ngoUserId": description.and_then(|d| d.get("user_id")).cloned().unwrap_or(Value::Null),
        "metadata": description
            .and_then(|d| d.get("metadata"))
            .filter(|m| !m.is_null())
            .cloned()
            .unwrap_or_else(|| json!({})),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn labels_follow_type() {
        assert_eq!(type_label(Some("job")), "Full-time");
        assert_eq!(type_label(Some("funding")), "Grant");
        assert_eq!(type_label(Some("training")), "Course");
        assert_eq!(type_label(Some("volunteering")), "Opportunity");
        assert_eq!(type_label(None), "Opportunity");
    }

    #[test]
    fn headings_are_read_from_markdown() {
        let text = "Intro\n**Deadline**\nJune 30, 2024\n**Salary** 1,200 TND / month\nMore";
        assert_eq!(deadline_of(text).as_deref(), Some("June 30, 2024"));
        assert_eq!(compensation_of(text).as_deref(), Some("1,200 TND / month"));
        assert_eq!(compensation_of("**BUDGET**: 5000 EUR").as_deref(), Some(": 5000 EUR"));
        assert_eq!(deadline_of("no headings"), None);
    }

    #[test]
    fn status_depends_on_deadline_then_publication() {
        assert_eq!(card_status(Some("published"), Some("2024-05-01"), now()), "expired");
        assert_eq!(card_status(Some("published"), Some("2024-07-01"), now()), "active");
        assert_eq!(card_status(Some("completed"), None, now()), "suspended");
        assert_eq!(card_status(Some("published"), Some("when filled"), now()), "active");
    }

    #[test]
    fn ages_round_up() {
        assert_eq!(time_ago(now() - Duration::hours(5), now()), "1 day ago");
        assert_eq!(time_ago(now() - Duration::days(3), now()), "3 days ago");
        assert_eq!(time_ago(now() - Duration::days(8), now()), "2 weeks ago");
        assert_eq!(time_ago(now() - Duration::days(45), now()), "2 months ago");
        assert_eq!(time_ago(now() - Duration::days(400), now()), "2 years ago");
        assert_eq!(time_ago(now(), now()), "0 days ago");
    }

    #[test]
    fn card_prefers_description_fields() {
        let row = json!({
            "id": "o-1",
            "title": "Base title",
            "opportunity_type": "funding",
            "created_at": "2024-01-01T00:00:00+00:00",
            "applicants": 4,
            "description": {
                "title": "Olive grove grant",
                "description": "**Amount**\n10,000 USD\n**Deadline**\n2024-12-31",
                "location": "",
                "status": "published",
                "created_at": "2024-05-29T12:00:00+00:00",
                "user_id": "ngo-user-1",
                "metadata": null
            }
        });
        let card = listing_card(&row, now());
        assert_eq!(card["title"], "Olive grove grant");
        assert_eq!(card["category"], "funding");
        assert_eq!(card["type"], "Grant");
        assert_eq!(card["location"], "Not specified");
        assert_eq!(card["compensation"], "10,000 USD");
        assert_eq!(card["deadline"], "2024-12-31");
        assert_eq!(card["posted"], "3 days ago");
        assert_eq!(card["status"], "active");
        assert_eq!(card["applicants"], 4);
        assert_eq!(card["ngoUserId"], "ngo-user-1");
        assert_eq!(card["metadata"], json!({}));
    }

    #[test]
    fn card_without_description_falls_back() {
        let row = json!({"id": "o-2", "title": "Base title", "opportunity_type": "job", "created_at": "2024-05-31T12:00:00+00:00", "description": null});
        let card = listing_card(&row, now());
        assert_eq!(card["title"], "Base title");
        assert_eq!(card["description"], "");
        assert_eq!(card["compensation"], "Competitive");
        assert_eq!(card["deadline"], Value::Null);
        assert_eq!(card["posted"], "1 day ago");
        assert_eq!(card["status"], "suspended");
        assert_eq!(card["applicants"], 0);
    }
}
