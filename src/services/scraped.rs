// services/scraped.rs - Rows saved from a scraper run
//
// A scraped item is free-form JSON; these helpers pick its link and split it
// into the `scraped_opportunities` row and its details row.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::services::extraction::parse_deadline;
use crate::types::{OpportunityType, ScrapedStatus};

pub const SCRAPED_TABLE: &str = "scraped_opportunities";
pub const DETAILS_TABLE: &str = "scraped_opportunity_details";
pub const COMPLETE_VIEW: &str = "scraped_opportunities_complete";

pub const UNTITLED: &str = "Untitled Opportunity";

const LINK_FIELDS: &[&str] = &[
    "url",
    "link",
    "href",
    "apply_url",
    "detail_url",
    "application_url",
    "job_url",
    "opportunity_url",
    "source_url",
];

fn link_like(value: &Value) -> Option<&str> {
    value.as_str().filter(|v| v.starts_with("http") || v.starts_with('/'))
}

/// The item's own link: a known link field first, then any key naming a
/// url, link or href, then any string value starting with `http`
pub fn job_url(job: &Map<String, Value>) -> Option<String> {
    LINK_FIELDS
        .iter()
        .find_map(|field| job.get(*field).and_then(link_like))
        .or_else(|| {
            job.iter()
                .filter(|(key, _)| {
                    let key = key.to_lowercase();
                    key.contains("url") || key.contains("link") || key.contains("href")
                })
                .find_map(|(_, value)| link_like(value))
        })
        .or_else(|| job.values().filter_map(Value::as_str).find(|v| v.starts_with("http")))
        .map(str::to_string)
}

fn non_empty(job: &Map<String, Value>, key: &str) -> Value {
    match job.get(key) {
        Some(Value::String(s)) if s.is_empty() => Value::Null,
        Some(Value::Bool(false)) | None => Value::Null,
        Some(v) => v.clone(),
    }
}

/// Row for `scraped_opportunities`
pub fn scraped_record(
    job: &Map<String, Value>,
    opportunity_type: OpportunityType,
    link: &str,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let title = job
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED);
    let mut record = Map::new();
    record.insert("title".into(), json!(title));
    record.insert("opportunity_type".into(), json!(opportunity_type.as_str()));
    record.insert("source_url".into(), json!(link));
    record.insert("status".into(), json!(ScrapedStatus::Active.as_str()));
    record.insert("scraped_at".into(), json!(now.to_rfc3339()));
    record
}

/// Row for `scraped_opportunity_details`; the whole item is kept under
/// `metadata.original_data`
pub fn details_record(job: &Map<String, Value>, scraped_id: &Value, link: &str) -> Map<String, Value> {
    let deadline = job.get("deadline").and_then(Value::as_str).and_then(parse_deadline);
    let mut record = Map::new();
    record.insert("scraped_opportunity_id".into(), scraped_id.clone());
    for key in ["description", "location", "company", "requirements", "benefits", "salary_range", "tags"] {
        record.insert(key.into(), non_empty(job, key));
    }
    record.insert("deadline".into(), json!(deadline));
    record.insert(
        "metadata".into(),
        json!({
            "job_type": job.get("job_type"),
            "link": link,
            "original_data": job,
        }),
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn known_link_fields_win() {
        let item = job(json!({"title": "x", "apply_url": "https://a.org/apply", "url": "not a link"}));
        assert_eq!(job_url(&item).as_deref(), Some("https://a.org/apply"));

        let item = job(json!({"link": "/jobs/42"}));
        assert_eq!(job_url(&item).as_deref(), Some("/jobs/42"));
    }

    #[test]
    fn link_falls_back_to_named_keys_then_any_http_value() {
        let item = job(json!({"title": "x", "detailsLink": "https://b.org/d/1"}));
        assert_eq!(job_url(&item).as_deref(), Some("https://b.org/d/1"));

        let item = job(json!({"title": "x", "more": "https://c.org/page"}));
        assert_eq!(job_url(&item).as_deref(), Some("https://c.org/page"));

        assert_eq!(job_url(&job(json!({"title": "Only a title"}))), None);
    }

    #[test]
    fn records_split_the_item() {
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 9, 30, 0).unwrap();
        let item = job(json!({
            "title": "",
            "company": "Olive Co",
            "deadline": "March 15, 2025",
            "job_type": "Contract",
            "tags": ["agri"],
            "benefits": ""
        }));

        let main = scraped_record(&item, OpportunityType::Job, "https://src.org", now);
        assert_eq!(main["title"], UNTITLED);
        assert_eq!(main["status"], "active");
        assert_eq!(main["opportunity_type"], "job");

        let details = details_record(&item, &json!("s-1"), "https://src.org");
        assert_eq!(details["scraped_opportunity_id"], "s-1");
        assert_eq!(details["company"], "Olive Co");
        assert_eq!(details["deadline"], "2025-03-15");
        assert_eq!(details["benefits"], Value::Null);
        assert_eq!(details["tags"], json!(["agri"]));
        assert_eq!(details["metadata"]["job_type"], "Contract");
        assert_eq!(details["metadata"]["link"], "https://src.org");
        assert_eq!(details["metadata"]["original_data"]["company"], "Olive Co");
    }
}
