// services/extraction.rs - Full-content extraction for scraped opportunity links
//
// Each requested link is processed on its own: a failure becomes an error
// item in the report and the batch carries on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::database::query_builder::QueryBuilder;
use crate::database::{DatabaseError, DatabaseManager};
use crate::services::scraper_client::{ScrapedFields, ScraperBackend};
use crate::types::{ExtractionStatus, OpportunityType};

pub const EXTRACTED_TABLE: &str = "extracted_opportunity_content";

const TITLE_SNIPPET_CHARS: usize = 180;
const END_MARKERS: &[&str] = &[
    "\napply now",
    "\napply ",
    "\napply\n",
    " apply now",
    " apply ",
    " apply\n",
    "[apply",
    "apply now",
    "apply today",
    "apply",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRequestItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub opportunity_type: Option<String>,
    #[serde(default)]
    pub scraped_opportunity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedItem {
    pub id: Value,
    pub title: Value,
    pub url: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_status: Option<ExtractionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub results: Vec<ExtractedItem>,
    pub errors: Vec<ExtractionFailure>,
}

/// Where extraction rows live
#[async_trait]
pub trait ExtractionStore: Send + Sync {
    /// Id of an existing row for this source URL
    async fn find_by_source_url(&self, url: &str) -> Result<Option<Value>, DatabaseError>;

    async fn insert(&self, record: Map<String, Value>) -> Result<Value, DatabaseError>;
}

pub struct PgExtractionStore;

#[async_trait]
impl ExtractionStore for PgExtractionStore {
    async fn find_by_source_url(&self, url: &str) -> Result<Option<Value>, DatabaseError> {
        let pool = DatabaseManager::main_pool()?;
        let row = QueryBuilder::table(EXTRACTED_TABLE)?
            .select(&["id"])?
            .where_clause(json!({ "source_url": url }))?
            .fetch_optional(&pool)
            .await?;
        Ok(row.and_then(|r| r.get("id").cloned()))
    }

    async fn insert(&self, record: Map<String, Value>) -> Result<Value, DatabaseError> {
        let pool = DatabaseManager::main_pool()?;
        QueryBuilder::table(EXTRACTED_TABLE)?.insert(&pool, &record).await
    }
}

/// Keeps the part of `raw` that runs from the opportunity title to the first
/// "apply" call to action. Returns `raw` unchanged when the title is not
/// found or the cut would keep less than `min(500, 10% of raw)` characters.
pub fn extract_opportunity_section(raw: &str, title: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let (lower, offsets) = fold_case(raw);
    let snippet: String = title.to_lowercase().chars().take(TITLE_SNIPPET_CHARS).collect();
    if snippet.is_empty() {
        return raw.to_string();
    }
    let Some(start) = lower.find(&snippet) else {
        return raw.to_string();
    };

    let search_from = start + snippet.len();
    let end = END_MARKERS
        .iter()
        .filter_map(|marker| lower[search_from..].find(marker).map(|idx| search_from + idx))
        .min();

    let sliced = match end {
        Some(end) => &raw[offsets[start]..offsets[end]],
        None => &raw[offsets[start]..],
    };
    let trimmed = sliced.trim();

    let raw_chars = raw.chars().count() as f64;
    let floor = f64::min(500.0, raw_chars * 0.1);
    if (trimmed.chars().count() as f64) < floor {
        return raw.to_string();
    }
    trimmed.to_string()
}

/// Unicode lowercase of `raw`, plus the byte offset in `raw` of the
/// character behind every byte of the folded text (and one past the end).
fn fold_case(raw: &str) -> (String, Vec<usize>) {
    let mut lower = String::with_capacity(raw.len());
    let mut offsets = Vec::with_capacity(raw.len() + 1);
    for (idx, ch) in raw.char_indices() {
        for folded in ch.to_lowercase() {
            lower.push(folded);
            offsets.extend(std::iter::repeat(idx).take(folded.len_utf8()));
        }
    }
    offsets.push(raw.len());
    (lower, offsets)
}

/// Normalized main info used for the table columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MainInfo {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub job_type: Option<String>,
    pub deadline: Option<String>,
}

fn first_text(data: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match data.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub fn normalize_main_info(data: &Map<String, Value>, fallback_title: &str) -> MainInfo {
    MainInfo {
        title: first_text(data, &["title"]).unwrap_or_else(|| fallback_title.to_string()),
        company: first_text(data, &["company", "organization", "provider"]),
        location: first_text(data, &["location"]),
        salary_range: first_text(data, &["salary_range", "salary", "amount", "cost"]),
        job_type: first_text(data, &["contract_type", "job_type", "employment_type"]),
        deadline: first_text(data, &["deadline", "application_deadline"]).and_then(|d| parse_deadline(&d)),
    }
}

/// Recognizable deadline text as `YYYY-MM-DD`
pub fn parse_deadline(raw: &str) -> Option<String> {
    let text = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc).format("%Y-%m-%d").to_string());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ts.format("%Y-%m-%d").to_string());
        }
    }
    for fmt in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Runs the pipeline for every requested item in order
pub async fn run_extraction(
    items: &[ExtractRequestItem],
    scraper: &dyn ScraperBackend,
    store: &dyn ExtractionStore,
    now: DateTime<Utc>,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    for item in items {
        if let Err(error) = extract_one(item, scraper, store, now, &mut report).await {
            warn!("Extraction failed for {:?}: {}", item.url, error);
            report.errors.push(ExtractionFailure {
                id: None,
                title: item.title.clone(),
                url: item.url.clone(),
                error,
            });
        }
    }
    report
}

async fn extract_one(
    item: &ExtractRequestItem,
    scraper: &dyn ScraperBackend,
    store: &dyn ExtractionStore,
    now: DateTime<Utc>,
    report: &mut ExtractionReport,
) -> Result<(), String> {
    let url = match item.url.as_deref() {
        Some(url) if url.starts_with("http") => url,
        _ => return Err("Invalid URL".to_string()),
    };
    // Unrecognized types still extract, with the job field set
    let opportunity_type = item.opportunity_type.as_deref().and_then(|t| t.parse::<OpportunityType>().ok());
    let main_info_fields = opportunity_type.unwrap_or(OpportunityType::Job).main_info_fields();
    let stored_type = match opportunity_type {
        Some(t) => json!(t),
        None => json!(item.opportunity_type),
    };
    let request_title = item.title.clone().unwrap_or_default();

    if let Some(id) = store.find_by_source_url(url).await.map_err(|e| e.to_string())? {
        report.results.push(ExtractedItem {
            id,
            title: json!(item.title),
            url: url.to_string(),
            status: "already_extracted",
            message: Some("Content already extracted for this URL"),
            extraction_status: None,
            content_length: None,
        });
        return Ok(());
    }

    let raw_content = match scraper.raw_content(url).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Raw content unavailable for {}: {}", url, e);
            String::new()
        }
    };
    let filtered = extract_opportunity_section(&raw_content, &request_title);
    info!(
        "Fetched raw content for {}: {} characters, {} after filtering",
        url,
        raw_content.chars().count(),
        filtered.chars().count()
    );

    let scraped = scraper.scrape(url, main_info_fields).await;

    let mut record = Map::new();
    record.insert("opportunity_type".into(), stored_type);
    record.insert("source_url".into(), json!(url));
    record.insert("scraped_opportunity_id".into(), json!(item.scraped_opportunity_id));
    record.insert("extracted_at".into(), json!(now.to_rfc3339()));

    let fields = match scraped {
        Err(e) if raw_content.is_empty() => {
            record.insert("title".into(), json!(item.title));
            record.insert("extraction_status".into(), json!(ExtractionStatus::Failed));
            record.insert("extraction_error".into(), json!(e.to_string()));
            let failed = store.insert(record).await.map_err(|e| e.to_string())?;
            report.errors.push(ExtractionFailure {
                id: failed.get("id").cloned(),
                title: item.title.clone(),
                url: Some(url.to_string()),
                error: e.to_string(),
            });
            return Ok(());
        }
        Err(e) => {
            warn!("Structured scrape failed for {}, keeping raw content: {}", url, e);
            ScrapedFields::default()
        }
        Ok(fields) => fields,
    };

    let main = normalize_main_info(&fields.data, &request_title);
    let content = if !filtered.is_empty() { Some(filtered.clone()) } else { None };

    let mut structured = fields.data.clone();
    structured.insert("raw_content_length".into(), json!(raw_content.chars().count()));
    structured.insert("filtered_content_length".into(), json!(filtered.chars().count()));

    record.insert("title".into(), json!(main.title));
    record.insert("raw_content".into(), json!(content));
    record.insert("description".into(), json!(content));
    record.insert("structured_content".into(), Value::Object(structured));
    record.insert("company".into(), json!(main.company));
    record.insert("location".into(), json!(main.location));
    record.insert("salary_range".into(), json!(main.salary_range));
    record.insert("job_type".into(), json!(main.job_type));
    record.insert("deadline".into(), json!(main.deadline));
    record.insert("extraction_status".into(), json!(ExtractionStatus::Completed));
    record.insert("model_used".into(), json!(format!("raw-content + {}", scraper.model())));
    record.insert("extraction_cost".into(), json!(fields.total_cost));

    let inserted = store.insert(record).await.map_err(|e| e.to_string())?;
    report.results.push(ExtractedItem {
        id: inserted.get("id").cloned().unwrap_or(Value::Null),
        title: inserted.get("title").cloned().unwrap_or(Value::Null),
        url: url.to_string(),
        status: "extracted",
        message: None,
        extraction_status: Some(ExtractionStatus::Completed),
        content_length: Some(raw_content.chars().count()),
    });
    Ok(())
}
