// handlers/admin/saved_sources.rs - /api/admin/saved-sources[/:id]
//
// Listing pages registered for the external scraper.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::error::ApiError;
use crate::handlers::utils::{now_iso, pool, single_row};
use crate::middleware::JsonBody;
use crate::types::OpportunityType;

const SOURCES_TABLE: &str = "saved_sources";

/// Columns a PUT may change
const UPDATABLE_FIELDS: &[&str] = &[
    "name",
    "url",
    "description",
    "opportunity_type",
    "fields",
    "use_pagination",
    "pagination_details",
    "is_active",
];

const RECORD_SCRAPE_SQL: &str = r#"
UPDATE "saved_sources"
SET last_scraped_at = now(),
    scrape_count = COALESCE(scrape_count, 0) + 1,
    updated_at = now()
WHERE id::text = $1
RETURNING row_to_json("saved_sources".*) AS row"#;

pub fn routes() -> Router {
    Router::new()
        .route("/api/admin/saved-sources", get(list).post(create))
        .route(
            "/api/admin/saved-sources/:id",
            get(get_source).put(update).delete(delete).patch(record_scrape),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub opportunity_type: Option<String>,
    pub is_active: Option<String>,
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn or_default(value: Option<&Value>, default: Value) -> Value {
    match value {
        Some(v) if truthy(Some(v)) => v.clone(),
        _ => default,
    }
}

fn validate_type(value: &Value) -> Result<(), ApiError> {
    value
        .as_str()
        .and_then(|t| t.parse::<OpportunityType>().ok())
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request("Invalid opportunity type. Must be job, funding, or training"))
}

fn validate_url(value: &Value) -> Result<(), ApiError> {
    value
        .as_str()
        .and_then(|u| url::Url::parse(u).ok())
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request("Invalid URL format"))
}

/// Validated row for a new source
pub fn new_source_record(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let missing: Vec<&str> = ["name", "url", "opportunity_type"]
        .into_iter()
        .filter(|field| !truthy(body.get(*field)))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::missing_fields("Name, URL, and opportunity type are required", &missing));
    }
    validate_type(&body["opportunity_type"])?;
    validate_url(&body["url"])?;

    let mut record = Map::new();
    record.insert("name".into(), body["name"].clone());
    record.insert("url".into(), body["url"].clone());
    record.insert("description".into(), or_default(body.get("description"), Value::Null));
    record.insert("opportunity_type".into(), body["opportunity_type"].clone());
    record.insert("fields".into(), or_default(body.get("fields"), json!([])));
    record.insert("use_pagination".into(), or_default(body.get("use_pagination"), json!(false)));
    record.insert("pagination_details".into(), or_default(body.get("pagination_details"), Value::Null));
    record.insert("is_active".into(), json!(true));
    record.insert("scrape_count".into(), json!(0));
    Ok(record)
}

/// Validated updates from the fields present in `body`
pub fn source_updates(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let mut updates = Map::new();
    for field in UPDATABLE_FIELDS {
        let Some(value) = body.get(*field) else { continue };
        match *field {
            "url" => validate_url(value)?,
            "opportunity_type" => validate_type(value)?,
            _ => {}
        }
        updates.insert(field.to_string(), value.clone());
    }
    updates.insert("updated_at".into(), json!(now_iso()));
    Ok(updates)
}

/// GET - newest first, optionally by type and active flag
pub async fn list(Query(query): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    let mut conditions = Map::new();
    if let Some(kind) = query.opportunity_type.as_deref().and_then(|t| t.parse::<OpportunityType>().ok()) {
        conditions.insert("opportunity_type".into(), json!(kind.as_str()));
    }
    if let Some(active) = query.is_active.as_deref() {
        conditions.insert("is_active".into(), json!(active == "true"));
    }

    let pool = pool()?;
    let sources = QueryBuilder::table(SOURCES_TABLE)
        .and_then(|q| q.where_clause(Value::Object(conditions)))
        .and_then(|q| q.order("created_at desc"))
        .map_err(ApiError::from_db("Failed to fetch saved sources"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch saved sources"))?;

    Ok(Json(json!({ "sources": sources })))
}

/// POST - register a source (201)
pub async fn create(JsonBody(body): JsonBody<Value>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = new_source_record(&body)?;
    let pool = pool()?;
    let source = QueryBuilder::table(SOURCES_TABLE)?
        .insert(&pool, &record)
        .await
        .map_err(ApiError::from_db("Failed to create saved source"))?;

    tracing::info!("Saved scraping source {} ({})", source["id"], source["url"]);
    Ok((StatusCode::CREATED, Json(json!({ "source": source }))))
}

pub async fn get_source(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let source = QueryBuilder::table(SOURCES_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to fetch saved source"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch saved source"))?
        .ok_or_else(|| ApiError::not_found("Source not found"))?;

    Ok(Json(json!({ "source": source })))
}

/// PUT - change the provided fields only
pub async fn update(Path(id): Path<String>, JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let updates = source_updates(&body)?;
    let pool = pool()?;
    let rows = QueryBuilder::table(SOURCES_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to update saved source"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update saved source"))?;

    Ok(Json(json!({ "source": single_row(rows, "Source not found")? })))
}

pub async fn delete(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    QueryBuilder::table(SOURCES_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to delete saved source"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete saved source"))?;

    Ok(Json(json!({ "success": true })))
}

/// PATCH - record that the source was just scraped
pub async fn record_scrape(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let rows = fetch_rows(&pool, RECORD_SCRAPE_SQL, vec![json!(id)])
        .await
        .map_err(ApiError::from_db("Failed to update scrape info"))?;

    Ok(Json(json!({ "source": single_row(rows, "Source not found")? })))
}
