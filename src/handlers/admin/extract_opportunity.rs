// handlers/admin/extract_opportunity.rs - /api/admin/extract-opportunity[/:id]

use axum::{
    extract::{Path, Query},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::config;
use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::{now_iso, page_bounds, pool, single_row};
use crate::middleware::JsonBody;
use crate::services::extraction::{run_extraction, ExtractRequestItem, PgExtractionStore, EXTRACTED_TABLE};
use crate::services::scraper_client::ScraperClient;
use crate::types::{ExtractionStatus, OpportunityType};

const DEFAULT_LIMIT: i64 = 50;

/// Columns an admin may edit after extraction
const EDITABLE_FIELDS: &[&str] = &[
    "title",
    "description",
    "company",
    "location",
    "salary_range",
    "job_type",
    "deadline",
    "requirements",
    "benefits",
    "responsibilities",
    "qualifications",
    "application_instructions",
    "contact_info",
    "raw_content",
    "content_polished_at",
];

pub fn routes() -> Router {
    Router::new()
        .route("/api/admin/extract-opportunity", get(list).post(extract))
        .route(
            "/api/admin/extract-opportunity/:id",
            get(get_extracted).patch(update).delete(delete),
        )
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub opportunities: Option<Vec<ExtractRequestItem>>,
}

/// POST - extract full content for each listed link, one at a time
pub async fn extract(JsonBody(body): JsonBody<ExtractRequest>) -> Result<Json<Value>, ApiError> {
    let items = body
        .opportunities
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ApiError::bad_request("Opportunities array is required"))?;

    let scraper = ScraperClient::new(&config().scraper).map_err(|e| {
        tracing::error!("Failed to build scraper client: {}", e);
        ApiError::internal_server_error("Internal server error")
    })?;
    let report = run_extraction(&items, &scraper, &PgExtractionStore, Utc::now()).await;

    tracing::info!(
        extracted = report.results.len(),
        failed = report.errors.len(),
        "Extraction batch of {} finished",
        items.len()
    );
    let mut response = json!({
        "success": true,
        "extracted": report.results.len(),
        "total": items.len(),
        "results": report.results,
    });
    if !report.errors.is_empty() {
        response["errors"] = json!(report.errors);
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub opportunity_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListQuery {
    /// Filters for the values that name a known type or status
    pub fn conditions(&self) -> Value {
        let mut conditions = Map::new();
        if let Some(kind) = self.opportunity_type.as_deref().and_then(|t| t.parse::<OpportunityType>().ok()) {
            conditions.insert("opportunity_type".into(), json!(kind.as_str()));
        }
        if let Some(status) = self.status.as_deref().and_then(|s| s.parse::<ExtractionStatus>().ok()) {
            conditions.insert("extraction_status".into(), json!(status.as_str()));
        }
        Value::Object(conditions)
    }

    /// Page actually applied, with the limit capped at `max_limit`
    pub fn page(&self, max_limit: i64) -> (i64, i64) {
        page_bounds(self.limit.as_deref(), self.offset.as_deref(), DEFAULT_LIMIT, max_limit)
    }
}

/// GET - newest first with the total matching count
pub async fn list(Query(query): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    let (limit, offset) = query.page(config().api.max_page_size);
    let pool = pool()?;
    let base = QueryBuilder::table(EXTRACTED_TABLE)
        .and_then(|q| q.where_clause(query.conditions()))
        .map_err(ApiError::from_db("Failed to fetch extracted opportunities"))?;

    let data = base
        .clone()
        .order("created_at desc")
        .and_then(|q| q.limit(limit, Some(offset)))
        .map_err(ApiError::from_db("Failed to fetch extracted opportunities"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch extracted opportunities"))?;
    let total = base
        .count(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch extracted opportunities"))?;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

pub async fn get_extracted(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let data = QueryBuilder::table(EXTRACTED_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to fetch extracted opportunity"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch extracted opportunity"))?
        .ok_or_else(|| ApiError::not_found("Opportunity not found"))?;

    Ok(Json(json!({ "success": true, "data": data })))
}

/// Editable fields present in `body`, stamped with `updated_at`
pub fn editable_updates(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let mut updates: Map<String, Value> = EDITABLE_FIELDS
        .iter()
        .filter_map(|field| body.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect();
    if updates.is_empty() {
        return Err(ApiError::bad_request("No valid fields to update"));
    }
    updates.insert("updated_at".into(), json!(now_iso()));
    Ok(updates)
}

pub async fn update(Path(id): Path<String>, JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let updates = editable_updates(&body)?;
    let pool = pool()?;
    let rows = QueryBuilder::table(EXTRACTED_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to update opportunity"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update opportunity"))?;

    Ok(Json(json!({ "success": true, "data": single_row(rows, "Opportunity not found")? })))
}

pub async fn delete(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    QueryBuilder::table(EXTRACTED_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to delete opportunity"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete opportunity"))?;

    Ok(Json(json!({ "success": true, "message": "Opportunity deleted successfully" })))
}
