// handlers/admin/scraped_opportunities.rs - /api/admin/scraped-opportunities[/bulk]
//
// Review queue for listings saved from scraper runs.

use axum::{
    extract::Query,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::config;
use crate::database::query_builder::QueryBuilder;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{id_field, now_iso, page_bounds, pool, single_row, text_field};
use crate::middleware::JsonBody;
use crate::services::scraped::{
    details_record, job_url, scraped_record, COMPLETE_VIEW, DETAILS_TABLE, SCRAPED_TABLE,
};
use crate::types::{OpportunityType, ScrapedStatus};

const DEFAULT_LIMIT: i64 = 50;

pub fn routes() -> Router {
    Router::new()
        .route(
            "/api/admin/scraped-opportunities",
            get(list).patch(update_status).delete(delete),
        )
        .route(
            "/api/admin/scraped-opportunities/bulk",
            post(bulk_save).delete(bulk_delete),
        )
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
    /// Status filter (default `active`) plus the type when it is a known one
    pub fn conditions(&self) -> Value {
        let mut conditions = Map::new();
        let status = self.status.as_deref().filter(|s| !s.is_empty()).unwrap_or(ScrapedStatus::Active.as_str());
        conditions.insert("status".into(), json!(status));
        if let Some(kind) = self.opportunity_type.as_deref().and_then(|t| t.parse::<OpportunityType>().ok()) {
            conditions.insert("opportunity_type".into(), json!(kind.as_str()));
        }
        Value::Object(conditions)
    }
}

/// GET - newest scraped first; the total is counted on the base table
pub async fn list(Query(query): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    const FAILURE: &str = "Failed to fetch scraped opportunities";
    let (limit, offset) = page_bounds(
        query.limit.as_deref(),
        query.offset.as_deref(),
        DEFAULT_LIMIT,
        config().api.max_page_size,
    );
    let pool = pool()?;
    let opportunities = QueryBuilder::table(COMPLETE_VIEW)
        .and_then(|q| q.where_clause(query.conditions()))
        .and_then(|q| q.order("scraped_at desc, created_at desc"))
        .and_then(|q| q.limit(limit, Some(offset)))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;

    let total = match QueryBuilder::table(SCRAPED_TABLE).and_then(|q| q.where_clause(query.conditions())) {
        Ok(q) => q.count(&pool).await,
        Err(e) => Err(e),
    }
    .unwrap_or_else(|e| {
        tracing::error!("Error counting scraped opportunities: {}", e);
        0
    });

    Ok(Json(json!({
        "opportunities": opportunities,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

/// PATCH body `{id, status}`
pub async fn update_status(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let (Some(id), Some(status)) = (id_field(&body, "id"), text_field(&body, "status")) else {
        return Err(ApiError::bad_request("ID and status are required"));
    };
    let status: ScrapedStatus = status.parse().map_err(|_| ApiError::bad_request("Invalid status"))?;

    let mut updates = Map::new();
    updates.insert("status".into(), json!(status.as_str()));
    updates.insert("updated_at".into(), json!(now_iso()));

    let pool = pool()?;
    let rows = QueryBuilder::table(SCRAPED_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to update opportunity"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update opportunity"))?;

    Ok(Json(json!({ "opportunity": single_row(rows, "Opportunity not found")? })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

pub async fn delete(Query(query): Query<DeleteQuery>) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Opportunity ID is required"))?;
    let pool = pool()?;
    QueryBuilder::table(SCRAPED_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to delete opportunity"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete opportunity"))?;

    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct BulkSaveRequest {
    #[serde(default)]
    pub opportunities: Option<Vec<Value>>,
    #[serde(default)]
    pub opportunity_type: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Validated bulk save input: items, type and fallback link
pub fn validate_bulk(body: BulkSaveRequest) -> Result<(Vec<Value>, OpportunityType, String), ApiError> {
    let items = body
        .opportunities
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ApiError::bad_request("Opportunities array is required"))?;
    let opportunity_type = body
        .opportunity_type
        .as_deref()
        .and_then(|t| t.parse::<OpportunityType>().ok())
        .ok_or_else(|| ApiError::bad_request("Valid opportunity_type is required (job, funding, training)"))?;
    let source_url = body
        .source_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("Source URL is required"))?;
    Ok((items, opportunity_type, source_url))
}

/// Saves one item and its details in a single transaction
async fn save_item(
    pool: &sqlx::PgPool,
    job: &Map<String, Value>,
    opportunity_type: OpportunityType,
    source_url: &str,
) -> Result<Value, DatabaseError> {
    let link = job_url(job).unwrap_or_else(|| source_url.to_string());
    let mut tx = pool.begin().await?;
    let main = QueryBuilder::table(SCRAPED_TABLE)?
        .insert(&mut *tx, &scraped_record(job, opportunity_type, &link, Utc::now()))
        .await?;
    QueryBuilder::table(DETAILS_TABLE)?
        .insert(&mut *tx, &details_record(job, &main["id"], &link))
        .await?;
    tx.commit().await?;
    Ok(main["id"].clone())
}

/// POST /bulk - each item is saved on its own; failures are collected
pub async fn bulk_save(JsonBody(body): JsonBody<BulkSaveRequest>) -> Result<Json<Value>, ApiError> {
    let (items, opportunity_type, source_url) = validate_bulk(body)?;
    let pool = pool()?;

    let mut saved = Vec::new();
    let mut errors = Vec::new();
    for item in &items {
        let title = item.get("title").cloned().unwrap_or(Value::Null);
        let Some(job) = item.as_object() else {
            errors.push(json!({ "title": title, "error": "Opportunity must be an object" }));
            continue;
        };
        match save_item(&pool, job, opportunity_type, &source_url).await {
            Ok(id) => saved.push(json!({ "id": id, "title": title })),
            Err(e) => {
                tracing::warn!("Failed to save scraped opportunity {}: {}", title, e);
                errors.push(json!({ "title": title, "error": e.to_string() }));
            }
        }
    }

    tracing::info!(saved = saved.len(), failed = errors.len(), "Bulk save from {}", source_url);
    let mut response = json!({
        "success": true,
        "saved": saved.len(),
        "total": items.len(),
        "savedOpportunities": saved,
    });
    if !errors.is_empty() {
        response["errors"] = json!(errors);
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub ids: Option<Vec<Value>>,
}

/// DELETE /bulk body `{ids}`
pub async fn bulk_delete(JsonBody(body): JsonBody<BulkDeleteRequest>) -> Result<Json<Value>, ApiError> {
    let ids = body
        .ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::bad_request("IDs array is required"))?;
    let pool = pool()?;
    QueryBuilder::table(SCRAPED_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": { "$in": ids } })))
        .map_err(ApiError::from_db("Failed to delete opportunities"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete opportunities"))?;

    Ok(Json(json!({ "success": true, "deleted": ids.len() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(value: Value) -> BulkSaveRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn list_defaults_to_active() {
        let query = ListQuery { opportunity_type: Some("training".into()), status: None, limit: None, offset: None };
        assert_eq!(query.conditions(), json!({"status": "active", "opportunity_type": "training"}));

        let query = ListQuery { opportunity_type: Some("gig".into()), status: Some("archived".into()), limit: None, offset: None };
        assert_eq!(query.conditions(), json!({"status": "archived"}));
    }

    #[test]
    fn bulk_input_is_checked_in_order() {
        let err = validate_bulk(bulk(json!({"opportunities": []}))).unwrap_err();
        assert_eq!(err.message(), "Opportunities array is required");

        let err = validate_bulk(bulk(json!({"opportunities": [{}], "opportunity_type": "gig"}))).unwrap_err();
        assert_eq!(err.message(), "Valid opportunity_type is required (job, funding, training)");

        let err = validate_bulk(bulk(json!({"opportunities": [{}], "opportunity_type": "job"}))).unwrap_err();
        assert_eq!(err.message(), "Source URL is required");

        let (items, kind, url) = validate_bulk(bulk(json!({
            "opportunities": [{"title": "A"}],
            "opportunity_type": "funding",
            "source_url": "https://grants.example.org"
        })))
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(kind, OpportunityType::Funding);
        assert_eq!(url, "https://grants.example.org");
    }
}
