// handlers/ngo/profile.rs - GET /api/ngo-profile/:id

use axum::{extract::Path, Json};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::pool;

const PROFILE_TABLE: &str = "ngo_profile";

async fn children(pool: &PgPool, table: &str, profile_id: &Value) -> Vec<Value> {
    let rows = match QueryBuilder::table(table).and_then(|q| q.where_clause(json!({ "profile_id": profile_id }))) {
        Ok(q) => q.fetch_all(pool).await,
        Err(e) => Err(e),
    };
    rows.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch {} for profile {}: {}", table, profile_id, e);
        Vec::new()
    })
}

/// The profile matching `conditions` with its `additional_info` and
/// `documents` arrays, or `None` when no profile matches
pub async fn load_full_profile(pool: &PgPool, conditions: Value) -> Result<Option<Value>, ApiError> {
    let profile = QueryBuilder::table(PROFILE_TABLE)
        .and_then(|q| q.where_clause(conditions))
        .map_err(ApiError::from_db("Failed to fetch NGO profile"))?
        .fetch_optional(pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch NGO profile"))?;
    let Some(mut profile) = profile else {
        return Ok(None);
    };

    let id = profile["id"].clone();
    let (additional_info, documents) = futures::join!(
        children(pool, "additional_info", &id),
        children(pool, "documents", &id),
    );
    profile["additional_info"] = Value::Array(additional_info);
    profile["documents"] = Value::Array(documents);
    Ok(Some(profile))
}

pub async fn get_profile(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    load_full_profile(&pool, json!({ "id": id }))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("NGO profile not found"))
}
