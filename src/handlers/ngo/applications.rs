// handlers/ngo/applications.rs - /api/ngo/applications

use axum::{
    extract::Query,
    http::{HeaderMap, Uri},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::{column_strings, id_field, now_iso, pool, single_row, text_field};
use crate::middleware::{AuthUser, JsonBody};
use crate::services::ngo::{group_applications, ApplicationRows};

const APPLICATION_COLUMNS: &[&str] = &[
    "id",
    "opportunity_id",
    "seeker_user_id",
    "form_id",
    "application_data",
    "selected_cv_id",
    "selected_cv_name",
    "status",
    "submitted_at",
    "updated_at",
    "notes",
];

#[derive(Debug, Deserialize)]
pub struct NgoQuery {
    #[serde(rename = "ngoUserId")]
    pub ngo_user_id: Option<String>,
}

async fn fetch_in(
    pool: &PgPool,
    table: &str,
    columns: &[&str],
    field: &str,
    ids: &[String],
    order: Option<&str>,
    failure: &'static str,
) -> Result<Vec<Value>, ApiError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = QueryBuilder::table(table)
        .and_then(|q| q.select(columns))
        .and_then(|q| q.where_clause(json!({ field: { "$in": ids } })))
        .map_err(ApiError::from_db(failure))?;
    if let Some(order) = order {
        query = query.order(order).map_err(ApiError::from_db(failure))?;
    }
    query.fetch_all(pool).await.map_err(ApiError::from_db(failure))
}

/// GET - applications to the NGO's published opportunities, grouped per
/// opportunity. The NGO is `?ngoUserId=`, else the caller.
pub async fn list(
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<NgoQuery>,
) -> Result<Json<Value>, ApiError> {
    let ngo_user_id = match query.ngo_user_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => AuthUser::resolve(&headers, &uri)
            .await?
            .map(|user| user.id)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized - No user ID provided"))?,
    };
    let pool = pool()?;

    let descriptions = QueryBuilder::table("opportunity_description")
        .and_then(|q| q.select(&["opportunity_id", "title", "description", "location", "status", "created_at", "user_id"]))
        .and_then(|q| q.where_clause(json!({ "user_id": ngo_user_id, "status": "published" })))
        .map_err(ApiError::from_db("Failed to fetch opportunity descriptions"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch opportunity descriptions"))?;
    let opportunity_ids = column_strings(&descriptions, "opportunity_id");
    if opportunity_ids.is_empty() {
        return Ok(Json(json!({ "opportunities": [] })));
    }

    let opportunities = fetch_in(
        &pool,
        "opportunities",
        &["id", "title", "opportunity_type", "created_at"],
        "id",
        &opportunity_ids,
        Some("created_at desc"),
        "Failed to fetch opportunities",
    )
    .await?;
    if opportunities.is_empty() {
        return Ok(Json(json!({ "opportunities": [] })));
    }

    let applications = fetch_in(
        &pool,
        "opportunity_applications",
        APPLICATION_COLUMNS,
        "opportunity_id",
        &opportunity_ids,
        Some("submitted_at desc"),
        "Failed to fetch applications",
    )
    .await?;
    let forms = fetch_in(
        &pool,
        "forms_templates",
        &["id", "title", "description", "sections"],
        "id",
        &column_strings(&applications, "form_id"),
        None,
        "Failed to fetch applications",
    )
    .await?;
    // Missing applicant details leave `seeker_profile` null
    let seekers = fetch_in(
        &pool,
        "users",
        &["id", "full_name", "email", "user_type", "created_at"],
        "id",
        &column_strings(&applications, "seeker_user_id"),
        None,
        "Failed to fetch applicants",
    )
    .await
    .unwrap_or_else(|e| {
        tracing::warn!("Applicant lookup failed: {}", e.message());
        Vec::new()
    });

    let rows = ApplicationRows { descriptions, opportunities, applications, forms, seekers };
    Ok(Json(json!({ "opportunities": group_applications(&rows) })))
}

/// Status change for an application: `{applicationId, status, notes}`
pub fn status_update(body: &Value) -> Result<(String, Map<String, Value>), ApiError> {
    let (Some(id), Some(status)) = (id_field(body, "applicationId"), text_field(body, "status")) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    let mut updates = Map::new();
    updates.insert("status".into(), json!(status));
    updates.insert("notes".into(), json!(text_field(body, "notes").unwrap_or_default()));
    updates.insert("updated_at".into(), json!(now_iso()));
    Ok((id, updates))
}

/// PUT - review an application
pub async fn update_status(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let (id, updates) = status_update(&body)?;
    let pool = pool()?;
    let rows = QueryBuilder::table("opportunity_applications")
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to update application status"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update application status"))?;

    Ok(Json(json!({ "application": single_row(rows, "Application not found")? })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_updates_need_id_and_status() {
        let err = status_update(&json!({"applicationId": "a-1"})).unwrap_err();
        assert_eq!(err.message(), "Missing required fields");
        let err = status_update(&json!({"status": "accepted"})).unwrap_err();
        assert_eq!(err.message(), "Missing required fields");

        let (id, updates) = status_update(&json!({"applicationId": "a-1", "status": "accepted"})).unwrap();
        assert_eq!(id, "a-1");
        assert_eq!(updates["status"], "accepted");
        assert_eq!(updates["notes"], "");
        assert!(updates.contains_key("updated_at"));

        let (_, updates) = status_update(&json!({"applicationId": 7, "status": "rejected", "notes": "Too junior"})).unwrap();
        assert_eq!(updates["notes"], "Too junior");
    }
}
