// handlers/admin/ngos.rs - /api/admin/ngos and per-NGO details/approval
//
// The list and the approval decision are admin-only. Profile ids address
// `ngo_profile.id`, except the approval route whose `:id` is the NGO's user
// id, because approval state is mirrored on `ngo_details` and `ngo_profile`.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, Uri},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::error::ApiError;
use crate::handlers::utils::{column_strings, now_iso, pool, single_row, split_id_and_updates};
use crate::middleware::{AdminUser, JsonBody};
use crate::services::ngo::{new_profile_record, ngo_counters, with_counters, ADMIN_LIST_COLUMNS};
use crate::types::ApprovalAction;

const PROFILE_TABLE: &str = "ngo_profile";
const DETAILS_TABLE: &str = "ngo_details";

const PROFILE_WITH_USER_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT p.*,
           CASE WHEN u.id IS NULL THEN NULL
                ELSE json_build_object('full_name', u.full_name, 'email', u.email, 'user_type', u.user_type)
           END AS "user"
    FROM "ngo_profile" p
    LEFT JOIN "users" u ON u.id = p.user_id
    WHERE p.id::text = $1
) _r"#;

pub fn routes() -> Router {
    Router::new()
        .route("/api/admin/ngos", get(list).post(create).patch(update).delete(delete))
        .route("/api/admin/ngos/:id/details", get(details))
        .route("/api/admin/ngos/:id/approval", patch(approval))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

/// Descriptions and applications behind the counters of `user_ids`.
///
/// Counters are advisory: a failed lookup is logged and counts as zero.
async fn counter_rows(pool: &PgPool, user_ids: &[String]) -> (Vec<Value>, Vec<Value>) {
    if user_ids.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let descriptions = match QueryBuilder::table("opportunity_description")
        .and_then(|q| q.select(&["id", "opportunity_id", "status", "user_id"]))
        .and_then(|q| q.where_clause(json!({ "user_id": { "$in": user_ids } })))
    {
        Ok(q) => q.fetch_all(pool).await,
        Err(e) => Err(e),
    };
    let descriptions = descriptions.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch NGO opportunity descriptions: {}", e);
        Vec::new()
    });

    let opportunity_ids = column_strings(&descriptions, "opportunity_id");
    if opportunity_ids.is_empty() {
        return (descriptions, Vec::new());
    }
    let applications = match QueryBuilder::table("opportunity_applications")
        .and_then(|q| q.select(&["id", "opportunity_id"]))
        .and_then(|q| q.where_clause(json!({ "opportunity_id": { "$in": opportunity_ids } })))
    {
        Ok(q) => q.fetch_all(pool).await,
        Err(e) => Err(e),
    };
    let applications = applications.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch NGO applications: {}", e);
        Vec::new()
    });
    (descriptions, applications)
}

/// GET - every NGO profile with activity counters (admin only)
pub async fn list(AdminUser(admin): AdminUser) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let profiles = QueryBuilder::table(PROFILE_TABLE)
        .and_then(|q| q.select(ADMIN_LIST_COLUMNS))
        .and_then(|q| q.order("created_at desc"))
        .map_err(ApiError::from_db("Failed to fetch NGO profiles"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch NGO profiles"))?;

    let user_ids = column_strings(&profiles, "user_id");
    let (descriptions, applications) = counter_rows(&pool, &user_ids).await;

    let ngos: Vec<Value> = profiles
        .into_iter()
        .map(|profile| {
            let user_id = profile.get("user_id").and_then(Value::as_str).unwrap_or_default().to_string();
            with_counters(profile, ngo_counters(&user_id, &descriptions, &applications))
        })
        .collect();

    tracing::debug!("Admin {} listed {} NGO profiles", admin.id, ngos.len());
    let total = ngos.len();
    Ok(Json(json!({ "ngos": ngos, "total": total })))
}

/// POST - create a profile on behalf of an NGO
pub async fn create(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let profile = QueryBuilder::table(PROFILE_TABLE)?
        .insert(&pool, &new_profile_record(&body))
        .await
        .map_err(ApiError::from_db("Failed to create NGO profile"))?;

    tracing::info!("Created NGO profile {}", profile["id"]);
    Ok(Json(json!({ "ngoProfile": profile })))
}

/// PATCH - update a profile by body `id`
pub async fn update(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let (id, mut updates) = split_id_and_updates(body, "NGO ID is required", &[])?;
    updates.insert("updated_at".into(), json!(now_iso()));

    let pool = pool()?;
    let rows = QueryBuilder::table(PROFILE_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to update NGO profile"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update NGO profile"))?;
    let profile = single_row(rows, "NGO profile not found")?;

    Ok(Json(json!({ "ngoProfile": profile })))
}

/// DELETE ?id=
pub async fn delete(Query(query): Query<DeleteQuery>) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("NGO ID is required"))?;

    let pool = pool()?;
    let deleted = QueryBuilder::table(PROFILE_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to delete NGO profile"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete NGO profile"))?;

    tracing::info!("Deleted NGO profile {} ({} rows)", id, deleted);
    Ok(Json(json!({ "success": true })))
}

async fn newest_for_profile(pool: &PgPool, table: &str, profile_id: &str) -> Vec<Value> {
    let rows = match QueryBuilder::table(table)
        .and_then(|q| q.where_clause(json!({ "profile_id": profile_id })))
        .and_then(|q| q.order("created_at desc"))
    {
        Ok(q) => q.fetch_all(pool).await,
        Err(e) => Err(e),
    };
    rows.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch {} for NGO {}: {}", table, profile_id, e);
        Vec::new()
    })
}

/// GET /:id/details - profile, owner, documents and counters
pub async fn details(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let rows = fetch_rows(&pool, PROFILE_WITH_USER_SQL, vec![json!(id)])
        .await
        .map_err(ApiError::from_db("Failed to fetch NGO profile"))?;
    let profile = single_row(rows, "NGO not found")?;

    let (documents, additional_info) = futures::join!(
        newest_for_profile(&pool, "documents", &id),
        newest_for_profile(&pool, "additional_info", &id),
    );

    let user_id = profile.get("user_id").and_then(Value::as_str).unwrap_or_default().to_string();
    let (descriptions, applications) = counter_rows(&pool, &[user_id.clone()]).await;
    let mut ngo = with_counters(profile, ngo_counters(&user_id, &descriptions, &applications));
    ngo["documents"] = Value::Array(documents);
    ngo["additionalInfo"] = Value::Array(additional_info);

    Ok(Json(ngo))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Columns written on both mirrored approval tables
pub fn approval_updates(
    action: ApprovalAction,
    notes: Option<String>,
    admin_id: &str,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let approved = action == ApprovalAction::Approve;
    let mut updates = Map::new();
    updates.insert("approval_status".into(), json!(action.resulting_status().as_str()));
    updates.insert("admin_notes".into(), json!(notes.filter(|n| !n.is_empty())));
    updates.insert("approved_at".into(), if approved { json!(now.to_rfc3339()) } else { Value::Null });
    updates.insert("approved_by".into(), if approved { json!(admin_id) } else { Value::Null });
    updates
}

/// PATCH /:id/approval - approve or reject the NGO user `:id`
pub async fn approval(
    Path(user_id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    JsonBody(body): JsonBody<ApprovalRequest>,
) -> Result<Json<Value>, ApiError> {
    let action: ApprovalAction = body
        .action
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid action"))?;
    let AdminUser(admin) = AdminUser::require(&headers, &uri).await?;

    let updates = approval_updates(action, body.notes, &admin.id, Utc::now());
    let pool = pool()?;
    let mut tx = pool.begin().await.map_err(ApiError::from_db("Failed to update NGO details"))?;
    for table in [DETAILS_TABLE, PROFILE_TABLE] {
        QueryBuilder::table(table)
            .and_then(|q| q.where_clause(json!({ "user_id": user_id.as_str() })))
            .map_err(ApiError::from_db("Failed to update NGO details"))?
            .update(&mut *tx, &updates)
            .await
            .map_err(ApiError::from_db("Failed to update NGO details"))?;
    }
    tx.commit().await.map_err(ApiError::from_db("Failed to update NGO details"))?;

    let status = action.resulting_status();
    tracing::info!("Admin {} set NGO {} to {}", admin.id, user_id, status);
    Ok(Json(json!({
        "success": true,
        "message": format!("NGO {} successfully", status),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn approve_stamps_admin_and_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let updates = approval_updates(ApprovalAction::Approve, Some("Documents verified".into()), "admin-1", now);
        assert_eq!(updates["approval_status"], "approved");
        assert_eq!(updates["admin_notes"], "Documents verified");
        assert_eq!(updates["approved_by"], "admin-1");
        assert_eq!(updates["approved_at"], "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn reject_clears_approval_fields() {
        let updates = approval_updates(ApprovalAction::Reject, Some(String::new()), "admin-1", Utc::now());
        assert_eq!(updates["approval_status"], "rejected");
        assert_eq!(updates["admin_notes"], Value::Null);
        assert_eq!(updates["approved_at"], Value::Null);
        assert_eq!(updates["approved_by"], Value::Null);
    }

    #[test]
    fn profile_with_user_sql_binds_one_param() {
        assert!(PROFILE_WITH_USER_SQL.contains("$1"));
        assert!(!PROFILE_WITH_USER_SQL.contains("$2"));
    }
}
