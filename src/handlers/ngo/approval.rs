// handlers/ngo/approval.rs - The signed-in NGO's own approval and launch state

use axum::{
    http::{HeaderMap, Uri},
    Json,
};
use serde_json::{json, Map, Value};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::{id_field, pool};
use crate::middleware::{AuthUser, OptionalJsonBody};
use crate::types::ApprovalStatus;

const PROFILE_TABLE: &str = "ngo_profile";
const APPROVAL_COLUMNS: &[&str] = &["approval_status", "admin_notes", "approved_at", "approved_by"];
const LAUNCHING_SHOWN: &str = "shown";

/// Approval fields of a profile row; no row reads as `pending`
pub fn approval_view(profile: Option<&Value>) -> Value {
    let field = |key: &str| {
        profile
            .and_then(|p| p.get(key))
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)
    };
    let status = match field("approval_status") {
        Value::Null => json!(ApprovalStatus::Pending.as_str()),
        status => status,
    };
    json!({
        "approval_status": status,
        "admin_notes": field("admin_notes"),
        "approved_at": field("approved_at"),
        "approved_by": field("approved_by"),
    })
}

/// GET /api/ngo/approval-status
pub async fn approval_status(user: AuthUser) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let profile = QueryBuilder::table(PROFILE_TABLE)
        .and_then(|q| q.select(APPROVAL_COLUMNS))
        .and_then(|q| q.where_clause(json!({ "user_id": user.id })))
        .map_err(ApiError::from_db("Failed to fetch approval status"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch approval status"))?;

    Ok(Json(approval_view(profile.as_ref())))
}

/// POST /api/ngo/mark-launching-shown
///
/// The user id comes from the body's `userId`, then from the caller's
/// identity.
pub async fn mark_launching_shown(
    headers: HeaderMap,
    uri: Uri,
    OptionalJsonBody(body): OptionalJsonBody,
) -> Result<Json<Value>, ApiError> {
    let user_id = match id_field(&body, "userId") {
        Some(id) => id,
        None => AuthUser::resolve(&headers, &uri)
            .await?
            .map(|user| user.id)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized - No user ID provided"))?,
    };

    let mut updates = Map::new();
    updates.insert("launchingstatus".into(), json!(LAUNCHING_SHOWN));

    let pool = pool()?;
    let rows = QueryBuilder::table(PROFILE_TABLE)
        .and_then(|q| q.where_clause(json!({ "user_id": user_id })))
        .map_err(ApiError::from_db("Failed to update launching status"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update launching status"))?;
    let profile = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("NGO profile not found"))?;

    let status = match profile.get("launchingstatus") {
        Some(Value::String(s)) => s.clone(),
        _ => LAUNCHING_SHOWN.to_string(),
    };
    Ok(Json(json!({ "success": true, "launchingstatus": status })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_profile_reads_pending() {
        assert_eq!(
            approval_view(None),
            json!({"approval_status": "pending", "admin_notes": null, "approved_at": null, "approved_by": null})
        );
    }

    #[test]
    fn null_status_defaults_to_pending() {
        let row = json!({"approval_status": null, "admin_notes": "Missing documents"});
        let view = approval_view(Some(&row));
        assert_eq!(view["approval_status"], "pending");
        assert_eq!(view["admin_notes"], "Missing documents");

        let row = json!({"approval_status": "approved", "approved_by": "admin-1"});
        assert_eq!(approval_view(Some(&row))["approved_by"], "admin-1");
    }
}
