// handlers/public/ngos.rs - Approved NGOs for the landing pages

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::join_all;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::error::ApiError;
use crate::handlers::ngo::profile::load_full_profile;
use crate::handlers::utils::pool;
use crate::services::ngo::public_opportunity;
use crate::services::stats::{type_counts, TypeCounts};
use crate::types::ApprovalStatus;

const PUBLIC_COLUMNS: &[&str] = &[
    "id",
    "name",
    "email",
    "year_created",
    "profile_image_url",
    "banner_url",
    "logo_url",
    "mission_statement",
    "approval_status",
    "user_id",
];

/// Types of the published opportunities owned by user `$1`
const PUBLISHED_TYPES_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT o.id, o.opportunity_type
    FROM "opportunities" o
    WHERE o.user_id::text = $1
      AND EXISTS (
          SELECT 1 FROM "opportunity_description" d
          WHERE d.opportunity_id = o.id AND d.status::text = 'published'
      )
) _r"#;

/// Published opportunities described by user `$1`, newest first, each with
/// the title of its first matching description
const PUBLISHED_OPPORTUNITIES_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT o.id, o.opportunity_type, o.created_at, d.title
    FROM "opportunities" o
    JOIN LATERAL (
        SELECT title FROM "opportunity_description"
        WHERE opportunity_id = o.id AND user_id::text = $1 AND status::text = 'published'
        LIMIT 1
    ) d ON true
    ORDER BY o.created_at DESC
) _r"#;

fn counts_of(rows: &[Value], type_key: &str) -> TypeCounts {
    type_counts(rows.iter().map(|row| row.get(type_key).and_then(Value::as_str)))
}

fn merge_counts(mut ngo: Value, counts: &TypeCounts) -> Value {
    if let (Value::Object(obj), Ok(Value::Object(extra))) = (&mut ngo, serde_json::to_value(counts)) {
        obj.extend(extra);
    }
    ngo
}

async fn with_type_counts(pool: &PgPool, ngo: Value) -> Value {
    let user_id = ngo.get("user_id").cloned().unwrap_or(Value::Null);
    let counts = match fetch_rows(pool, PUBLISHED_TYPES_SQL, vec![user_id]).await {
        Ok(rows) => counts_of(&rows, "opportunity_type"),
        Err(e) => {
            tracing::warn!("Failed to fetch opportunities for NGO {}: {}", ngo["id"], e);
            TypeCounts::default()
        }
    };
    merge_counts(ngo, &counts)
}

fn list_failure(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message, "ngos": [] }))).into_response()
}

/// GET /api/public/ngos
pub async fn list() -> Response {
    let pool = match pool() {
        Ok(pool) => pool,
        Err(e) => return list_failure(e.message()),
    };
    let profiles = match QueryBuilder::table("ngo_profile")
        .and_then(|q| q.select(PUBLIC_COLUMNS))
        .and_then(|q| q.where_clause(json!({ "approval_status": ApprovalStatus::Approved.as_str() })))
        .and_then(|q| q.order("created_at desc"))
    {
        Ok(q) => q.fetch_all(&pool).await,
        Err(e) => Err(e),
    };
    let profiles = match profiles {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Failed to fetch NGO profiles: {}", e);
            return list_failure("Failed to fetch NGO profiles");
        }
    };

    let ngos = join_all(profiles.into_iter().map(|ngo| with_type_counts(&pool, ngo))).await;
    Json(json!({ "ngos": ngos, "error": null })).into_response()
}

/// GET /api/public/ngos/:id
pub async fn get_ngo(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let profile = load_full_profile(
        &pool,
        json!({ "id": id, "approval_status": ApprovalStatus::Approved.as_str() }),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("NGO profile not found"))?;

    let user_id = profile.get("user_id").cloned().unwrap_or(Value::Null);
    let rows = fetch_rows(&pool, PUBLISHED_OPPORTUNITIES_SQL, vec![user_id])
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to fetch opportunities for NGO {}: {}", id, e);
            Vec::new()
        });
    let opportunities: Vec<Value> = rows.iter().map(public_opportunity).collect();
    let stats = counts_of(&opportunities, "type");

    Ok(Json(json!({
        "profile": profile,
        "opportunities": opportunities,
        "stats": stats,
        "error": null,
    })))
}
