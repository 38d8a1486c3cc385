// handlers/cvs.rs - GET /api/cvs/:id with every CV section

use axum::{extract::Path, Json};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::pool;

/// Response key and child table for each CV section
const CV_SECTIONS: [(&str, &str); 6] = [
    ("work_experiences", "cv_work_experiences"),
    ("education", "cv_education"),
    ("skills", "cv_skills"),
    ("languages", "cv_languages"),
    ("certificates", "cv_certificates"),
    ("projects", "cv_projects"),
];

async fn section(pool: &PgPool, table: &str, cv_id: &str) -> Vec<Value> {
    let rows = match QueryBuilder::table(table)
        .and_then(|q| q.where_clause(json!({ "cv_id": cv_id })))
        .and_then(|q| q.order("sort_order asc"))
    {
        Ok(q) => q.fetch_all(pool).await,
        Err(e) => Err(e),
    };
    rows.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch {} for CV {}: {}", table, cv_id, e);
        Vec::new()
    })
}

pub async fn get_cv(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let mut cv = QueryBuilder::table("cvs")
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to fetch CV"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch CV"))?
        .ok_or_else(|| ApiError::not_found("CV not found"))?;

    let sections = futures::future::join_all(
        CV_SECTIONS.iter().map(|(_, table)| section(&pool, table, &id)),
    )
    .await;
    for ((key, _), rows) in CV_SECTIONS.iter().zip(sections) {
        cv[*key] = Value::Array(rows);
    }

    Ok(Json(cv))
}
