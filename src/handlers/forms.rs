// handlers/forms.rs - GET /api/forms/:id

use axum::{extract::Path, Json};
use serde_json::{json, Value};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::pool;
use crate::types::TemplateKind;

pub async fn get_form(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let form = QueryBuilder::table(TemplateKind::Forms.table_name())
        .and_then(|q| q.select(&["id", "title", "description", "sections"]))
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to fetch form structure"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch form structure"))?
        .ok_or_else(|| ApiError::not_found("Form not found"))?;

    Ok(Json(json!({ "form": form })))
}
