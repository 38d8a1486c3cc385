// handlers/offres_templates.rs - /api/offres-templates
//
// NGO-owned offer templates. Admin templates are listed once published but
// can only be edited through /api/admin/offres-templates.

use axum::{extract::Query, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::{id_field, now_iso, pool, single_row, text_field};
use crate::middleware::JsonBody;
use crate::types::TemplateKind;

pub fn routes() -> Router {
    Router::new().route(
        "/api/offres-templates",
        get(list).post(create).patch(update).delete(delete),
    )
}

/// NGO templates plus the published admin ones
pub fn visible_to_ngos() -> Value {
    json!({
        "$or": [
            { "is_admin_template": false },
            { "is_admin_template": true, "published": true }
        ]
    })
}

fn table() -> &'static str {
    TemplateKind::Offres.table_name()
}

/// Title, description and fields shared by create and update; title is required
fn editable_fields(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let title = text_field(body, "title").ok_or_else(|| ApiError::bad_request("Template title is required"))?;
    let mut record = Map::new();
    record.insert("title".into(), json!(title.trim()));
    record.insert(
        "description".into(),
        text_field(body, "description").map_or_else(|| json!(""), Value::from),
    );
    record.insert(
        "fields".into(),
        body.get("fields").filter(|f| !f.is_null()).cloned().unwrap_or_else(|| json!([])),
    );
    Ok(record)
}

/// Row for a new NGO template
pub fn new_ngo_template(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let mut record = editable_fields(body)?;
    record.insert("published".into(), json!(false));
    record.insert("is_admin_template".into(), json!(false));
    record.insert("created_by".into(), id_field(body, "created_by").map_or(Value::Null, Value::from));
    Ok(record)
}

pub async fn list() -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let templates = QueryBuilder::table(table())
        .and_then(|q| q.where_clause(visible_to_ngos()))
        .and_then(|q| q.order("created_at desc"))
        .map_err(ApiError::from_db("Failed to fetch templates"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch templates"))?;

    Ok(Json(json!({ "data": templates })))
}

pub async fn create(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let record = new_ngo_template(&body)?;
    let pool = pool()?;
    let template = QueryBuilder::table(table())?
        .insert(&pool, &record)
        .await
        .map_err(ApiError::from_db("Failed to create template"))?;

    Ok(Json(json!({ "data": template })))
}

/// PATCH body `{id, title, description, fields}`; admin templates are left alone
pub async fn update(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let id = id_field(&body, "id").ok_or_else(|| ApiError::bad_request("Template ID is required"))?;
    let mut updates = editable_fields(&body)?;
    updates.insert("updated_at".into(), json!(now_iso()));

    let pool = pool()?;
    let rows = QueryBuilder::table(table())
        .and_then(|q| q.where_clause(json!({ "id": id, "is_admin_template": false })))
        .map_err(ApiError::from_db("Failed to update template"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update template"))?;

    Ok(Json(json!({ "data": single_row(rows, "Template not found or cannot be edited")? })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

pub async fn delete(Query(query): Query<DeleteQuery>) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Template ID is required"))?;
    let pool = pool()?;
    QueryBuilder::table(table())
        .and_then(|q| q.where_clause(json!({ "id": id, "is_admin_template": false })))
        .map_err(ApiError::from_db("Failed to delete template"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete template"))?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_where::FilterWhere;

    #[test]
    fn visibility_filter_keeps_unpublished_admin_rows_out() {
        let (sql, params) = FilterWhere::generate(&visible_to_ngos(), 0).unwrap();
        assert_eq!(
            sql,
            "((\"is_admin_template\" = $1) OR (\"is_admin_template\" = $2 AND \"published\" = $3))"
        );
        assert_eq!(params, vec![json!(false), json!(true), json!(true)]);
    }

    #[test]
    fn new_templates_are_private_drafts() {
        let record = new_ngo_template(&json!({"title": "  Field officer offer  ", "created_by": "ngo-1"})).unwrap();
        assert_eq!(record["title"], "Field officer offer");
        assert_eq!(record["description"], "");
        assert_eq!(record["fields"], json!([]));
        assert_eq!(record["published"], false);
        assert_eq!(record["is_admin_template"], false);
        assert_eq!(record["created_by"], "ngo-1");

        let err = new_ngo_template(&json!({"title": "   "})).unwrap_err();
        assert_eq!(err.message(), "Template title is required");
    }
}
