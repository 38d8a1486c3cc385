// handlers/admin/templates.rs - /api/admin/{evaluation,offres,forms,process}-templates
//
// One set of handlers serves every template family; the `TemplateKind`
// picks the table and the fields a new template is built from.

use axum::{extract::Query, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{Postgres, Transaction};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::{column_strings, now_iso, pool, single_row, split_id_and_updates};
use crate::middleware::JsonBody;
use crate::types::TemplateKind;

const PROCESS_STEPS_TABLE: &str = "process_steps";
const STEP_STATUS_OPTIONS: &[&str] = &["pending", "in-progress", "completed", "blocked"];

/// Routes for one template family mounted at `path`
pub fn routes(kind: TemplateKind, path: &str) -> Router {
    Router::new().route(
        path,
        get(move || list(kind))
            .post(move |JsonBody(body): JsonBody<Value>| create(kind, body))
            .patch(move |JsonBody(body): JsonBody<Value>| update(kind, body))
            .delete(move |Query(query): Query<DeleteQuery>| delete(kind, query)),
    )
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

fn field(body: &Value, key: &str) -> Value {
    body.get(key).cloned().unwrap_or(Value::Null)
}

/// Row inserted for a new admin template of `kind`
pub fn new_template_record(kind: TemplateKind, body: &Value) -> Map<String, Value> {
    let mut record = Map::new();
    match kind {
        TemplateKind::Evaluation => {
            record.insert("name".into(), field(body, "name"));
            record.insert("description".into(), field(body, "description"));
            let scale = match body.get("scale") {
                Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Value::Number(n.clone()),
                _ => json!(10),
            };
            record.insert("scale".into(), scale);
            record.insert("criteria".into(), field(body, "criteria"));
            record.insert("created_by".into(), field(body, "created_by"));
        }
        TemplateKind::Offres => {
            record.insert("title".into(), field(body, "title"));
            record.insert("description".into(), field(body, "description"));
            record.insert("fields".into(), field(body, "fields"));
            record.insert("created_by".into(), field(body, "created_by"));
        }
        TemplateKind::Forms => {
            record.insert("title".into(), field(body, "title"));
            record.insert("description".into(), field(body, "description"));
            record.insert("sections".into(), field(body, "sections"));
            record.insert("status".into(), json!("draft"));
            record.insert("user_id".into(), field(body, "user_id"));
        }
        TemplateKind::Process => {
            record.insert("name".into(), field(body, "name"));
            record.insert("description".into(), field(body, "description"));
            record.insert("status".into(), json!("draft"));
            record.insert("created_by".into(), field(body, "created_by"));
        }
    }
    record.insert("published".into(), json!(false));
    record.insert("is_admin_template".into(), json!(true));
    record
}

/// `process_steps` rows for a template, numbered from 1 in request order
pub fn process_step_records(template_id: &Value, steps: &[Value]) -> Vec<Map<String, Value>> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let mut record = Map::new();
            record.insert("process_template_id".into(), template_id.clone());
            record.insert("name".into(), field(step, "title"));
            record.insert("description".into(), field(step, "description"));
            record.insert("status_options".into(), json!(STEP_STATUS_OPTIONS));
            record.insert("display_order".into(), json!(index + 1));
            record
        })
        .collect()
}

/// GET - admin templates, newest first
pub async fn list(kind: TemplateKind) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let mut templates = QueryBuilder::table(kind.table_name())
        .and_then(|q| q.where_clause(json!({ "is_admin_template": true })))
        .and_then(|q| q.order("created_at desc"))
        .map_err(ApiError::from_db("Failed to fetch templates"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch templates"))?;

    if kind == TemplateKind::Process && !templates.is_empty() {
        let ids = column_strings(&templates, "id");
        let steps = QueryBuilder::table(PROCESS_STEPS_TABLE)
            .and_then(|q| q.where_clause(json!({ "process_template_id": { "$in": ids } })))
            .and_then(|q| q.order("display_order asc"))
            .map_err(ApiError::from_db("Failed to fetch templates"))?
            .fetch_all(&pool)
            .await
            .map_err(ApiError::from_db("Failed to fetch templates"))?;

        for template in templates.iter_mut() {
            let id = template.get("id").cloned().unwrap_or(Value::Null);
            let own: Vec<Value> = steps
                .iter()
                .filter(|s| s.get("process_template_id") == Some(&id))
                .cloned()
                .collect();
            template["process_steps"] = Value::Array(own);
        }
    }

    Ok(Json(json!({ "templates": templates })))
}

async fn replace_steps(
    tx: &mut Transaction<'_, Postgres>,
    template_id: &Value,
    steps: &[Value],
) -> Result<(), ApiError> {
    let steps_table = QueryBuilder::table(PROCESS_STEPS_TABLE).map_err(ApiError::from_db("Failed to update process steps"))?;
    steps_table
        .clone()
        .where_clause(json!({ "process_template_id": template_id }))
        .map_err(ApiError::from_db("Failed to update process steps"))?
        .delete(&mut **tx)
        .await
        .map_err(ApiError::from_db("Failed to update process steps"))?;

    for record in process_step_records(template_id, steps) {
        steps_table
            .insert(&mut **tx, &record)
            .await
            .map_err(ApiError::from_db("Failed to create process steps"))?;
    }
    Ok(())
}

/// POST - create an unpublished admin template
pub async fn create(kind: TemplateKind, body: Value) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let record = new_template_record(kind, &body);
    let steps = body.get("steps").and_then(Value::as_array).filter(|s| !s.is_empty());

    let table = QueryBuilder::table(kind.table_name()).map_err(ApiError::from_db("Failed to create template"))?;
    let template = match (kind, steps) {
        (TemplateKind::Process, Some(steps)) => {
            let mut tx = pool.begin().await.map_err(ApiError::from_db("Failed to create template"))?;
            let template = table
                .insert(&mut *tx, &record)
                .await
                .map_err(ApiError::from_db("Failed to create template"))?;
            replace_steps(&mut tx, &template["id"], steps).await?;
            tx.commit().await.map_err(ApiError::from_db("Failed to create template"))?;
            template
        }
        _ => table
            .insert(&pool, &record)
            .await
            .map_err(ApiError::from_db("Failed to create template"))?,
    };

    tracing::info!("Created admin {} template {}", kind, template["id"]);
    Ok(Json(json!({ "template": template })))
}

/// PATCH - update an admin template by body `id`
pub async fn update(kind: TemplateKind, mut body: Value) -> Result<Json<Value>, ApiError> {
    let steps = match (kind, body.as_object_mut()) {
        (TemplateKind::Process, Some(obj)) => obj.remove("steps"),
        _ => None,
    };
    let (id, mut updates) = split_id_and_updates(body, "Template ID is required", &["is_admin_template"])?;
    updates.insert("updated_at".into(), json!(now_iso()));

    let pool = pool()?;
    let mut tx = pool.begin().await.map_err(ApiError::from_db("Failed to update template"))?;
    let rows = QueryBuilder::table(kind.table_name())
        .and_then(|q| q.where_clause(json!({ "id": id, "is_admin_template": true })))
        .map_err(ApiError::from_db("Failed to update template"))?
        .update(&mut *tx, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update template"))?;
    let template = single_row(rows, "Template not found")?;

    if let Some(Value::Array(steps)) = steps {
        replace_steps(&mut tx, &template["id"], &steps).await?;
    }
    tx.commit().await.map_err(ApiError::from_db("Failed to update template"))?;

    Ok(Json(json!({ "template": template })))
}

/// DELETE ?id= - remove an admin template
pub async fn delete(kind: TemplateKind, query: DeleteQuery) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Template ID is required"))?;

    let pool = pool()?;
    let mut tx = pool.begin().await.map_err(ApiError::from_db("Failed to delete template"))?;
    if kind == TemplateKind::Process {
        QueryBuilder::table(PROCESS_STEPS_TABLE)
            .and_then(|q| q.where_clause(json!({ "process_template_id": id.as_str() })))
            .map_err(ApiError::from_db("Failed to delete template"))?
            .delete(&mut *tx)
            .await
            .map_err(ApiError::from_db("Failed to delete template"))?;
    }
    QueryBuilder::table(kind.table_name())
        .and_then(|q| q.where_clause(json!({ "id": id.as_str(), "is_admin_template": true })))
        .map_err(ApiError::from_db("Failed to delete template"))?
        .delete(&mut *tx)
        .await
        .map_err(ApiError::from_db("Failed to delete template"))?;
    tx.commit().await.map_err(ApiError::from_db("Failed to delete template"))?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_template_defaults_scale() {
        let record = new_template_record(TemplateKind::Evaluation, &json!({"name": "Interview", "criteria": []}));
        assert_eq!(record["scale"], 10);
        assert_eq!(record["published"], false);
        assert_eq!(record["is_admin_template"], true);
        assert_eq!(record["created_by"], Value::Null);

        let record = new_template_record(TemplateKind::Evaluation, &json!({"scale": 5}));
        assert_eq!(record["scale"], 5);
    }

    #[test]
    fn forms_template_starts_as_draft() {
        let record = new_template_record(TemplateKind::Forms, &json!({"title": "Intake", "user_id": "admin-1"}));
        assert_eq!(record["status"], "draft");
        assert_eq!(record["user_id"], "admin-1");
        assert!(!record.contains_key("created_by"));
    }

    #[test]
    fn offres_template_ignores_unknown_fields() {
        let record = new_template_record(TemplateKind::Offres, &json!({"title": "Job post", "id": "forged"}));
        assert!(!record.contains_key("id"));
        assert_eq!(record["title"], "Job post");
    }

    #[test]
    fn process_steps_are_numbered_in_order() {
        let steps = vec![
            json!({"title": "Screening", "description": "CV review"}),
            json!({"title": "Interview"}),
        ];
        let records = process_step_records(&json!("tpl-1"), &steps);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Screening");
        assert_eq!(records[0]["display_order"], 1);
        assert_eq!(records[1]["display_order"], 2);
        assert_eq!(records[1]["description"], Value::Null);
        assert_eq!(records[1]["status_options"], json!(["pending", "in-progress", "completed", "blocked"]));
    }
}
