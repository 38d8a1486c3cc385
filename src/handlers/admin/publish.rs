// handlers/admin/publish.rs - POST /api/admin/templates/publish

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::{now_iso, pool, single_row};
use crate::middleware::JsonBody;
use crate::types::TemplateKind;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub template_id: Option<Value>,
    #[serde(default)]
    pub template_type: Option<String>,
    #[serde(default)]
    pub published: bool,
}

fn publish_message(published: bool) -> &'static str {
    if published {
        "Template published successfully!"
    } else {
        "Template unpublished successfully!"
    }
}

pub async fn publish_template(JsonBody(body): JsonBody<PublishRequest>) -> Result<Json<Value>, ApiError> {
    let template_id = match body.template_id {
        Some(Value::String(s)) if !s.is_empty() => Value::String(s),
        Some(Value::Number(n)) => Value::Number(n),
        _ => return Err(ApiError::bad_request("Template ID and type are required")),
    };
    let kind_name = body
        .template_type
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Template ID and type are required"))?;
    let kind: TemplateKind = kind_name
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid template type"))?;

    let failure = if body.published { "Failed to publish template" } else { "Failed to unpublish template" };
    let mut updates = Map::new();
    updates.insert("published".into(), json!(body.published));
    updates.insert("updated_at".into(), json!(now_iso()));

    let pool = pool()?;
    let rows = QueryBuilder::table(kind.table_name())
        .and_then(|q| q.where_clause(json!({ "id": template_id, "is_admin_template": true })))
        .map_err(ApiError::from_db(failure))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db(failure))?;
    let template = single_row(rows, "Template not found")?;

    tracing::info!("Admin {} template {} published={}", kind, template["id"], body.published);
    Ok(Json(json!({
        "template": template,
        "message": publish_message(body.published),
    })))
}
