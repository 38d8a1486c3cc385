// handlers/evaluations.rs - Evaluation templates, application scores and
// the template chosen for each opportunity
//
// /api/evaluations                     NGO evaluation templates
// /api/evaluations/applications        scores given to one application
// /api/opportunities/:id/evaluation    template linked to an opportunity

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::error::ApiError;
use crate::handlers::offres_templates::visible_to_ngos;
use crate::handlers::utils::{id_field, now_iso, pool, single_row, text_field};
use crate::middleware::JsonBody;
use crate::types::TemplateKind;

const APPLICATION_EVALUATIONS_TABLE: &str = "application_evaluations";
const OPPORTUNITY_EVALUATIONS_TABLE: &str = "opportunity_evaluations";
const DEFAULT_SCALE: i64 = 10;

/// Template linked to an opportunity, if any
const LINKED_TEMPLATE_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT t.id, t.name, t.description, t.scale, t.criteria, t.created_at, t.updated_at
    FROM "opportunity_evaluations" oe
    JOIN "evaluation_templates" t ON t.id = oe.evaluation_template_id
    WHERE oe.opportunity_id::text = $1
    ORDER BY oe.created_at DESC
    LIMIT 1
) _r"#;

pub fn routes() -> Router {
    Router::new()
        .route(
            "/api/evaluations",
            get(list_templates).post(create_template).put(update_template).delete(delete_template),
        )
        .route(
            "/api/evaluations/applications",
            get(application_evaluation)
                .post(save_application_evaluation)
                .put(update_application_evaluation)
                .delete(delete_application_evaluation),
        )
}

fn templates_table() -> &'static str {
    TemplateKind::Evaluation.table_name()
}

fn non_empty_criteria(body: &Value) -> Option<Value> {
    body.get("criteria").filter(|c| c.as_array().map_or(false, |a| !a.is_empty())).cloned()
}

fn scale_of(body: &Value) -> Option<Value> {
    match body.get("scale") {
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(Value::Number(n.clone())),
        _ => None,
    }
}

/// Row for a new NGO evaluation template
pub fn new_evaluation_template(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let (Some(name), Some(criteria)) = (text_field(body, "name"), non_empty_criteria(body)) else {
        return Err(ApiError::bad_request("Name and criteria are required"));
    };
    let mut record = Map::new();
    record.insert("name".into(), json!(name));
    record.insert(
        "description".into(),
        text_field(body, "description").map_or_else(|| json!(""), Value::from),
    );
    record.insert("scale".into(), scale_of(body).unwrap_or_else(|| json!(DEFAULT_SCALE)));
    record.insert("criteria".into(), criteria);
    record.insert("created_by".into(), id_field(body, "created_by").map_or(Value::Null, Value::from));
    record.insert("published".into(), json!(false));
    record.insert("is_admin_template".into(), json!(false));
    Ok(record)
}

/// `{id, updates}` for a template edit; the scale is kept when not given
pub fn evaluation_template_updates(body: &Value) -> Result<(String, Map<String, Value>), ApiError> {
    let (Some(id), Some(name), Some(criteria)) = (
        id_field(body, "id"),
        text_field(body, "name"),
        body.get("criteria").filter(|c| c.is_array()).cloned(),
    ) else {
        return Err(ApiError::bad_request("Missing required fields: id, name, and criteria"));
    };
    let mut updates = Map::new();
    updates.insert("name".into(), json!(name));
    updates.insert(
        "description".into(),
        text_field(body, "description").map_or_else(|| json!(""), Value::from),
    );
    if let Some(scale) = scale_of(body) {
        updates.insert("scale".into(), scale);
    }
    updates.insert("criteria".into(), criteria);
    updates.insert("updated_at".into(), json!(now_iso()));
    Ok((id, updates))
}

/// GET - the NGO's templates plus published admin ones, newest first
pub async fn list_templates() -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let templates = QueryBuilder::table(templates_table())
        .and_then(|q| q.where_clause(visible_to_ngos()))
        .and_then(|q| q.order("created_at desc"))
        .map_err(ApiError::from_db("Failed to fetch evaluations"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch evaluations"))?;

    Ok(Json(Value::Array(templates)))
}

pub async fn create_template(JsonBody(body): JsonBody<Value>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = new_evaluation_template(&body)?;
    let pool = pool()?;
    let template = QueryBuilder::table(templates_table())?
        .insert(&pool, &record)
        .await
        .map_err(ApiError::from_db("Failed to create evaluation"))?;

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let (id, updates) = evaluation_template_updates(&body)?;
    let pool = pool()?;
    let rows = QueryBuilder::table(templates_table())
        .and_then(|q| q.where_clause(json!({ "id": id, "is_admin_template": false })))
        .map_err(ApiError::from_db("Failed to update evaluation"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update evaluation"))?;

    Ok(Json(json!({ "evaluation": single_row(rows, "Evaluation not found")? })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteTemplateQuery {
    pub id: Option<String>,
}

pub async fn delete_template(Query(query): Query<DeleteTemplateQuery>) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing evaluation ID"))?;
    let pool = pool()?;
    QueryBuilder::table(templates_table())
        .and_then(|q| q.where_clause(json!({ "id": id, "is_admin_template": false })))
        .map_err(ApiError::from_db("Failed to delete evaluation"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete evaluation"))?;

    Ok(Json(json!({ "success": true })))
}

/// Score columns copied out of an `evaluationData` object
pub fn score_columns(evaluation_data: &Value, evaluated_by: Option<&Value>) -> Map<String, Value> {
    let data = |key: &str| evaluation_data.get(key).cloned().unwrap_or(Value::Null);
    let mut columns = Map::new();
    columns.insert("evaluation_data".into(), evaluation_data.clone());
    columns.insert("total_score".into(), data("totalScore"));
    columns.insert("max_score".into(), data("maxScore"));
    columns.insert("percentage_score".into(), data("percentageScore"));
    columns.insert("notes".into(), data("notes"));
    columns.insert("evaluated_by".into(), evaluated_by.cloned().unwrap_or(Value::Null));
    columns.insert("updated_at".into(), json!(now_iso()));
    columns
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEvaluationQuery {
    pub application_id: Option<String>,
    pub evaluation_id: Option<String>,
}

/// GET ?applicationId=&evaluationId= - the stored scores or null
pub async fn application_evaluation(
    Query(query): Query<ApplicationEvaluationQuery>,
) -> Result<Json<Value>, ApiError> {
    let application_id = query
        .application_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Application ID is required"))?;
    let mut conditions = Map::new();
    conditions.insert("application_id".into(), json!(application_id));
    if let Some(evaluation_id) = query.evaluation_id.filter(|id| !id.is_empty()) {
        conditions.insert("evaluation_id".into(), json!(evaluation_id));
    }

    let pool = pool()?;
    let evaluation = QueryBuilder::table(APPLICATION_EVALUATIONS_TABLE)
        .and_then(|q| q.where_clause(Value::Object(conditions)))
        .and_then(|q| q.order("updated_at desc"))
        .map_err(ApiError::from_db("Failed to fetch evaluation"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch evaluation"))?;

    Ok(Json(json!({ "evaluation": evaluation })))
}

/// POST - one score row per application and evaluation template; a repeat
/// overwrites the scores
pub async fn save_application_evaluation(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    const FAILURE: &str = "Failed to save evaluation";
    let (Some(application_id), Some(opportunity_id), Some(evaluation_id), Some(evaluation_data)) = (
        id_field(&body, "applicationId"),
        id_field(&body, "opportunityId"),
        id_field(&body, "evaluationId"),
        body.get("evaluationData").filter(|d| d.is_object()),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    let mut columns = score_columns(evaluation_data, body.get("evaluatedBy"));
    let key = json!({ "application_id": application_id, "evaluation_id": evaluation_id });

    let pool = pool()?;
    let mut tx = pool.begin().await.map_err(ApiError::from_db(FAILURE))?;
    let existing = QueryBuilder::table(APPLICATION_EVALUATIONS_TABLE)
        .and_then(|q| q.select(&["id"]))
        .and_then(|q| q.where_clause(key.clone()))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::from_db(FAILURE))?;
    let evaluation = match existing {
        Some(_) => {
            let rows = QueryBuilder::table(APPLICATION_EVALUATIONS_TABLE)
                .and_then(|q| q.where_clause(key))
                .map_err(ApiError::from_db(FAILURE))?
                .update(&mut *tx, &columns)
                .await
                .map_err(ApiError::from_db(FAILURE))?;
            single_row(rows, "Evaluation not found")?
        }
        None => {
            columns.insert("application_id".into(), json!(application_id));
            columns.insert("opportunity_id".into(), json!(opportunity_id));
            columns.insert("evaluation_id".into(), json!(evaluation_id));
            QueryBuilder::table(APPLICATION_EVALUATIONS_TABLE)?
                .insert(&mut *tx, &columns)
                .await
                .map_err(ApiError::from_db(FAILURE))?
        }
    };
    tx.commit().await.map_err(ApiError::from_db(FAILURE))?;

    Ok(Json(json!({
        "success": true,
        "message": "Evaluation saved successfully",
        "evaluation": evaluation,
    })))
}

/// PUT body `{evaluationId, applicationId, evaluationData, evaluatedBy}`;
/// `evaluationId` is the score row's id
pub async fn update_application_evaluation(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let (Some(id), Some(application_id), Some(evaluation_data)) = (
        id_field(&body, "evaluationId"),
        id_field(&body, "applicationId"),
        body.get("evaluationData").filter(|d| d.is_object()),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    let columns = score_columns(evaluation_data, body.get("evaluatedBy"));

    let pool = pool()?;
    let rows = QueryBuilder::table(APPLICATION_EVALUATIONS_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id, "application_id": application_id })))
        .map_err(ApiError::from_db("Failed to update evaluation"))?
        .update(&pool, &columns)
        .await
        .map_err(ApiError::from_db("Failed to update evaluation"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Evaluation updated successfully",
        "evaluation": single_row(rows, "Evaluation not found")?,
    })))
}

pub async fn delete_application_evaluation(
    Query(query): Query<ApplicationEvaluationQuery>,
) -> Result<Json<Value>, ApiError> {
    let (Some(id), Some(application_id)) = (
        query.evaluation_id.filter(|id| !id.is_empty()),
        query.application_id.filter(|id| !id.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Evaluation ID and Application ID are required"));
    };
    let pool = pool()?;
    QueryBuilder::table(APPLICATION_EVALUATIONS_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id, "application_id": application_id })))
        .map_err(ApiError::from_db("Failed to delete evaluation"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete evaluation"))?;

    Ok(Json(json!({ "success": true, "message": "Evaluation deleted successfully" })))
}

/// GET /api/opportunities/:id/evaluation
pub async fn opportunity_evaluation(Path(opportunity_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let template = fetch_rows(&pool, LINKED_TEMPLATE_SQL, vec![json!(opportunity_id)])
        .await
        .map_err(ApiError::from_db("Failed to fetch opportunity evaluation"))?
        .into_iter()
        .next();

    let message = if template.is_some() {
        "Evaluation template found"
    } else {
        "No evaluation template found for this opportunity"
    };
    Ok(Json(json!({
        "opportunityId": opportunity_id,
        "evaluationTemplate": template,
        "message": message,
    })))
}

/// POST /api/opportunities/:id/evaluation body `{evaluationId}`
pub async fn link_opportunity_evaluation(
    Path(opportunity_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<Value>, ApiError> {
    const FAILURE: &str = "Failed to save evaluation choice to database";
    let evaluation_id =
        id_field(&body, "evaluationId").ok_or_else(|| ApiError::bad_request("evaluationId is required"))?;

    let pool = pool()?;
    let template = QueryBuilder::table(templates_table())
        .and_then(|q| q.select(&["id", "name"]))
        .and_then(|q| q.where_clause(json!({ "id": evaluation_id })))
        .map_err(ApiError::from_db("Failed to link evaluation to opportunity"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to link evaluation to opportunity"))?
        .ok_or_else(|| ApiError::not_found("Evaluation template not found"))?;

    let key = json!({ "opportunity_id": opportunity_id, "evaluation_template_id": evaluation_id });
    let mut link = Map::new();
    link.insert("created_at".into(), json!(now_iso()));

    let mut tx = pool.begin().await.map_err(ApiError::from_db(FAILURE))?;
    let rows = QueryBuilder::table(OPPORTUNITY_EVALUATIONS_TABLE)
        .and_then(|q| q.where_clause(key))
        .map_err(ApiError::from_db(FAILURE))?
        .update(&mut *tx, &link)
        .await
        .map_err(ApiError::from_db(FAILURE))?;
    let data = match rows.into_iter().next() {
        Some(row) => row,
        None => {
            link.insert("opportunity_id".into(), json!(opportunity_id));
            link.insert("evaluation_template_id".into(), json!(evaluation_id));
            QueryBuilder::table(OPPORTUNITY_EVALUATIONS_TABLE)?
                .insert(&mut *tx, &link)
                .await
                .map_err(ApiError::from_db(FAILURE))?
        }
    };
    tx.commit().await.map_err(ApiError::from_db(FAILURE))?;

    tracing::info!("Linked evaluation template {} to opportunity {}", evaluation_id, opportunity_id);
    Ok(Json(json!({
        "opportunityId": opportunity_id,
        "evaluationId": evaluation_id,
        "evaluationName": template.get("name").cloned().unwrap_or(Value::Null),
        "message": "Evaluation template linked to opportunity successfully",
        "data": data,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_templates_need_name_and_criteria() {
        let record = new_evaluation_template(&json!({
            "name": "Field skills",
            "criteria": [{"label": "Experience", "weight": 2}]
        }))
        .unwrap();
        assert_eq!(record["scale"], 10);
        assert_eq!(record["description"], "");
        assert_eq!(record["is_admin_template"], false);

        for body in [json!({"name": "x", "criteria": []}), json!({"criteria": [{"label": "a"}]})] {
            let err = new_evaluation_template(&body).unwrap_err();
            assert_eq!(err.message(), "Name and criteria are required");
        }
    }

    #[test]
    fn template_updates_keep_scale_unless_given() {
        let (id, updates) =
            evaluation_template_updates(&json!({"id": "e-1", "name": "Renamed", "criteria": []})).unwrap();
        assert_eq!(id, "e-1");
        assert!(!updates.contains_key("scale"));

        let (_, updates) =
            evaluation_template_updates(&json!({"id": "e-1", "name": "Renamed", "criteria": [], "scale": 5})).unwrap();
        assert_eq!(updates["scale"], 5);

        let err = evaluation_template_updates(&json!({"id": "e-1", "name": "Renamed"})).unwrap_err();
        assert_eq!(err.message(), "Missing required fields: id, name, and criteria");
    }

    #[test]
    fn scores_come_from_evaluation_data() {
        let data = json!({"totalScore": 42, "maxScore": 50, "percentageScore": 84, "notes": "Strong field record"});
        let columns = score_columns(&data, Some(&json!("ngo-user-1")));
        assert_eq!(columns["total_score"], 42);
        assert_eq!(columns["max_score"], 50);
        assert_eq!(columns["percentage_score"], 84);
        assert_eq!(columns["notes"], "Strong field record");
        assert_eq!(columns["evaluated_by"], "ngo-user-1");
        assert_eq!(columns["evaluation_data"], data);
    }
}
