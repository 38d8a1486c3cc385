// handlers/opportunities.rs - Opportunity board, seeker applications and edits

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::evaluations;
use crate::handlers::utils::{id_value, now_iso, pool, single_row};
use crate::middleware::JsonBody;
use crate::services::opportunities::listing_card;

const APPLICATIONS_TABLE: &str = "opportunity_applications";

/// The 15 newest opportunities, each with its first description
const RECENT_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT o.*, to_jsonb(d) AS first_description
    FROM "opportunities" o
    LEFT JOIN LATERAL (
        SELECT * FROM "opportunity_description"
        WHERE opportunity_id = o.id
        ORDER BY created_at
        LIMIT 1
    ) d ON true
    ORDER BY o.created_at DESC
    LIMIT 15
) _r"#;

/// Every opportunity (optionally of one type) with its first published or
/// completed description and its application count
const LISTING_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT o.id, o.title, o.opportunity_type, o.created_at, to_jsonb(d) AS description,
           (SELECT count(*) FROM "opportunity_applications" a WHERE a.opportunity_id = o.id) AS applicants
    FROM "opportunities" o
    LEFT JOIN LATERAL (
        SELECT id, title, description, location, hours, status, metadata, user_id, created_at, updated_at
        FROM "opportunity_description"
        WHERE opportunity_id = o.id AND status IN ('published', 'completed')
        ORDER BY created_at
        LIMIT 1
    ) d ON true
    WHERE $1::text IS NULL OR o.opportunity_type::text = $1
    ORDER BY o.created_at DESC
) _r"#;

/// A seeker's applications with their opportunity, form and first description
const SEEKER_APPLICATIONS_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT a.id, a.opportunity_id, a.seeker_user_id, a.form_id, a.application_data, a.status,
           a.submitted_at, a.updated_at, a.notes, a.selected_cv_id, a.selected_cv_name,
           json_build_object('id', o.id, 'title', o.title, 'opportunity_type', o.opportunity_type) AS opportunities,
           json_build_object('title', f.title, 'description', f.description) AS forms_templates,
           to_jsonb(d) AS opportunity_description
    FROM "opportunity_applications" a
    JOIN "opportunities" o ON o.id = a.opportunity_id
    JOIN "forms_templates" f ON f.id = a.form_id
    LEFT JOIN LATERAL (
        SELECT * FROM "opportunity_description"
        WHERE opportunity_id = a.opportunity_id
        ORDER BY created_at
        LIMIT 1
    ) d ON true
    WHERE a.seeker_user_id::text = $1
    ORDER BY a.submitted_at DESC
) _r"#;

pub fn routes() -> Router {
    Router::new()
        .route("/api/opportunities", get(list))
        .route("/api/opportunities/recent", get(recent))
        .route(
            "/api/opportunities/applications",
            get(seeker_applications).post(submit_application),
        )
        .route(
            "/api/opportunities/:id/evaluation",
            get(evaluations::opportunity_evaluation).post(evaluations::link_opportunity_evaluation),
        )
        .route(
            "/api/opportunities/applications/:id",
            put(update_application).delete(delete_application),
        )
}

/// Card shown in the "recent opportunities" strip
pub fn recent_item(row: &Value) -> Value {
    let description = row.get("first_description").filter(|d| d.is_object());
    let text = |key: &str, default: Value| match description.and_then(|d| d.get(key)) {
        Some(Value::String(s)) if !s.is_empty() => json!(s),
        _ => default,
    };
    let title = row.get("title").cloned().unwrap_or(Value::Null);
    json!({
        "id": row.get("id").cloned().unwrap_or(Value::Null),
        "title": title,
        "opportunity_type": row.get("opportunity_type").cloned().unwrap_or(Value::Null),
        "created_at": row.get("created_at").cloned().unwrap_or(Value::Null),
        "description_title": text("title", title.clone()),
        "description": text("description", json!("")),
        "location": text("location", json!("")),
        "hours": text("hours", json!("")),
        "status": text("status", json!("draft")),
    })
}

/// GET /api/opportunities/recent - degrades to `[]` when the database fails
pub async fn recent() -> Json<Value> {
    let rows = match pool() {
        Ok(pool) => fetch_rows(&pool, RECENT_SQL, vec![]).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match rows {
        Ok(rows) => Json(Value::Array(rows.iter().map(recent_item).collect())),
        Err(e) => {
            tracing::error!("Failed to fetch recent opportunities: {}", e);
            Json(json!([]))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub opportunity_type: Option<String>,
}

/// GET /api/opportunities?type= - board cards, newest first
pub async fn list(Query(query): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    let kind = query.opportunity_type.filter(|t| !t.is_empty());
    let pool = pool()?;
    let rows = fetch_rows(&pool, LISTING_SQL, vec![json!(kind)])
        .await
        .map_err(ApiError::from_db("Failed to fetch opportunities"))?;

    let now = Utc::now();
    Ok(Json(Value::Array(rows.iter().map(|row| listing_card(row, now)).collect())))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    #[serde(default)]
    pub opportunity_id: Option<Value>,
    #[serde(default)]
    pub seeker_user_id: Option<Value>,
    #[serde(default)]
    pub form_id: Option<Value>,
    #[serde(default)]
    pub application_data: Option<Value>,
    #[serde(default, rename = "selectedCVId")]
    pub selected_cv_id: Option<Value>,
    #[serde(default, rename = "selectedCVName")]
    pub selected_cv_name: Option<Value>,
    #[serde(default)]
    pub notes: Option<Value>,
}

impl NewApplication {
    /// Row to insert, or 400 when an id or the answers are missing
    pub fn into_record(self) -> Result<Map<String, Value>, ApiError> {
        let id = |v: &Option<Value>| v.as_ref().and_then(id_value);
        let (Some(opportunity_id), Some(seeker_user_id), Some(form_id), Some(application_data)) = (
            id(&self.opportunity_id),
            id(&self.seeker_user_id),
            id(&self.form_id),
            self.application_data.filter(|d| !d.is_null()),
        ) else {
            return Err(ApiError::bad_request("Missing required fields"));
        };

        let mut record = Map::new();
        record.insert("opportunity_id".into(), json!(opportunity_id));
        record.insert("seeker_user_id".into(), json!(seeker_user_id));
        record.insert("form_id".into(), json!(form_id));
        record.insert("application_data".into(), application_data);
        record.insert("selected_cv_id".into(), self.selected_cv_id.unwrap_or(Value::Null));
        record.insert("selected_cv_name".into(), self.selected_cv_name.unwrap_or(Value::Null));
        record.insert("notes".into(), self.notes.unwrap_or(Value::Null));
        record.insert("status".into(), json!("submitted"));
        Ok(record)
    }
}

/// POST /api/opportunities/applications - one application per seeker,
/// opportunity and form (409 on a repeat)
pub async fn submit_application(
    JsonBody(body): JsonBody<NewApplication>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    const FAILURE: &str = "Failed to submit application";
    let record = body.into_record()?;
    let pool = pool()?;

    let existing = QueryBuilder::table(APPLICATIONS_TABLE)
        .and_then(|q| q.select(&["id"]))
        .and_then(|q| {
            q.where_clause(json!({
                "opportunity_id": record["opportunity_id"],
                "seeker_user_id": record["seeker_user_id"],
                "form_id": record["form_id"],
            }))
        })
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;
    if existing.is_some() {
        return Err(ApiError::conflict("Application already submitted for this opportunity"));
    }

    let application = match QueryBuilder::table(APPLICATIONS_TABLE)?.insert(&pool, &record).await {
        Ok(row) => row,
        Err(e) if e.is_unique_violation() => {
            return Err(ApiError::conflict("Application already submitted for this opportunity"))
        }
        Err(e) => return Err(ApiError::from_db::<DatabaseError>(FAILURE)(e)),
    };

    tracing::info!("Application {} submitted for opportunity {}", application["id"], record["opportunity_id"]);
    Ok((StatusCode::CREATED, Json(json!({ "application": application }))))
}

#[derive(Debug, Deserialize)]
pub struct SeekerQuery {
    #[serde(rename = "seekerUserId")]
    pub seeker_user_id: Option<String>,
}

/// GET /api/opportunities/applications?seekerUserId=
pub async fn seeker_applications(Query(query): Query<SeekerQuery>) -> Result<Json<Value>, ApiError> {
    let seeker = query
        .seeker_user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing seekerUserId parameter"))?;
    let pool = pool()?;
    let applications = fetch_rows(&pool, SEEKER_APPLICATIONS_SQL, vec![json!(seeker)])
        .await
        .map_err(ApiError::from_db("Failed to fetch applications"))?;

    Ok(Json(json!({ "applications": applications })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    #[serde(default)]
    pub application_data: Option<Value>,
    #[serde(default)]
    pub notes: Option<Value>,
}

/// PUT /api/opportunities/applications/:id
pub async fn update_application(
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ApplicationUpdate>,
) -> Result<Json<Value>, ApiError> {
    let application_data = body
        .application_data
        .filter(|d| !d.is_null())
        .ok_or_else(|| ApiError::bad_request("Missing application data"))?;

    let mut updates = Map::new();
    updates.insert("application_data".into(), application_data);
    updates.insert("notes".into(), body.notes.unwrap_or(Value::Null));
    updates.insert("updated_at".into(), json!(now_iso()));

    let pool = pool()?;
    let rows = QueryBuilder::table(APPLICATIONS_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to update application"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update application"))?;

    Ok(Json(json!({ "application": single_row(rows, "Application not found")? })))
}

/// DELETE /api/opportunities/applications/:id
pub async fn delete_application(Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    QueryBuilder::table(APPLICATIONS_TABLE)
        .and_then(|q| q.where_clause(json!({ "id": id })))
        .map_err(ApiError::from_db("Failed to delete application"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete application"))?;

    Ok(Json(json!({ "message": "Application deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_item_reads_first_description() {
        let row = json!({
            "id": "o-1",
            "title": "Field officer",
            "opportunity_type": "job",
            "created_at": "2024-03-01T10:00:00+00:00",
            "first_description": {"title": "Field officer (Gaza)", "description": "Coordinate", "location": "Gaza", "hours": null, "status": "published"}
        });
        let item = recent_item(&row);
        assert_eq!(item["description_title"], "Field officer (Gaza)");
        assert_eq!(item["location"], "Gaza");
        assert_eq!(item["hours"], "");
        assert_eq!(item["status"], "published");
    }

    #[test]
    fn recent_item_without_description_uses_defaults() {
        let item = recent_item(&json!({"id": "o-2", "title": "Grant", "opportunity_type": "funding", "first_description": null}));
        assert_eq!(item["description_title"], "Grant");
        assert_eq!(item["description"], "");
        assert_eq!(item["status"], "draft");
    }

    #[test]
    fn new_application_requires_ids_and_answers() {
        let body: NewApplication = serde_json::from_value(json!({
            "opportunityId": "o-1",
            "seekerUserId": "u-1",
            "formId": 12,
            "applicationData": {"motivation": "Olive farming"},
            "selectedCVId": "cv-3",
            "selectedCVName": "Main CV"
        }))
        .unwrap();
        let record = body.into_record().unwrap();
        assert_eq!(record["form_id"], "12");
        assert_eq!(record["status"], "submitted");
        assert_eq!(record["selected_cv_id"], "cv-3");
        assert_eq!(record["selected_cv_name"], "Main CV");
        assert_eq!(record["notes"], Value::Null);

        let body: NewApplication =
            serde_json::from_value(json!({"opportunityId": "o-1", "seekerUserId": "u-1", "formId": "f-1"})).unwrap();
        assert_eq!(body.into_record().unwrap_err().message(), "Missing required fields");
    }

    #[test]
    fn board_query_filters_type_only_when_given() {
        assert!(LISTING_SQL.contains("$1::text IS NULL OR o.opportunity_type::text = $1"));
        assert!(LISTING_SQL.contains("status IN ('published', 'completed')"));
        assert!(SEEKER_APPLICATIONS_SQL.contains("a.seeker_user_id::text = $1"));
    }

    #[test]
    fn application_update_reads_camel_case() {
        let body: ApplicationUpdate =
            serde_json::from_value(json!({"applicationData": {"cover": "..."}, "notes": "shortlisted"})).unwrap();
        assert!(body.application_data.is_some());
        assert_eq!(body.notes, Some(json!("shortlisted")));
    }
}
