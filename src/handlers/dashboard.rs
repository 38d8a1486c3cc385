// handlers/dashboard.rs - Admin dashboard statistics (/api/dashboard/*)
//
// Rows are fetched here; the aggregation itself lives in services::stats.

use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::database::models::stats::{ApplicationRow, CvOwnerRow, FormRow, OpportunityStatsRow, UserTypeRow};
use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::pool;
use crate::services::stats::{
    application_stats, forms_stats, opportunity_stats, recent_activities, user_stats, ActivityItem,
    ApplicationStats, FormsStats, OpportunityStats, RecentApplication, RecentDescription, UserStats,
};

/// Each opportunity with the status and timestamp of its first description;
/// opportunities without a description are left out
const OPPORTUNITY_STATS_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT o.created_at, d.status AS description_status, d.created_at AS description_created_at
    FROM "opportunities" o
    JOIN LATERAL (
        SELECT status, created_at FROM "opportunity_description"
        WHERE opportunity_id = o.id
        ORDER BY created_at
        LIMIT 1
    ) d ON true
) _r"#;

const RECENT_APPLICATIONS_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT a.id, a.status, a.submitted_at, d.title AS opportunity_title, u.full_name AS applicant_name
    FROM "opportunity_applications" a
    JOIN "users" u ON u.id = a.seeker_user_id
    JOIN LATERAL (
        SELECT title FROM "opportunity_description"
        WHERE opportunity_id = a.opportunity_id
        LIMIT 1
    ) d ON true
    ORDER BY a.submitted_at DESC NULLS LAST
    LIMIT 5
) _r"#;

const RECENT_SOURCE_LIMIT: i64 = 5;

pub fn routes() -> Router {
    Router::new()
        .route("/api/dashboard/application-stats", get(application_statistics))
        .route("/api/dashboard/forms-stats", get(forms_statistics))
        .route("/api/dashboard/user-stats", get(user_statistics))
        .route("/api/dashboard/opportunity-stats", get(opportunity_statistics))
        .route("/api/dashboard/recent-activities", get(activities))
}

fn decode<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DatabaseError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| DatabaseError::QueryError(e.to_string())))
        .collect()
}

pub async fn application_statistics() -> Result<Json<ApplicationStats>, ApiError> {
    const FAILURE: &str = "Failed to fetch application statistics";
    let pool = pool()?;
    let rows: Vec<ApplicationRow> = QueryBuilder::table("opportunity_applications")
        .and_then(|q| q.select(&["status", "submitted_at"]))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_all_as(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;

    Ok(Json(application_stats(&rows, Utc::now())))
}

pub async fn forms_statistics() -> Result<Json<FormsStats>, ApiError> {
    const FAILURE: &str = "Failed to fetch forms statistics";
    let pool = pool()?;
    let rows: Vec<FormRow> = QueryBuilder::table("forms_templates")
        .and_then(|q| q.select(&["id", "published", "status", "created_at"]))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_all_as(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;

    Ok(Json(forms_stats(&rows, Utc::now())))
}

pub async fn user_statistics() -> Result<Json<UserStats>, ApiError> {
    const FAILURE: &str = "Failed to fetch user statistics";
    let pool = pool()?;
    let users: Vec<UserTypeRow> = QueryBuilder::table("users")
        .and_then(|q| q.select(&["id", "user_type"]))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_all_as(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;
    let ngo_profiles = QueryBuilder::table("ngo_profile")
        .map_err(ApiError::from_db(FAILURE))?
        .count(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;
    let cv_owners: Vec<CvOwnerRow> = QueryBuilder::table("cvs")
        .and_then(|q| q.select(&["user_id"]))
        .and_then(|q| q.where_clause(json!({ "user_id": { "$null": false } })))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_all_as(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;

    Ok(Json(user_stats(&users, ngo_profiles.max(0) as usize, &cv_owners)))
}

pub async fn opportunity_statistics() -> Result<Json<OpportunityStats>, ApiError> {
    const FAILURE: &str = "Failed to fetch opportunity statistics";
    let pool = pool()?;
    let rows = fetch_rows(&pool, OPPORTUNITY_STATS_SQL, vec![])
        .await
        .and_then(decode::<OpportunityStatsRow>)
        .map_err(ApiError::from_db(FAILURE))?;

    Ok(Json(opportunity_stats(&rows, Utc::now())))
}

pub async fn activities() -> Result<Json<Vec<ActivityItem>>, ApiError> {
    const FAILURE: &str = "Failed to fetch recent activities";
    let pool = pool()?;
    let applications = fetch_rows(&pool, RECENT_APPLICATIONS_SQL, vec![])
        .await
        .and_then(decode::<RecentApplication>)
        .map_err(ApiError::from_db(FAILURE))?;
    let descriptions: Vec<RecentDescription> = QueryBuilder::table("opportunity_description")
        .and_then(|q| q.select(&["id", "title", "description", "created_at", "status"]))
        .and_then(|q| q.order("created_at desc"))
        .and_then(|q| q.limit(RECENT_SOURCE_LIMIT, None))
        .map_err(ApiError::from_db(FAILURE))?
        .fetch_all_as(&pool)
        .await
        .map_err(ApiError::from_db(FAILURE))?;

    Ok(Json(recent_activities(applications, descriptions)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_applications_join_the_applicant() {
        assert!(RECENT_APPLICATIONS_SQL.contains("u.id = a.seeker_user_id"));
        assert!(!RECENT_APPLICATIONS_SQL.contains("a.user_id"));
    }

    #[test]
    fn opportunity_stats_skip_undescribed_rows() {
        assert!(OPPORTUNITY_STATS_SQL.contains("JOIN LATERAL"));
        assert!(!OPPORTUNITY_STATS_SQL.contains("LEFT JOIN"));
    }
}
