// handlers/seeker.rs - /api/seeker/profile

use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::QueryBuilder;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{id_field, now_iso, pool};
use crate::middleware::JsonBody;

const PROFILES_TABLE: &str = "seeker_profiles";

/// Form fields (camelCase) and the columns they land in; blanks store null
const PROFILE_FIELDS: &[(&str, &str)] = &[
    ("dateOfBirth", "date_of_birth"),
    ("nationality", "nationality"),
    ("latestJobTitle", "latest_job_title"),
    ("yearsOfExperience", "years_of_experience"),
    ("aboutMe", "about_me"),
    ("profilePictureUrl", "profile_picture_url"),
];

pub fn routes() -> Router {
    Router::new().route("/api/seeker/profile", get(get_profile).post(save_profile))
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// GET - `{profile, user}`, each null when missing
pub async fn get_profile(Query(query): Query<ProfileQuery>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Some(user_id) = query.user_id.filter(|id| !id.trim().is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing user ID", "profile": null })),
        ));
    };
    let pool = pool()?;

    let profile = QueryBuilder::table(PROFILES_TABLE)
        .and_then(|q| q.where_clause(json!({ "user_id": user_id })))
        .map_err(ApiError::from_db("Failed to fetch profile"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch profile"))?;

    let user = match QueryBuilder::table("users")
        .and_then(|q| q.select(&["full_name", "email", "user_type"]))
        .and_then(|q| q.where_clause(json!({ "id": user_id })))
    {
        Ok(q) => q.fetch_optional(&pool).await,
        Err(e) => Err(e),
    }
    .unwrap_or_else(|e| {
        tracing::warn!("Seeker user lookup failed for {}: {}", user_id, e);
        None
    });

    Ok((StatusCode::OK, Json(json!({ "profile": profile, "user": user }))))
}

/// Row for `seeker_profiles` from the profile form
pub fn profile_record(user_id: &str, data: &Value) -> Map<String, Value> {
    let field = |key: &str| data.get(key).cloned().unwrap_or(Value::Null);
    let mut record = Map::new();
    record.insert("user_id".into(), json!(user_id));
    record.insert("first_name".into(), field("firstName"));
    record.insert("last_name".into(), field("lastName"));
    for (key, column) in PROFILE_FIELDS {
        let value = field(key);
        record.insert((*column).into(), if is_blank(&value) { Value::Null } else { value });
    }
    let fields = field("fieldsOfExperience");
    record.insert(
        "fields_of_experience".into(),
        if is_blank(&fields) { json!([]) } else { fields },
    );
    record.insert("updated_at".into(), json!(now_iso()));
    record
}

async fn upsert_profile(pool: &sqlx::PgPool, user_id: &str, record: &Map<String, Value>) -> Result<Value, DatabaseError> {
    let mut tx = pool.begin().await?;
    let existing = QueryBuilder::table(PROFILES_TABLE)?
        .select(&["id"])?
        .where_clause(json!({ "user_id": user_id }))?
        .fetch_optional(&mut *tx)
        .await?;
    let saved = match existing {
        Some(_) => QueryBuilder::table(PROFILES_TABLE)?
            .where_clause(json!({ "user_id": user_id }))?
            .update(&mut *tx, record)
            .await?
            .into_iter()
            .next()
            .unwrap_or(Value::Null),
        None => QueryBuilder::table(PROFILES_TABLE)?.insert(&mut *tx, record).await?,
    };
    tx.commit().await?;
    Ok(saved)
}

/// POST body `{userId, profileData}` - creates or replaces the profile
pub async fn save_profile(JsonBody(body): JsonBody<Value>) -> Result<Json<Value>, ApiError> {
    let user_id = id_field(&body, "userId");
    let data = body.get("profileData").filter(|d| d.is_object());
    let (Some(user_id), Some(data)) = (user_id, data) else {
        return Err(ApiError::bad_request("Missing user ID or profile data"));
    };

    let record = profile_record(&user_id, data);
    let pool = pool()?;
    let profile = upsert_profile(&pool, &user_id, &record)
        .await
        .map_err(ApiError::from_db("Failed to save profile"))?;

    Ok(Json(json!({ "success": true, "profile": profile })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_form_maps_to_columns() {
        let record = profile_record(
            "u-1",
            &json!({
                "firstName": "Salma",
                "lastName": "Ben Ali",
                "dateOfBirth": "",
                "nationality": "Tunisian",
                "yearsOfExperience": 4,
                "fieldsOfExperience": ["agronomy", "irrigation"]
            }),
        );
        assert_eq!(record["user_id"], "u-1");
        assert_eq!(record["first_name"], "Salma");
        assert_eq!(record["last_name"], "Ben Ali");
        assert_eq!(record["date_of_birth"], Value::Null);
        assert_eq!(record["nationality"], "Tunisian");
        assert_eq!(record["years_of_experience"], 4);
        assert_eq!(record["about_me"], Value::Null);
        assert_eq!(record["fields_of_experience"], json!(["agronomy", "irrigation"]));
        assert!(record.contains_key("updated_at"));
    }

    #[test]
    fn experience_fields_default_to_empty() {
        let record = profile_record("u-1", &json!({"firstName": "Karim", "yearsOfExperience": 0}));
        assert_eq!(record["fields_of_experience"], json!([]));
        assert_eq!(record["years_of_experience"], Value::Null);
        assert_eq!(record["last_name"], Value::Null);
    }
}
