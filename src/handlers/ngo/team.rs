// handlers/ngo/team.rs - /api/ngo/team and /api/ngo/team/:id
//
// Team members are `assistant_ngo` users linked to the owner's profile
// through `ngo_users`. Only the profile owner may change or remove them.

use axum::{extract::Path, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::{fetch_rows, QueryBuilder};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{pool, text_field};
use crate::middleware::{AuthUser, JsonBody};
use crate::services::ngo::{team_member_view, team_profile_record, DEFAULT_TEAM_ROLE, DEFAULT_TEAM_STATUS};
use crate::types::UserType;

const MEMBERS_TABLE: &str = "ngo_users";

/// Member row with the user id of the profile it belongs to
const MEMBER_WITH_OWNER_SQL: &str = r#"
SELECT row_to_json(_r) AS row FROM (
    SELECT nu.*, p.user_id AS owner_user_id
    FROM "ngo_users" nu
    JOIN "ngo_profile" p ON p.id = nu.ngo_profile_id
    WHERE nu.user_id::text = $1
    LIMIT 1
) _r
"#;

async fn owner_profile_id(pool: &sqlx::PgPool, user_id: &str) -> Result<Value, ApiError> {
    let profile = QueryBuilder::table("ngo_profile")
        .and_then(|q| q.select(&["id"]))
        .and_then(|q| q.where_clause(json!({ "user_id": user_id })))
        .map_err(ApiError::from_db("Failed to fetch NGO profile"))?
        .fetch_optional(pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch NGO profile"))?;
    profile
        .map(|p| p["id"].clone())
        .ok_or_else(|| ApiError::not_found("NGO profile not found"))
}

/// GET - members of the caller's NGO, newest first
pub async fn list(user: AuthUser) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let profile_id = owner_profile_id(&pool, &user.id).await?;

    let members = QueryBuilder::table(MEMBERS_TABLE)
        .and_then(|q| q.where_clause(json!({ "ngo_profile_id": profile_id })))
        .and_then(|q| q.order("created_at desc"))
        .map_err(ApiError::from_db("Failed to fetch team members"))?
        .fetch_all(&pool)
        .await
        .map_err(ApiError::from_db("Failed to fetch team members"))?;

    let team: Vec<Value> = members.iter().map(team_member_view).collect();
    Ok(Json(json!({ "teamMembers": team })))
}

#[derive(Debug, Deserialize)]
pub struct NewMemberRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Validated new member
#[derive(Debug, PartialEq)]
pub struct NewMember {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl NewMemberRequest {
    pub fn validate(self) -> Result<NewMember, ApiError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (present(self.full_name), present(self.email), present(self.password)) {
            (Some(full_name), Some(email), Some(password)) => Ok(NewMember {
                full_name,
                email,
                password,
                role: present(self.role).unwrap_or_else(|| DEFAULT_TEAM_ROLE.to_string()),
            }),
            _ => Err(ApiError::bad_request("Missing required fields")),
        }
    }
}

/// User, profile and membership rows go in together or not at all
async fn create_member(
    pool: &sqlx::PgPool,
    member: &NewMember,
    profile_id: &Value,
    owner: &str,
) -> Result<Value, DatabaseError> {
    let mut user = Map::new();
    user.insert("full_name".into(), json!(member.full_name));
    user.insert("email".into(), json!(member.email));
    // Hashed by the users insert trigger
    user.insert("password_hash".into(), json!(member.password));
    user.insert("user_type".into(), json!(UserType::AssistantNgo.as_str()));
    user.insert("auth_provider".into(), json!("email"));

    let mut tx = pool.begin().await?;
    let created = QueryBuilder::table("users")?.insert(&mut *tx, &user).await?;
    QueryBuilder::table("ngo_profile")?
        .insert(&mut *tx, &team_profile_record(&created["id"], &member.email, owner, Utc::now()))
        .await?;

    let mut link = Map::new();
    link.insert("ngo_profile_id".into(), profile_id.clone());
    link.insert("user_id".into(), created["id"].clone());
    link.insert("full_name".into(), json!(member.full_name));
    link.insert("email".into(), json!(member.email));
    link.insert("role".into(), json!(member.role));
    link.insert("status".into(), json!(DEFAULT_TEAM_STATUS));
    link.insert("created_by".into(), json!(owner));
    let membership = QueryBuilder::table(MEMBERS_TABLE)?.insert(&mut *tx, &link).await?;
    tx.commit().await?;
    Ok(membership)
}

/// POST body `{full_name, email, password, role}`
pub async fn add(user: AuthUser, JsonBody(body): JsonBody<NewMemberRequest>) -> Result<Json<Value>, ApiError> {
    let member = body.validate()?;
    let pool = pool()?;
    let profile_id = owner_profile_id(&pool, &user.id).await?;

    let existing = QueryBuilder::table("users")
        .and_then(|q| q.select(&["id"]))
        .and_then(|q| q.where_clause(json!({ "email": member.email })))
        .map_err(ApiError::from_db("Failed to check if email exists"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to check if email exists"))?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let membership = match create_member(&pool, &member, &profile_id, &user.id).await {
        Ok(row) => row,
        Err(e) if e.is_unique_violation() => return Err(ApiError::bad_request("Email already registered")),
        Err(e) => return Err(ApiError::from_db::<DatabaseError>("Failed to create team member")(e)),
    };

    tracing::info!("NGO user {} added team member {}", user.id, membership["user_id"]);
    Ok(Json(json!({
        "success": true,
        "teamMember": team_member_view(&membership),
        "message": "Team member added successfully",
    })))
}

/// Member by user id, checked to belong to the caller's NGO
async fn owned_member(pool: &sqlx::PgPool, member_id: &str, caller: &str, denied: &str) -> Result<Value, ApiError> {
    let member = fetch_rows(pool, MEMBER_WITH_OWNER_SQL, vec![json!(member_id)])
        .await
        .map_err(ApiError::from_db("Failed to fetch team member"))?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Team member not found"))?;
    if member.get("owner_user_id").and_then(Value::as_str) != Some(caller) {
        tracing::warn!("User {} denied access to team member {}", caller, member_id);
        return Err(ApiError::forbidden(denied));
    }
    Ok(member)
}

/// Only non-blank `role` and `status` are applied
pub fn member_updates(body: &Value) -> Result<Map<String, Value>, ApiError> {
    let mut updates = Map::new();
    for key in ["role", "status"] {
        if let Some(value) = text_field(body, key) {
            updates.insert(key.into(), json!(value));
        }
    }
    if updates.is_empty() {
        return Err(ApiError::bad_request("No valid fields to update"));
    }
    Ok(updates)
}

/// PATCH /:id body `{role, status}`
pub async fn update(
    user: AuthUser,
    Path(member_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    owned_member(&pool, &member_id, &user.id, "Unauthorized to update this team member").await?;
    let updates = member_updates(&body)?;

    let rows = QueryBuilder::table(MEMBERS_TABLE)
        .and_then(|q| q.where_clause(json!({ "user_id": member_id })))
        .map_err(ApiError::from_db("Failed to update team member"))?
        .update(&pool, &updates)
        .await
        .map_err(ApiError::from_db("Failed to update team member"))?;
    let mut updated = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Team member not found"))?;
    if let Value::Object(map) = &mut updated {
        map.remove("password_hash");
    }

    Ok(Json(json!({
        "success": true,
        "teamMember": updated,
        "message": "Team member updated successfully",
    })))
}

/// DELETE /:id - removes the membership, then the member's account
pub async fn remove(user: AuthUser, Path(member_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let pool = pool()?;
    let member = owned_member(&pool, &member_id, &user.id, "Unauthorized to delete this team member").await?;

    QueryBuilder::table(MEMBERS_TABLE)
        .and_then(|q| q.where_clause(json!({ "user_id": member_id })))
        .map_err(ApiError::from_db("Failed to delete team member"))?
        .delete(&pool)
        .await
        .map_err(ApiError::from_db("Failed to delete team member"))?;

    if let Some(account) = member.get("user_id").filter(|id| !id.is_null()) {
        let deleted = match QueryBuilder::table("users").and_then(|q| q.where_clause(json!({ "id": account }))) {
            Ok(q) => q.delete(&pool).await,
            Err(e) => Err(e),
        };
        if let Err(e) = deleted {
            tracing::warn!("Removed team member {} but kept their account: {}", member_id, e);
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "Team member deleted successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: Value) -> NewMemberRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn new_members_need_name_email_and_password() {
        let err = request(json!({"full_name": "Karim", "email": "k@olive.org"})).validate().unwrap_err();
        assert_eq!(err.message(), "Missing required fields");

        let member = request(json!({"full_name": "Karim", "email": "k@olive.org", "password": "s3cret"}))
            .validate()
            .unwrap();
        assert_eq!(member.role, "member");

        let member = request(json!({"full_name": "Karim", "email": "k@olive.org", "password": "s3cret", "role": "editor"}))
            .validate()
            .unwrap();
        assert_eq!(member.role, "editor");
    }

    #[test]
    fn member_updates_take_role_and_status_only() {
        let updates = member_updates(&json!({"role": "admin", "status": "", "email": "x@y.org"})).unwrap();
        assert_eq!(Value::Object(updates), json!({"role": "admin"}));

        let err = member_updates(&json!({"email": "x@y.org"})).unwrap_err();
        assert_eq!(err.message(), "No valid fields to update");
    }

    #[test]
    fn ownership_lookup_joins_the_profile() {
        assert!(MEMBER_WITH_OWNER_SQL.contains("p.user_id AS owner_user_id"));
        assert!(MEMBER_WITH_OWNER_SQL.contains("nu.user_id::text = $1"));
    }
}
