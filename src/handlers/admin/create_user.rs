// handlers/admin/create_user.rs - POST /api/admin/create-user

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::handlers::utils::pool;
use crate::middleware::JsonBody;
use crate::types::UserType;

const USERS_TABLE: &str = "users";

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

/// A request whose four fields are all present and whose type is known
#[derive(Debug)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub user_type: UserType,
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<NewUser, ApiError> {
        let present = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.is_empty());
        let missing: Vec<&str> = [
            ("full_name", present(&self.full_name)),
            ("email", present(&self.email)),
            ("password", present(&self.password)),
            ("user_type", present(&self.user_type)),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(ApiError::missing_fields(
                "Full name, email, password, and user type are required",
                &missing,
            ));
        }

        let user_type = self
            .user_type
            .unwrap_or_default()
            .parse::<UserType>()
            .map_err(|_| ApiError::bad_request("Invalid user type"))?;

        Ok(NewUser {
            full_name: self.full_name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            user_type,
        })
    }
}

fn duplicate_email_error(existing: &Value) -> ApiError {
    match existing.get("auth_provider").and_then(Value::as_str) {
        Some("google") => ApiError::bad_request(
            "This email is already registered with Google. Please use a different email.",
        ),
        _ => ApiError::bad_request("Email already registered"),
    }
}

pub async fn create_user(JsonBody(body): JsonBody<CreateUserRequest>) -> Result<Json<Value>, ApiError> {
    let user = body.validate()?;
    let pool = pool()?;

    let existing = QueryBuilder::table(USERS_TABLE)
        .and_then(|q| q.select(&["email", "auth_provider"]))
        .and_then(|q| q.where_clause(json!({ "email": user.email })))
        .map_err(ApiError::from_db("Failed to check if email exists"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to check if email exists"))?;
    if let Some(existing) = existing {
        return Err(duplicate_email_error(&existing));
    }

    let mut record = Map::new();
    record.insert("full_name".into(), json!(user.full_name));
    record.insert("email".into(), json!(user.email));
    // Hashed by the users insert trigger
    record.insert("password_hash".into(), json!(user.password));
    record.insert("user_type".into(), json!(user.user_type.as_str()));
    record.insert("auth_provider".into(), json!("email"));

    let row = match QueryBuilder::table(USERS_TABLE)?.insert(&pool, &record).await {
        Ok(row) => row,
        Err(e) if e.is_unique_violation() => return Err(ApiError::bad_request("Email already registered")),
        Err(e) => return Err(ApiError::from_db("Failed to create user account")(e)),
    };

    tracing::info!("Admin created {} user {}", user.user_type, row["id"]);
    Ok(Json(json!({
        "user": {
            "id": row["id"],
            "fullName": row["full_name"],
            "email": row["email"],
            "userType": row["user_type"],
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn request(full_name: &str, email: &str, password: &str, user_type: &str) -> CreateUserRequest {
        let opt = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        CreateUserRequest {
            full_name: opt(full_name),
            email: opt(email),
            password: opt(password),
            user_type: opt(user_type),
        }
    }

    #[test]
    fn missing_fields_are_listed() {
        let err = request("Amina", "", "", "NGO").validate().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let body = err.to_json();
        assert_eq!(body["error"], "Full name, email, password, and user type are required");
        assert!(body["field_errors"].get("email").is_some());
        assert!(body["field_errors"].get("password").is_some());
        assert!(body["field_errors"].get("full_name").is_none());
    }

    #[test]
    fn unknown_user_type_is_rejected() {
        let err = request("Amina", "a@x.org", "pw", "Superuser").validate().unwrap_err();
        assert_eq!(err.message(), "Invalid user type");

        let ok = request("Amina", "a@x.org", "pw", "assistant_ngo").validate().unwrap();
        assert_eq!(ok.user_type, UserType::AssistantNgo);
    }

    #[test]
    fn google_accounts_get_their_own_message() {
        let err = duplicate_email_error(&json!({"email": "a@x.org", "auth_provider": "google"}));
        assert!(err.message().contains("Google"));
        let err = duplicate_email_error(&json!({"email": "a@x.org", "auth_provider": null}));
        assert_eq!(err.message(), "Email already registered");
    }
}
