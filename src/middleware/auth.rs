use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap, Uri},
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{decode_jwt, Claims};
use crate::config;
use crate::database::models::user::User;
use crate::database::query_builder::QueryBuilder;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::types::UserType;

/// How the caller's identity was established
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthSource {
    /// Verified bearer access token
    Token,
    /// `?userId=` or `x-user-id` looked up in `users`
    UserIdParam,
}

/// Authenticated caller
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub user_type: Option<UserType>,
    pub source: AuthSource,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            user_type: claims.user_metadata.user_type.and_then(|t| t.parse().ok()),
            source: AuthSource::Token,
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            user_type: user.user_type(),
            email: user.email,
            source: AuthSource::UserIdParam,
        }
    }
}

const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
struct UserIdQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

impl AuthUser {
    /// Resolves the caller without rejecting: `Ok(None)` means anonymous
    pub async fn resolve(headers: &HeaderMap, uri: &Uri) -> Result<Option<AuthUser>, ApiError> {
        if let Some(token) = extract_bearer(headers) {
            match decode_jwt(token) {
                Ok(claims) => return Ok(Some(claims.into())),
                Err(e) => tracing::warn!("Ignoring bearer token: {}", e),
            }
        }

        if !config::config().security.allow_user_id_param {
            return Ok(None);
        }
        match claimed_user_id(headers, uri) {
            Some(user_id) => Ok(find_user(&user_id).await?.map(AuthUser::from)),
            None => Ok(None),
        }
    }

    pub fn is_admin_claimed(&self) -> bool {
        self.user_type == Some(UserType::Admin)
    }
}

/// `?userId=` wins over the `x-user-id` header
fn claimed_user_id(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    Query::<UserIdQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.user_id)
        .or_else(|| headers.get(USER_ID_HEADER)?.to_str().ok().map(str::to_string))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Looks up a `users` row by id
pub async fn find_user(user_id: &str) -> Result<Option<User>, ApiError> {
    let pool = DatabaseManager::main_pool().map_err(ApiError::from_db("Failed to resolve user"))?;
    let row = QueryBuilder::table("users")
        .and_then(|q| q.select(&["id", "full_name", "email", "user_type", "auth_provider"]))
        .and_then(|q| q.where_clause(json!({ "id": user_id })))
        .map_err(ApiError::from_db("Failed to resolve user"))?
        .fetch_optional(&pool)
        .await
        .map_err(ApiError::from_db("Failed to resolve user"))?;

    row.map(serde_json::from_value::<User>)
        .transpose()
        .map_err(|e| {
            tracing::error!("Malformed users row: {}", e);
            ApiError::internal_server_error("Failed to resolve user")
        })
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AuthUser::resolve(&parts.headers, &parts.uri)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

/// Authenticated caller whose `users.user_type` is `Admin`
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AdminUser::require(&parts.headers, &parts.uri).await
    }
}

impl AdminUser {
    /// 401 without a caller, 403 unless `users.user_type` is `Admin`
    pub async fn require(headers: &HeaderMap, uri: &Uri) -> Result<AdminUser, ApiError> {
        let user = AuthUser::resolve(headers, uri)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

        // Token metadata is user-editable, so the role always comes from `users`
        let is_admin = match user.source {
            AuthSource::UserIdParam => user.is_admin_claimed(),
            AuthSource::Token => find_user(&user.id).await?.map_or(false, |u| u.is_admin()),
        };
        if !is_admin {
            tracing::warn!("Admin access denied for user {}", user.id);
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn user_id_comes_from_query_then_header() {
        let mut headers = HeaderMap::new();
        let bare: Uri = "/api/ngo/team".parse().unwrap();
        assert_eq!(claimed_user_id(&headers, &bare), None);

        headers.insert("x-user-id", HeaderValue::from_static(" u-header "));
        assert_eq!(claimed_user_id(&headers, &bare).as_deref(), Some("u-header"));

        let with_param: Uri = "/api/ngo/team?userId=u-query".parse().unwrap();
        assert_eq!(claimed_user_id(&headers, &with_param).as_deref(), Some("u-query"));

        headers.insert("x-user-id", HeaderValue::from_static("  "));
        assert_eq!(claimed_user_id(&headers, &bare), None);
    }

    #[test]
    fn claims_become_auth_user() {
        let claims = Claims {
            sub: "u-1".into(),
            email: Some("admin@zaytoonz.org".into()),
            aud: "authenticated".into(),
            role: None,
            exp: 0,
            iat: 0,
            user_metadata: crate::auth::UserMetadata { user_type: Some("Admin".into()), full_name: None },
        };
        let user = AuthUser::from(claims);
        assert_eq!(user.id, "u-1");
        assert_eq!(user.source, AuthSource::Token);
        assert!(user.is_admin_claimed());
    }
}
