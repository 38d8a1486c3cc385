use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// `Json<T>` whose rejection is the API's 400 envelope
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::debug!("Rejected request body: {}", rejection);
                Err(ApiError::invalid_json("Invalid JSON body"))
            }
        }
    }
}

/// A body that may be empty; empty reads as `Value::Null`
#[derive(Debug, Clone)]
pub struct OptionalJsonBody(pub Value);

#[axum::async_trait]
impl<S> FromRequest<S> for OptionalJsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::invalid_json("Invalid JSON body"))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJsonBody(Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(OptionalJsonBody)
            .map_err(|_| ApiError::invalid_json("Invalid JSON body"))
    }
}
