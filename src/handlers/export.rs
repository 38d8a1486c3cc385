// handlers/export.rs - POST /api/export/xlsx

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::services::export::{content_disposition, render_csv, EXPORT_CONTENT_TYPE};

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub filename: Option<String>,
}

pub async fn export_xlsx(JsonBody(body): JsonBody<ExportRequest>) -> Result<Response, ApiError> {
    let rows = match body.data {
        Some(Value::Array(rows)) if !rows.is_empty() => rows,
        _ => return Err(ApiError::bad_request("No data provided")),
    };
    let csv = render_csv(&rows).map_err(|e| ApiError::bad_request(e.to_string()))?;

    tracing::debug!("Exported {} rows", rows.len());
    Ok((
        [
            (header::CONTENT_TYPE, EXPORT_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(body.filename.as_deref())),
        ],
        csv,
    )
        .into_response())
}
