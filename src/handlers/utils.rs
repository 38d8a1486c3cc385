// handlers/utils.rs - Shared request helpers

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::filter::is_valid_identifier;

/// Columns no client update may touch
const IMMUTABLE_COLUMNS: &[&str] = &["id", "created_at"];

pub fn pool() -> Result<PgPool, ApiError> {
    DatabaseManager::main_pool().map_err(ApiError::from)
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Non-blank string field of a JSON object
pub fn text_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Identifier from a JSON value, accepting non-blank strings and numbers
pub fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Identifier taken from a JSON body, accepting strings and numbers
pub fn id_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(id_value)
}

/// Splits `{id, ...updates}` into its id and a validated update map.
///
/// Update keys must be plain column names; `extra_protected` names columns
/// that are immutable for this resource on top of `id` and `created_at`.
pub fn split_id_and_updates(
    body: Value,
    missing_id_message: &str,
    extra_protected: &[&str],
) -> Result<(String, Map<String, Value>), ApiError> {
    let id = id_field(&body, "id").ok_or_else(|| ApiError::bad_request(missing_id_message))?;
    let Value::Object(mut fields) = body else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    fields.remove("id");
    validate_update_columns(&fields, extra_protected)?;
    Ok((id, fields))
}

pub fn validate_update_columns(fields: &Map<String, Value>, extra_protected: &[&str]) -> Result<(), ApiError> {
    for key in fields.keys() {
        if !is_valid_identifier(key) {
            return Err(ApiError::bad_request(format!("Invalid field name: {}", key)));
        }
        if IMMUTABLE_COLUMNS.contains(&key.as_str()) || extra_protected.contains(&key.as_str()) {
            return Err(ApiError::bad_request(format!("Field '{}' cannot be updated", key)));
        }
    }
    Ok(())
}

/// First row of an update, or 404 with `not_found` when nothing matched
pub fn single_row(rows: Vec<Value>, not_found: &str) -> Result<Value, ApiError> {
    rows.into_iter().next().ok_or_else(|| ApiError::not_found(not_found))
}

/// String values of `key` across rows, skipping nulls
pub fn column_strings(rows: &[Value], key: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|row| match row.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// `(limit, offset)` from query text: unparsable or out-of-range values take
/// the defaults, and the limit never exceeds `max_limit`.
pub fn page_bounds(limit: Option<&str>, offset: Option<&str>, default_limit: i64, max_limit: i64) -> (i64, i64) {
    let parse = |v: Option<&str>| v.and_then(|s| s.trim().parse::<i64>().ok());
    let limit = parse(limit).filter(|l| *l > 0).unwrap_or(default_limit);
    let offset = parse(offset).filter(|o| *o >= 0).unwrap_or(0);
    (limit.min(max_limit), offset)
}
