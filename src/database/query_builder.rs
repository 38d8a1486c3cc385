use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgExecutor};
use sqlx::{query::Query, Postgres, Row};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::config;
use crate::database::manager::DatabaseError;
use crate::filter::{is_valid_identifier, Filter};

/// Table-scoped query over JSON rows.
///
/// Every statement returns rows as JSON objects (`row_to_json`), so callers
/// can reshape them without a typed model per table. Writes go through
/// `jsonb_populate_record`, which lets Postgres coerce each JSON value to the
/// column's declared type.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    filter: Filter,
}

impl QueryBuilder {
    pub fn table(table_name: &str) -> Result<Self, DatabaseError> {
        Ok(Self { filter: Filter::new(table_name)? })
    }

    pub fn select(mut self, columns: &[&str]) -> Result<Self, DatabaseError> {
        self.filter.select(columns)?;
        Ok(self)
    }

    pub fn where_clause(mut self, conditions: Value) -> Result<Self, DatabaseError> {
        self.filter.where_clause(conditions)?;
        Ok(self)
    }

    /// Order spec such as `"created_at desc"` or `"sort_order asc, id"`
    pub fn order(mut self, order: &str) -> Result<Self, DatabaseError> {
        self.filter.order(Value::String(order.to_string()))?;
        Ok(self)
    }

    pub fn limit(mut self, limit: i64, offset: Option<i64>) -> Result<Self, DatabaseError> {
        self.filter.limit(limit, offset)?;
        Ok(self)
    }

    fn table_name(&self) -> &str {
        self.filter.table_name()
    }

    pub async fn fetch_all<'e, E>(&self, executor: E) -> Result<Vec<Value>, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        let sql = self.filter.to_sql()?;
        let query = format!("SELECT row_to_json(_r) AS row FROM ({}) _r", sql.query);
        fetch_rows(executor, &query, sql.params).await
    }

    /// Rows deserialized into a typed model
    pub async fn fetch_all_as<'e, T, E>(&self, executor: E) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
        E: PgExecutor<'e>,
    {
        self.fetch_all(executor)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DatabaseError::QueryError(e.to_string())))
            .collect()
    }

    pub async fn fetch_optional<'e, E>(&self, executor: E) -> Result<Option<Value>, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        let mut rows = self.clone().limit(1, None)?.fetch_all(executor).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    /// Like `fetch_optional`, but a missing row is `DatabaseError::NotFound`
    pub async fn fetch_one<'e, E>(&self, executor: E) -> Result<Value, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        self.fetch_optional(executor)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No matching row in {}", self.table_name())))
    }

    pub async fn count<'e, E>(&self, executor: E) -> Result<i64, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        let sql = self.filter.to_count_sql()?;
        let started = Instant::now();
        let mut q = sqlx::query(&sql.query);
        for p in sql.params {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(executor).await?;
        log_timing(&sql.query, started);
        Ok(row.try_get::<i64, _>("count")?)
    }

    /// Inserts one row built from `data` and returns it
    pub async fn insert<'e, E>(&self, executor: E, data: &Map<String, Value>) -> Result<Value, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        let table = self.table_name();
        let query = if data.is_empty() {
            format!("INSERT INTO \"{table}\" DEFAULT VALUES RETURNING row_to_json(\"{table}\".*) AS row")
        } else {
            let columns = column_list(data)?;
            format!(
                "INSERT INTO \"{table}\" ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::\"{table}\", $1::jsonb) RETURNING row_to_json(\"{table}\".*) AS row"
            )
        };
        let params = if data.is_empty() { vec![] } else { vec![Value::Object(data.clone())] };
        let mut rows = fetch_rows(executor, &query, params).await?;
        rows.pop()
            .ok_or_else(|| DatabaseError::QueryError(format!("INSERT into {} returned no row", table)))
    }

    /// Applies `data` to every row matching the where clause and returns the
    /// updated rows
    pub async fn update<'e, E>(&self, executor: E, data: &Map<String, Value>) -> Result<Vec<Value>, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        if data.is_empty() {
            return Err(DatabaseError::QueryError("UPDATE requires at least one column".to_string()));
        }
        let table = self.table_name();
        let columns = column_list(data)?;
        let where_sql = self.filter.to_where_sql(1)?;
        let query = format!(
            "UPDATE \"{table}\" SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::\"{table}\", $1::jsonb)) WHERE {} RETURNING row_to_json(\"{table}\".*) AS row",
            where_sql.query
        );
        let mut params = vec![Value::Object(data.clone())];
        params.extend(where_sql.params);
        fetch_rows(executor, &query, params).await
    }

    pub async fn delete<'e, E>(&self, executor: E) -> Result<u64, DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        let where_sql = self.filter.to_where_sql(0)?;
        let query = format!("DELETE FROM \"{}\" WHERE {}", self.table_name(), where_sql.query);
        let started = Instant::now();
        let mut q = sqlx::query(&query);
        for p in where_sql.params {
            q = bind_param(q, p);
        }
        let result = q.execute(executor).await?;
        log_timing(&query, started);
        Ok(result.rows_affected())
    }
}

/// Runs a statement whose single output column is a JSON row named `row`
pub async fn fetch_rows<'e, E>(executor: E, query: &str, params: Vec<Value>) -> Result<Vec<Value>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let started = Instant::now();
    let mut q = sqlx::query(query);
    for p in params {
        q = bind_param(q, p);
    }
    let rows = q.fetch_all(executor).await?;
    log_timing(query, started);
    rows.iter()
        .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
        .collect()
}

fn column_list(data: &Map<String, Value>) -> Result<String, DatabaseError> {
    let mut columns = Vec::with_capacity(data.len());
    for key in data.keys() {
        if !is_valid_identifier(key) {
            return Err(DatabaseError::QueryError(format!("Invalid column name: {}", key)));
        }
        columns.push(format!("\"{}\"", key));
    }
    Ok(columns.join(", "))
}

fn log_timing(query: &str, started: Instant) {
    let db = &config().database;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if db.enable_query_logging {
        debug!(elapsed_ms, "SQL: {}", query);
    }
    if elapsed_ms >= db.slow_query_threshold_ms {
        warn!(elapsed_ms, "Slow query: {}", query);
    }
}

pub fn bind_param<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: Value,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => q.bind(None::<String>),
        Value::Bool(b) => q.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays and objects travel as JSONB
        other => q.bind(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_list_quotes_and_validates() {
        let data = json!({"title": "x", "is_admin_template": true});
        let map = data.as_object().unwrap();
        assert_eq!(column_list(map).unwrap(), "\"title\", \"is_admin_template\"");

        let bad = json!({"title; drop": 1});
        assert!(column_list(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn builder_rejects_bad_table() {
        assert!(QueryBuilder::table("ngo profile").is_err());
        assert!(QueryBuilder::table("ngo_profile").unwrap().order("created_at desc").is_ok());
    }
}
