use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{is_valid_identifier, FilterOrderInfo, SqlResult};

/// A SELECT over one table: projection, JSON where clause, ordering and a
/// limit/offset window.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_valid_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name));
        }
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn select(&mut self, columns: &[&str]) -> Result<&mut Self, FilterError> {
        for column in columns {
            if *column != "*" && !is_valid_identifier(column) {
                return Err(FilterError::InvalidColumn(column.to_string()));
            }
        }
        self.select_columns = columns.iter().map(|c| c.to_string()).collect();
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidPage("limit must be non-negative".to_string()));
        }
        if matches!(offset, Some(off) if off < 0) {
            return Err(FilterError::InvalidPage("offset must be non-negative".to_string()));
        }

        let max_limit = crate::config::config().api.max_page_size;
        let applied_limit = if limit > max_limit {
            tracing::warn!("Limit {} exceeds max page size {}, capping", limit, max_limit);
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_parts(0)?;
        let query = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    /// The WHERE predicate alone, with placeholders numbered after
    /// `starting_param_index` so callers can bind their own values first.
    pub fn to_where_sql(&self, starting_param_index: usize) -> Result<SqlResult, FilterError> {
        let (query, params) = self.where_parts(starting_param_index)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_parts(0)?;
        let query = format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_clause);
        Ok(SqlResult { query, params })
    }

    fn where_parts(&self, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        match self.where_data {
            Some(ref where_data) => FilterWhere::generate(where_data, starting_param_index),
            None => Ok(("1=1".to_string(), vec![])),
        }
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_select_with_where_order_and_window() {
        let mut filter = Filter::new("saved_sources").unwrap();
        filter
            .select(&["id", "name"])
            .unwrap()
            .where_clause(json!({"opportunity_type": "job", "is_active": true}))
            .unwrap()
            .order(json!("created_at desc"))
            .unwrap()
            .limit(10, Some(20))
            .unwrap();

        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT \"id\", \"name\" FROM \"saved_sources\" WHERE \"opportunity_type\"::text = $1 AND \"is_active\" = $2 ORDER BY \"created_at\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.params, vec![json!("job"), json!(true)]);
    }

    #[test]
    fn count_sql_shares_the_predicate() {
        let mut filter = Filter::new("extracted_opportunity_content").unwrap();
        filter.where_clause(json!({"status": "completed"})).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) AS count FROM \"extracted_opportunity_content\" WHERE \"status\"::text = $1"
        );
    }

    #[test]
    fn where_sql_offsets_placeholders() {
        let mut filter = Filter::new("ngo_profile").unwrap();
        filter.where_clause(json!({"user_id": "u1"})).unwrap();
        assert_eq!(filter.to_where_sql(1).unwrap().query, "\"user_id\"::text = $2");
    }

    #[test]
    fn rejects_unsafe_names_and_negative_windows() {
        assert!(Filter::new("users; --").is_err());
        let mut filter = Filter::new("users").unwrap();
        assert!(filter.select(&["email", "1bad"]).is_err());
        assert!(filter.limit(-1, None).is_err());
        assert!(filter.limit(5, Some(-1)).is_err());
    }

    #[test]
    fn limit_is_capped_by_page_size() {
        let mut filter = Filter::new("opportunities").unwrap();
        filter.limit(i64::MAX, None).unwrap();
        let max = crate::config::config().api.max_page_size;
        assert!(filter.to_sql().unwrap().query.ends_with(&format!("LIMIT {}", max)));
    }
}
