//! Parameterized SELECT builder for the collection's read paths.
//!
//! Values are always bound through `?` placeholders as DuckDB [`Value`]s,
//! so integers and booleans keep their types.
//!
//! # Example
//!
//! ```rust
//! use pkmn_collection::SqlBuilder;
//! let (sql, params) = SqlBuilder::new("cards")
//!     .where_eq("category", "pokemon".to_string())
//!     .where_contains("name", "furr")
//!     .order_by(&["acquired_at_ms DESC"])
//!     .limit(10)
//!     .build();
//! assert!(sql.contains("LIMIT 10"));
//! assert_eq!(params.len(), 2);
//! ```

use duckdb::types::Value;

pub struct SqlBuilder {
    select_cols: Vec<String>,
    from_table: String,
    where_clauses: Vec<String>,
    params: Vec<Value>,
    group_by_cols: Vec<String>,
    order_by_cols: Vec<String>,
    limit_val: Option<i64>,
    offset_val: Option<i64>,
}

impl SqlBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            select_cols: vec!["*".to_string()],
            from_table: table.to_string(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            group_by_cols: Vec::new(),
            order_by_cols: Vec::new(),
            limit_val: None,
            offset_val: None,
        }
    }

    /// Replace the default `*` projection.
    pub fn select(&mut self, cols: &[&str]) -> &mut Self {
        self.select_cols = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// `{column} = ?`
    pub fn where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.where_clauses.push(format!("{} = ?", column));
        self.params.push(value.into());
        self
    }

    /// Case-insensitive substring match. `%` and `_` in `needle` are matched
    /// literally.
    pub fn where_contains(&mut self, column: &str, needle: &str) -> &mut Self {
        let escaped = needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        self.where_clauses
            .push(format!("{} ILIKE ? ESCAPE '\\'", column));
        self.params.push(Value::Text(format!("%{}%", escaped)));
        self
    }

    pub fn group_by(&mut self, cols: &[&str]) -> &mut Self {
        self.group_by_cols.extend(cols.iter().map(|c| c.to_string()));
        self
    }

    pub fn order_by(&mut self, clauses: &[&str]) -> &mut Self {
        self.order_by_cols.extend(clauses.iter().map(|c| c.to_string()));
        self
    }

    pub fn limit(&mut self, n: i64) -> &mut Self {
        self.limit_val = Some(n);
        self
    }

    pub fn offset(&mut self, n: i64) -> &mut Self {
        self.offset_val = Some(n);
        self
    }

    /// Build the SQL string and its parameter list.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut parts = vec![
            format!("SELECT {}", self.select_cols.join(", ")),
            format!("FROM {}", self.from_table),
        ];

        if !self.where_clauses.is_empty() {
            parts.push(format!("WHERE {}", self.where_clauses.join(" AND ")));
        }
        if !self.group_by_cols.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by_cols.join(", ")));
        }
        if !self.order_by_cols.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by_cols.join(", ")));
        }
        if let Some(n) = self.limit_val {
            parts.push(format!("LIMIT {}", n));
        }
        if let Some(n) = self.offset_val {
            parts.push(format!("OFFSET {}", n));
        }

        (parts.join("\n"), self.params.clone())
    }
}
