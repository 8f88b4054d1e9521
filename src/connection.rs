//! DuckDB connection wrapper holding the collection schema.
//!
//! Rows come back as `serde_json` maps so callers can deserialize them into
//! plain structs; nothing returned here stays attached to the database.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use duckdb::types::{Value, ValueRef};
use duckdb::Connection as DuckDbConnection;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{CollectionError, Result};

/// One table for all three card categories, told apart by `category`.
///
/// `external_id` and `(set_id, local_number)` carry UNIQUE constraints so a
/// duplicate insert fails inside the database even if an earlier existence
/// check raced with another import.
const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS card_id_seq START 1;
CREATE TABLE IF NOT EXISTS cards (
    id BIGINT PRIMARY KEY DEFAULT nextval('card_id_seq'),
    external_id VARCHAR NOT NULL UNIQUE,
    category VARCHAR NOT NULL,
    name VARCHAR NOT NULL,
    set_id VARCHAR NOT NULL,
    set_name VARCHAR NOT NULL,
    local_number VARCHAR,
    rarity VARCHAR,
    illustrator VARCHAR,
    image VARCHAR,
    variant_normal BOOLEAN NOT NULL DEFAULT FALSE,
    variant_reverse BOOLEAN NOT NULL DEFAULT FALSE,
    variant_holo BOOLEAN NOT NULL DEFAULT FALSE,
    variant_first_edition BOOLEAN NOT NULL DEFAULT FALSE,
    cardmarket_avg_eur DOUBLE,
    tcgplayer_market_usd DOUBLE,
    estimated_value DOUBLE,
    acquired_at_ms BIGINT NOT NULL,
    last_synced_at_ms BIGINT NOT NULL,
    notes VARCHAR,
    card_condition VARCHAR,
    dex_ids VARCHAR,
    hp INTEGER,
    types VARCHAR,
    evolves_from VARCHAR,
    flavor_text VARCHAR,
    stage VARCHAR,
    attacks VARCHAR,
    abilities VARCHAR,
    weaknesses VARCHAR,
    resistances VARCHAR,
    retreat_cost INTEGER,
    legal_standard BOOLEAN,
    legal_expanded BOOLEAN,
    effect VARCHAR,
    trainer_type VARCHAR,
    energy_type VARCHAR,
    UNIQUE (set_id, local_number)
);
CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);
CREATE INDEX IF NOT EXISTS idx_cards_acquired ON cards(acquired_at_ms);
";

pub type Row = HashMap<String, serde_json::Value>;

/// Owns the DuckDB handle for one collection database.
pub struct Connection {
    conn: DuckDbConnection,
}

impl Connection {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Opening collection database");
        Self::init(DuckDbConnection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(DuckDbConnection::open_in_memory()?)
    }

    fn init(conn: DuckDbConnection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Execute SQL and return every row as a column-name map.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;

        // Column metadata is only available once the query has run.
        let stmt_ref = rows.as_ref().ok_or_else(|| {
            CollectionError::OperationFailed("statement metadata unavailable".into())
        })?;
        let column_names: Vec<String> = stmt_ref
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = HashMap::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                map.insert(name.clone(), convert_value_ref(row.get_ref(i)?));
            }
            out.push(map);
        }
        Ok(out)
    }

    /// Execute SQL and deserialize each row into `T`.
    pub fn execute_into<T: DeserializeOwned>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.execute(sql, params)?
            .into_iter()
            .map(|row| {
                let value = serde_json::Value::Object(row.into_iter().collect());
                serde_json::from_value(value).map_err(CollectionError::from)
            })
            .collect()
    }

    /// First column of the first row, or `None` for an empty result.
    pub fn execute_scalar(&self, sql: &str, params: &[Value]) -> Result<Option<serde_json::Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;
        match rows.next()? {
            Some(row) => Ok(Some(convert_value_ref(row.get_ref(0)?))),
            None => Ok(None),
        }
    }

    /// Run a statement that returns no rows; yields the affected row count.
    pub fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<usize> {
        Ok(self
            .conn
            .execute(sql, duckdb::params_from_iter(params.iter()))?)
    }
}

/// True when DuckDB rejected a write because of a UNIQUE / PRIMARY KEY
/// constraint.
pub fn is_constraint_violation(err: &duckdb::Error) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("duplicate key")
        || message.contains("unique constraint")
        || message.contains("primary key constraint")
}

/// Convert a DuckDB `ValueRef` to a `serde_json::Value`.
fn convert_value_ref(val: ValueRef<'_>) -> serde_json::Value {
    match val {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::SmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::Int(n) => serde_json::Value::Number(n.into()),
        ValueRef::BigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UTinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::USmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UBigInt(n) => serde_json::Value::Number(n.into()),
        // SUM over BIGINT widens to HUGEINT
        ValueRef::HugeInt(n) => match i64::try_from(n) {
            Ok(i) => serde_json::Value::Number(i.into()),
            Err(_) => serde_json::Value::String(n.to_string()),
        },
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).to_string())
        }
        _ => serde_json::Value::Null,
    }
}
