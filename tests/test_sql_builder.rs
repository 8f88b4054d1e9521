//! Unit tests for the SqlBuilder query construction.

use duckdb::types::Value;
use pkmn_collection::SqlBuilder;

// ---------------------------------------------------------------------------
// Basic construction
// ---------------------------------------------------------------------------

#[test]
fn new_creates_select_star_from_table() {
    let (sql, params) = SqlBuilder::new("cards").build();
    assert_eq!(sql, "SELECT *\nFROM cards");
    assert!(params.is_empty());
}

#[test]
fn select_replaces_default_star() {
    let (sql, _) = SqlBuilder::new("cards")
        .select(&["name", "set_id"])
        .build();
    assert!(sql.starts_with("SELECT name, set_id\n"));
}

// ---------------------------------------------------------------------------
// WHERE conditions
// ---------------------------------------------------------------------------

#[test]
fn where_eq_binds_typed_param() {
    let (sql, params) = SqlBuilder::new("cards")
        .where_eq("id", Value::BigInt(7))
        .where_eq("set_id", "swsh3".to_string())
        .build();
    assert!(sql.contains("WHERE id = ? AND set_id = ?"));
    assert_eq!(params, vec![Value::BigInt(7), Value::Text("swsh3".into())]);
}

#[test]
fn where_contains_escapes_wildcards() {
    let (sql, params) = SqlBuilder::new("cards")
        .where_contains("name", "50%_off")
        .build();
    assert!(sql.contains("name ILIKE ? ESCAPE '\\'"));
    assert_eq!(params, vec![Value::Text("%50\\%\\_off%".into())]);
}

#[test]
fn blank_needle_matches_everything() {
    let (_, params) = SqlBuilder::new("cards").where_contains("name", "").build();
    assert_eq!(params, vec![Value::Text("%%".into())]);
}

// ---------------------------------------------------------------------------
// Grouping, ordering, paging
// ---------------------------------------------------------------------------

#[test]
fn clauses_come_out_in_sql_order() {
    let (sql, _) = SqlBuilder::new("cards")
        .select(&["rarity", "COUNT(*)"])
        .group_by(&["rarity"])
        .order_by(&["rarity ASC"])
        .limit(10)
        .offset(20)
        .build();
    assert_eq!(
        sql,
        "SELECT rarity, COUNT(*)\nFROM cards\nGROUP BY rarity\nORDER BY rarity ASC\nLIMIT 10\nOFFSET 20"
    );
}

#[test]
fn order_by_accumulates() {
    let (sql, _) = SqlBuilder::new("cards")
        .order_by(&["acquired_at_ms DESC"])
        .order_by(&["id DESC"])
        .build();
    assert!(sql.ends_with("ORDER BY acquired_at_ms DESC, id DESC"));
}
