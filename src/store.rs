//! The local collection, persisted in DuckDB.
//!
//! Every operation is async and cancellable. The DuckDB handle sits behind a
//! mutex and each call runs on tokio's blocking pool, one statement batch at
//! a time. Reads stop waiting as soon as the token fires; writes check the
//! token before they start and then run to completion, so a cancelled call
//! never leaves half a change behind.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::connection::{is_constraint_violation, Connection};
use crate::error::{CollectionError, Result};
use crate::models::{
    Card, CardCondition, CardDetails, CardPrices, Category, CollectionStats, EnergyDetails,
    EnergyKind, PokemonDetails, PrintVariants, RarityCount, TrainerDetails, TrainerKind,
};
use crate::sql_builder::SqlBuilder;

const TABLE: &str = "cards";
const NEWEST_FIRST: &[&str] = &["acquired_at_ms DESC", "id DESC"];
const BY_NAME: &[&str] = &["name ASC", "id ASC"];

/// Clamp user-supplied paging input to `(limit, offset)`.
///
/// Pages start at 1; anything lower is page 1. A non-positive size means
/// [`DEFAULT_PAGE_SIZE`], and sizes above [`MAX_PAGE_SIZE`] are capped.
pub fn page_window(page: i64, page_size: i64) -> (i64, i64) {
    let page = page.max(1);
    let size = if page_size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size.min(MAX_PAGE_SIZE)
    };
    (size, (page - 1).saturating_mul(size))
}

// ---------------------------------------------------------------------------
// CollectionStore
// ---------------------------------------------------------------------------

/// Async handle to the collection database. Cheap to clone.
#[derive(Clone)]
pub struct CollectionStore {
    conn: Arc<Mutex<Connection>>,
}

impl CollectionStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open (or create) a collection database file.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Connection::open(path))
            .await
            .map_err(|e| CollectionError::OperationFailed(format!("Task join error: {e}")))?
            .map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self> {
        Connection::open_in_memory().map(Self::new)
    }

    // -- Lookups -----------------------------------------------------------

    pub async fn exists(&self, external_id: &str, cancel: &CancellationToken) -> Result<bool> {
        let external_id = external_id.trim().to_string();
        self.read(cancel, move |conn| {
            let found = conn.execute_scalar(
                "SELECT 1 FROM cards WHERE external_id = ? LIMIT 1",
                &[Value::Text(external_id)],
            )?;
            Ok(found.is_some())
        })
        .await
    }

    pub async fn get_by_id(&self, id: i64, cancel: &CancellationToken) -> Result<Option<Card>> {
        self.read(cancel, move |conn| fetch_by_id(conn, id)).await
    }

    pub async fn get_by_external_id(
        &self,
        external_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Card>> {
        let mut qb = SqlBuilder::new(TABLE);
        qb.where_eq("external_id", external_id.trim().to_string()).limit(1);
        let cards = self.select(qb, cancel).await?;
        Ok(cards.into_iter().next())
    }

    /// Case-insensitive substring search on the card name. A blank needle
    /// matches nothing.
    pub async fn find_by_name(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<Card>> {
        let needle = text.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = SqlBuilder::new(TABLE);
        qb.where_contains("name", needle).order_by(BY_NAME);
        self.select(qb, cancel).await
    }

    /// Exact match on the card's number within its set.
    pub async fn find_by_number(&self, number: &str, cancel: &CancellationToken) -> Result<Vec<Card>> {
        let mut qb = SqlBuilder::new(TABLE);
        qb.where_eq("local_number", number.trim().to_string())
            .order_by(&["set_id ASC", "id ASC"]);
        self.select(qb, cancel).await
    }

    pub async fn find_by_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<Vec<Card>> {
        let mut qb = SqlBuilder::new(TABLE);
        qb.where_eq("category", category.as_str().to_string())
            .order_by(BY_NAME);
        self.select(qb, cancel).await
    }

    pub async fn find_by_set(&self, set_id: &str, cancel: &CancellationToken) -> Result<Vec<Card>> {
        let mut qb = SqlBuilder::new(TABLE);
        qb.where_eq("set_id", set_id.trim().to_string())
            .order_by(&["local_number ASC", "id ASC"]);
        self.select(qb, cancel).await
    }

    /// One page of the collection, newest acquisitions first. See
    /// [`page_window`] for how out-of-range input is clamped.
    pub async fn page(
        &self,
        page: i64,
        page_size: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Card>> {
        let (limit, offset) = page_window(page, page_size);
        let mut qb = SqlBuilder::new(TABLE);
        qb.order_by(NEWEST_FIRST).limit(limit).offset(offset);
        self.select(qb, cancel).await
    }

    /// Number of pages needed to show the whole collection at `page_size`.
    pub async fn total_pages(&self, page_size: i64, cancel: &CancellationToken) -> Result<i64> {
        let (size, _) = page_window(1, page_size);
        let count = self.count(cancel).await?;
        Ok((count + size - 1) / size)
    }

    pub async fn count(&self, cancel: &CancellationToken) -> Result<i64> {
        self.read(cancel, |conn| {
            let value = conn.execute_scalar("SELECT COUNT(*) FROM cards", &[])?;
            Ok(value.and_then(|v| v.as_i64()).unwrap_or(0))
        })
        .await
    }

    /// Every card, ordered by local id.
    pub async fn all(&self, cancel: &CancellationToken) -> Result<Vec<Card>> {
        let mut qb = SqlBuilder::new(TABLE);
        qb.order_by(&["id ASC"]);
        self.select(qb, cancel).await
    }

    pub async fn stats(&self, cancel: &CancellationToken) -> Result<CollectionStats> {
        self.read(cancel, |conn| {
            let totals: Vec<StatsRow> = conn.execute_into(
                "SELECT
                    COUNT(*) AS total_cards,
                    COUNT(*) FILTER (WHERE category = 'pokemon') AS pokemon_count,
                    COUNT(*) FILTER (WHERE category = 'trainer') AS trainer_count,
                    COUNT(*) FILTER (WHERE category = 'energy') AS energy_count,
                    COUNT(DISTINCT set_id) AS distinct_sets,
                    COUNT(card_condition) AS graded_count,
                    COALESCE(SUM(cardmarket_avg_eur), 0.0) AS total_cardmarket_eur,
                    COALESCE(SUM(tcgplayer_market_usd), 0.0) AS total_tcgplayer_usd,
                    COALESCE(SUM(estimated_value), 0.0) AS total_estimated_value
                 FROM cards",
                &[],
            )?;
            let totals = totals.into_iter().next().unwrap_or_default();

            let (sql, params) = SqlBuilder::new(TABLE)
                .select(&["COALESCE(rarity, 'Unknown') AS rarity", "COUNT(*) AS \"count\""])
                .group_by(&["1"])
                .order_by(&["\"count\" DESC", "rarity ASC"])
                .build();
            let rarities: Vec<RarityCount> = conn.execute_into(&sql, &params)?;

            Ok(CollectionStats {
                total_cards: totals.total_cards,
                pokemon_count: totals.pokemon_count,
                trainer_count: totals.trainer_count,
                energy_count: totals.energy_count,
                distinct_sets: totals.distinct_sets,
                graded_count: totals.graded_count,
                total_cardmarket_eur: totals.total_cardmarket_eur,
                total_tcgplayer_usd: totals.total_tcgplayer_usd,
                total_estimated_value: totals.total_estimated_value,
                rarities,
            })
        })
        .await
    }

    // -- Writes ------------------------------------------------------------

    /// Insert a card and return it with its assigned local id.
    ///
    /// Fails with `Conflict` when the external id, or the set/number pair,
    /// is already present. The check is the database's UNIQUE constraint,
    /// so it also holds for concurrent inserts of the same card.
    pub async fn add(&self, card: &Card, cancel: &CancellationToken) -> Result<Card> {
        if card.external_id.trim().is_empty() {
            return Err(CollectionError::BadInput("card has no external id".into()));
        }
        let columns = insert_columns(card)?;
        let external_id = card.external_id.clone();

        self.write(cancel, move |conn| {
            let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO cards ({}) VALUES ({}) RETURNING id",
                names.join(", "),
                placeholders
            );
            let params: Vec<Value> = columns.into_iter().map(|(_, v)| v).collect();

            let id = match conn.execute_scalar(&sql, &params) {
                Ok(value) => value.and_then(|v| v.as_i64()).ok_or_else(|| {
                    CollectionError::OperationFailed("insert returned no id".into())
                })?,
                Err(CollectionError::Storage(e)) if is_constraint_violation(&e) => {
                    return Err(CollectionError::Conflict(format!(
                        "card {} is already in the collection",
                        external_id
                    )));
                }
                Err(e) => return Err(e),
            };
            debug!(id, %external_id, "Card inserted");

            fetch_by_id(conn, id)?.ok_or_else(|| {
                CollectionError::OperationFailed(format!("card {} vanished after insert", id))
            })
        })
        .await
    }

    /// Overwrite the mutable fields of an existing card.
    ///
    /// Identity (external id, name, set, number, acquisition time) is fixed
    /// at import, and so is the category: changing it is `BadInput`.
    pub async fn update(&self, card: &Card, cancel: &CancellationToken) -> Result<Card> {
        let id = card.id;
        let category = card.category();
        let columns = mutable_columns(card)?;

        self.write(cancel, move |conn| {
            let existing = require_card(conn, id)?;
            if existing.category() != category {
                return Err(CollectionError::BadInput(format!(
                    "card {} is a {} and cannot become a {}",
                    id,
                    existing.category(),
                    category
                )));
            }
            update_columns(conn, id, columns)
        })
        .await
    }

    pub async fn update_condition_and_notes(
        &self,
        id: i64,
        condition: Option<CardCondition>,
        notes: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Card> {
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.write(cancel, move |conn| {
            require_card(conn, id)?;
            update_columns(
                conn,
                id,
                vec![
                    ("card_condition", text(condition.map(|c| c.as_str()))),
                    ("notes", text(notes.as_deref())),
                ],
            )
        })
        .await
    }

    pub async fn set_estimated_value(
        &self,
        id: i64,
        value: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<Card> {
        if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Err(CollectionError::BadInput(
                "estimated value must be a non-negative number".into(),
            ));
        }
        self.write(cancel, move |conn| {
            require_card(conn, id)?;
            update_columns(conn, id, vec![("estimated_value", double(value))])
        })
        .await
    }

    /// Replace both market prices and stamp the sync time.
    pub async fn update_prices(
        &self,
        id: i64,
        prices: &CardPrices,
        synced_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Card> {
        let prices = *prices;
        self.write(cancel, move |conn| {
            require_card(conn, id)?;
            update_columns(
                conn,
                id,
                vec![
                    ("cardmarket_avg_eur", double(prices.cardmarket_avg_eur)),
                    ("tcgplayer_market_usd", double(prices.tcgplayer_market_usd)),
                    ("last_synced_at_ms", Value::BigInt(synced_at.timestamp_millis())),
                ],
            )
        })
        .await
    }

    /// Delete a card; `true` if a row was removed.
    pub async fn remove(&self, id: i64, cancel: &CancellationToken) -> Result<bool> {
        self.write(cancel, move |conn| {
            let affected =
                conn.execute_statement("DELETE FROM cards WHERE id = ?", &[Value::BigInt(id)])?;
            Ok(affected > 0)
        })
        .await
    }

    // -- Dispatch ----------------------------------------------------------

    async fn select(&self, qb: SqlBuilder, cancel: &CancellationToken) -> Result<Vec<Card>> {
        let (sql, params) = qb.build();
        self.read(cancel, move |conn| rows_to_cards(conn, &sql, &params))
            .await
    }

    async fn read<F, T>(&self, cancel: &CancellationToken, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CollectionError::Cancelled),
            result = self.dispatch(f) => result,
        }
    }

    async fn write<F, T>(&self, cancel: &CancellationToken, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        self.dispatch(f).await
    }

    async fn dispatch<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CollectionError::OperationFailed("store lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| CollectionError::OperationFailed(format!("Task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Row <-> Card
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CardRow {
    id: i64,
    external_id: String,
    category: String,
    name: String,
    set_id: String,
    set_name: String,
    local_number: Option<String>,
    rarity: Option<String>,
    illustrator: Option<String>,
    image: Option<String>,
    variant_normal: bool,
    variant_reverse: bool,
    variant_holo: bool,
    variant_first_edition: bool,
    cardmarket_avg_eur: Option<f64>,
    tcgplayer_market_usd: Option<f64>,
    estimated_value: Option<f64>,
    acquired_at_ms: i64,
    last_synced_at_ms: i64,
    notes: Option<String>,
    card_condition: Option<String>,
    dex_ids: Option<String>,
    hp: Option<i64>,
    types: Option<String>,
    evolves_from: Option<String>,
    flavor_text: Option<String>,
    stage: Option<String>,
    attacks: Option<String>,
    abilities: Option<String>,
    weaknesses: Option<String>,
    resistances: Option<String>,
    retreat_cost: Option<i64>,
    legal_standard: Option<bool>,
    legal_expanded: Option<bool>,
    effect: Option<String>,
    trainer_type: Option<String>,
    energy_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsRow {
    total_cards: i64,
    pokemon_count: i64,
    trainer_count: i64,
    energy_count: i64,
    distinct_sets: i64,
    graded_count: i64,
    total_cardmarket_eur: f64,
    total_tcgplayer_usd: f64,
    total_estimated_value: f64,
}

impl TryFrom<CardRow> for Card {
    type Error = CollectionError;

    fn try_from(row: CardRow) -> Result<Self> {
        let corrupt = |what: &str| {
            CollectionError::OperationFailed(format!("card row {} has invalid {}", row.id, what))
        };

        let category = Category::parse(&row.category).ok_or_else(|| corrupt("category"))?;
        let details = match category {
            Category::Pokemon => CardDetails::Pokemon(PokemonDetails {
                dex_ids: row.dex_ids.clone().unwrap_or_default(),
                hp: row.hp.and_then(|n| u32::try_from(n).ok()),
                types: row.types.clone().unwrap_or_default(),
                evolves_from: row.evolves_from.clone(),
                flavor_text: row.flavor_text.clone(),
                stage: row.stage.clone(),
                attacks: json_list(row.attacks.as_deref())?,
                abilities: json_list(row.abilities.as_deref())?,
                weaknesses: json_list(row.weaknesses.as_deref())?,
                resistances: json_list(row.resistances.as_deref())?,
                retreat_cost: row.retreat_cost.and_then(|n| u32::try_from(n).ok()),
                legal_standard: row.legal_standard.unwrap_or(false),
                legal_expanded: row.legal_expanded.unwrap_or(false),
            }),
            Category::Trainer => CardDetails::Trainer(TrainerDetails {
                effect: row.effect.clone(),
                trainer_type: row.trainer_type.as_deref().and_then(TrainerKind::parse),
            }),
            Category::Energy => CardDetails::Energy(EnergyDetails {
                effect: row.effect.clone().unwrap_or_default(),
                energy_type: row
                    .energy_type
                    .as_deref()
                    .map(EnergyKind::parse)
                    .unwrap_or_default(),
            }),
        };

        let condition = match row.card_condition.as_deref() {
            Some(label) => Some(label.parse::<CardCondition>()?),
            None => None,
        };
        let acquired_at =
            DateTime::<Utc>::from_timestamp_millis(row.acquired_at_ms).ok_or_else(|| corrupt("acquired_at"))?;
        let last_synced_at = DateTime::<Utc>::from_timestamp_millis(row.last_synced_at_ms)
            .ok_or_else(|| corrupt("last_synced_at"))?;

        Ok(Card {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            set_id: row.set_id,
            set_name: row.set_name,
            local_number: row.local_number,
            rarity: row.rarity,
            illustrator: row.illustrator,
            image: row.image,
            variants: PrintVariants {
                normal: row.variant_normal,
                reverse: row.variant_reverse,
                holo: row.variant_holo,
                first_edition: row.variant_first_edition,
            },
            prices: CardPrices {
                cardmarket_avg_eur: row.cardmarket_avg_eur,
                tcgplayer_market_usd: row.tcgplayer_market_usd,
            },
            estimated_value: row.estimated_value,
            acquired_at,
            last_synced_at,
            notes: row.notes,
            condition,
            details,
        })
    }
}

type Column = (&'static str, Value);

/// Every column written on insert.
fn insert_columns(card: &Card) -> Result<Vec<Column>> {
    let mut columns = vec![
        ("external_id", Value::Text(card.external_id.trim().to_string())),
        ("category", Value::Text(card.category().as_str().to_string())),
        ("name", Value::Text(card.name.clone())),
        ("set_id", Value::Text(card.set_id.clone())),
        ("set_name", Value::Text(card.set_name.clone())),
        ("local_number", text(card.local_number.as_deref())),
        ("acquired_at_ms", Value::BigInt(card.acquired_at.timestamp_millis())),
    ];
    columns.extend(mutable_columns(card)?);
    Ok(columns)
}

/// Columns that may change after import. None of them is indexed.
fn mutable_columns(card: &Card) -> Result<Vec<Column>> {
    let mut columns = vec![
        ("rarity", text(card.rarity.as_deref())),
        ("illustrator", text(card.illustrator.as_deref())),
        ("image", text(card.image.as_deref())),
        ("variant_normal", Value::Boolean(card.variants.normal)),
        ("variant_reverse", Value::Boolean(card.variants.reverse)),
        ("variant_holo", Value::Boolean(card.variants.holo)),
        ("variant_first_edition", Value::Boolean(card.variants.first_edition)),
        ("cardmarket_avg_eur", double(card.prices.cardmarket_avg_eur)),
        ("tcgplayer_market_usd", double(card.prices.tcgplayer_market_usd)),
        ("estimated_value", double(card.estimated_value)),
        ("last_synced_at_ms", Value::BigInt(card.last_synced_at.timestamp_millis())),
        ("notes", text(card.notes.as_deref())),
        ("card_condition", text(card.condition.map(|c| c.as_str()))),
    ];

    match &card.details {
        CardDetails::Pokemon(p) => columns.extend([
            ("dex_ids", Value::Text(p.dex_ids.clone())),
            ("hp", int(p.hp)),
            ("types", Value::Text(p.types.clone())),
            ("evolves_from", text(p.evolves_from.as_deref())),
            ("flavor_text", text(p.flavor_text.as_deref())),
            ("stage", text(p.stage.as_deref())),
            ("attacks", Value::Text(serde_json::to_string(&p.attacks)?)),
            ("abilities", Value::Text(serde_json::to_string(&p.abilities)?)),
            ("weaknesses", Value::Text(serde_json::to_string(&p.weaknesses)?)),
            ("resistances", Value::Text(serde_json::to_string(&p.resistances)?)),
            ("retreat_cost", int(p.retreat_cost)),
            ("legal_standard", Value::Boolean(p.legal_standard)),
            ("legal_expanded", Value::Boolean(p.legal_expanded)),
        ]),
        CardDetails::Trainer(t) => columns.extend([
            ("effect", text(t.effect.as_deref())),
            ("trainer_type", text(t.trainer_type.map(|k| k.as_str()))),
        ]),
        CardDetails::Energy(e) => columns.extend([
            ("effect", Value::Text(e.effect.clone())),
            ("energy_type", Value::Text(e.energy_type.as_str().to_string())),
        ]),
    }
    Ok(columns)
}

fn update_columns(conn: &Connection, id: i64, columns: Vec<Column>) -> Result<Card> {
    let assignments: Vec<String> = columns
        .iter()
        .map(|(name, _)| format!("{} = ?", name))
        .collect();
    let sql = format!("UPDATE cards SET {} WHERE id = ?", assignments.join(", "));
    let mut params: Vec<Value> = columns.into_iter().map(|(_, v)| v).collect();
    params.push(Value::BigInt(id));

    conn.execute_statement(&sql, &params)?;
    require_card(conn, id)
}

fn fetch_by_id(conn: &Connection, id: i64) -> Result<Option<Card>> {
    let (sql, params) = SqlBuilder::new(TABLE)
        .where_eq("id", Value::BigInt(id))
        .limit(1)
        .build();
    Ok(rows_to_cards(conn, &sql, &params)?.into_iter().next())
}

fn require_card(conn: &Connection, id: i64) -> Result<Card> {
    fetch_by_id(conn, id)?
        .ok_or_else(|| CollectionError::NotFound(format!("no card with id {} in the collection", id)))
}

fn rows_to_cards(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Card>> {
    let rows: Vec<CardRow> = conn.execute_into(sql, params)?;
    rows.into_iter().map(Card::try_from).collect()
}

fn json_list<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Result<Vec<T>> {
    match raw {
        Some(s) if !s.is_empty() => Ok(serde_json::from_str(s)?),
        _ => Ok(Vec::new()),
    }
}

fn text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

fn double(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Double)
}

/// Values that do not fit an INTEGER column are stored as NULL.
fn int(value: Option<u32>) -> Value {
    value
        .and_then(|n| i32::try_from(n).ok())
        .map_or(Value::Null, Value::Int)
}
