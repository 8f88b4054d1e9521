use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CollectionStats: Aggregate view of the whole collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_cards: i64,
    pub pokemon_count: i64,
    pub trainer_count: i64,
    pub energy_count: i64,
    pub distinct_sets: i64,
    pub graded_count: i64,
    /// Sum of Cardmarket averages over cards that have one.
    pub total_cardmarket_eur: f64,
    /// Sum of TCGplayer market prices over cards that have one.
    pub total_tcgplayer_usd: f64,
    pub total_estimated_value: f64,
    pub rarities: Vec<RarityCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityCount {
    pub rarity: String,
    pub count: i64,
}
