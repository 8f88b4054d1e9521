//! Wire shapes returned by the TCGdex catalog.
//!
//! Nothing here is trusted: every field is optional and the mapper decides
//! what is usable. `id` and `name` default to empty strings so a missing
//! value surfaces as a blank one and is rejected during mapping.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// RemoteCard: Full card object from `GET /cards/{id}`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCard {
    #[serde(default)]
    pub id: String,
    pub local_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub illustrator: Option<String>,
    pub rarity: Option<String>,
    pub set: Option<RemoteSet>,
    pub variants: Option<RemoteVariants>,
    pub pricing: Option<RemotePricing>,
    pub updated: Option<String>,

    // -- Pokemon fields --
    #[serde(default)]
    pub dex_id: Vec<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub hp: Option<u32>,
    #[serde(default)]
    pub types: Vec<String>,
    pub evolve_from: Option<String>,
    pub description: Option<String>,
    pub stage: Option<String>,
    #[serde(default)]
    pub attacks: Vec<RemoteAttack>,
    #[serde(default)]
    pub abilities: Vec<RemoteAbility>,
    #[serde(default)]
    pub weaknesses: Vec<RemoteTypeModifier>,
    #[serde(default)]
    pub resistances: Vec<RemoteTypeModifier>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub retreat: Option<u32>,
    pub legal: Option<RemoteLegality>,

    // -- Trainer / Energy fields --
    pub effect: Option<String>,
    pub trainer_type: Option<String>,
    pub energy_type: Option<String>,
}

// ---------------------------------------------------------------------------
// RemoteCardBrief: Summary row returned by the search endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCardBrief {
    #[serde(default)]
    pub id: String,
    pub local_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Nested shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSet {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVariants {
    #[serde(default)]
    pub normal: bool,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub holo: bool,
    #[serde(default)]
    pub first_edition: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteAttack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cost: Vec<String>,
    pub effect: Option<String>,
    #[serde(default, deserialize_with = "number_or_text")]
    pub damage: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteAbility {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: String,
    pub effect: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteTypeModifier {
    #[serde(rename = "type", default)]
    pub energy_type: String,
    #[serde(default, deserialize_with = "number_or_text")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLegality {
    #[serde(default)]
    pub standard: bool,
    #[serde(default)]
    pub expanded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemotePricing {
    pub cardmarket: Option<CardmarketPricing>,
    pub tcgplayer: Option<TcgplayerPricing>,
}

/// Cardmarket block; prices are in `unit` (EUR in practice).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardmarketPricing {
    pub unit: Option<String>,
    pub avg: Option<f64>,
    pub trend: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TcgplayerPricing {
    pub unit: Option<String>,
    pub normal: Option<TcgplayerPrice>,
    pub holofoil: Option<TcgplayerPrice>,
    #[serde(rename = "reverse-holofoil")]
    pub reverse_holofoil: Option<TcgplayerPrice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcgplayerPrice {
    pub market_price: Option<f64>,
}

// ---------------------------------------------------------------------------
// Number-or-string fields
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    fn into_text(self) -> Option<String> {
        match self {
            NumberOrText::Integer(n) => Some(n.to_string()),
            NumberOrText::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                Some(format!("{}", f as i64))
            }
            NumberOrText::Float(f) => Some(f.to_string()),
            NumberOrText::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

/// Decode a field the catalog sends either as a JSON number or a JSON string
/// (`50` and `"50+"`) into its string form. `null` and `""` become `None`.
pub fn number_or_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(raw.and_then(NumberOrText::into_text))
}

/// Like [`number_or_text`] but keeps only values that parse as a
/// non-negative integer no larger than `i32::MAX`; anything else is treated
/// as absent.
pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = number_or_text(deserializer)?;
    Ok(text
        .and_then(|t| t.parse::<i32>().ok())
        .and_then(|n| u32::try_from(n).ok()))
}
