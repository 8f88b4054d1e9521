use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LIST_DELIMITER;
use crate::error::CollectionError;

// ---------------------------------------------------------------------------
// Card: A card held in the local collection
// ---------------------------------------------------------------------------

/// A card in the local collection.
///
/// Shared collector fields live directly on the struct; everything that
/// depends on the card's category lives in [`CardDetails`], so a card is
/// always exactly one of Pokémon, Trainer or Energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Local identifier, assigned by the store. `0` until persisted.
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub set_id: String,
    pub set_name: String,
    pub local_number: Option<String>,
    pub rarity: Option<String>,
    pub illustrator: Option<String>,
    /// Asset base URL; see [`Card::image_url`].
    pub image: Option<String>,
    pub variants: PrintVariants,
    pub prices: CardPrices,
    pub estimated_value: Option<f64>,
    pub acquired_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub notes: Option<String>,
    /// `None` means the collector has not graded the card.
    pub condition: Option<CardCondition>,
    pub details: CardDetails,
}

impl Card {
    pub fn category(&self) -> Category {
        self.details.category()
    }

    /// Full asset URL, e.g. `https://assets.tcgdex.net/en/swsh/swsh3/136/high.webp`.
    pub fn image_url(&self, quality: ImageQuality, extension: ImageExtension) -> Option<String> {
        self.image
            .as_deref()
            .map(|base| image_url(base, quality, extension))
    }
}

/// Build an asset URL from the catalog's image base.
pub fn image_url(base: &str, quality: ImageQuality, extension: ImageExtension) -> String {
    format!(
        "{}/{}.{}",
        base.trim_end_matches('/'),
        quality.as_str(),
        extension.as_str()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageQuality {
    High,
    Low,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::High => "high",
            ImageQuality::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageExtension {
    Png,
    Jpg,
    Webp,
}

impl ImageExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageExtension::Png => "png",
            ImageExtension::Jpg => "jpg",
            ImageExtension::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintVariants {
    pub normal: bool,
    pub reverse: bool,
    pub holo: bool,
    pub first_edition: bool,
}

/// Market prices from the two sources the catalog aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPrices {
    pub cardmarket_avg_eur: Option<f64>,
    pub tcgplayer_market_usd: Option<f64>,
}

impl CardPrices {
    pub fn is_empty(&self) -> bool {
        self.cardmarket_avg_eur.is_none() && self.tcgplayer_market_usd.is_none()
    }
}

// ---------------------------------------------------------------------------
// CardDetails: Category-specific payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CardDetails {
    Pokemon(PokemonDetails),
    Trainer(TrainerDetails),
    Energy(EnergyDetails),
}

impl CardDetails {
    pub fn category(&self) -> Category {
        match self {
            CardDetails::Pokemon(_) => Category::Pokemon,
            CardDetails::Trainer(_) => Category::Trainer,
            CardDetails::Energy(_) => Category::Energy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PokemonDetails {
    /// National dex numbers, comma-encoded.
    pub dex_ids: String,
    pub hp: Option<u32>,
    /// Elemental types, comma-encoded.
    pub types: String,
    pub evolves_from: Option<String>,
    pub flavor_text: Option<String>,
    pub stage: Option<String>,
    pub attacks: Vec<Attack>,
    pub abilities: Vec<Ability>,
    pub weaknesses: Vec<TypeModifier>,
    pub resistances: Vec<TypeModifier>,
    pub retreat_cost: Option<u32>,
    pub legal_standard: bool,
    pub legal_expanded: bool,
}

impl PokemonDetails {
    pub fn type_list(&self) -> Vec<String> {
        split_list(&self.types)
    }

    pub fn dex_id_list(&self) -> Vec<u32> {
        split_list(&self.dex_ids)
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub cost: Vec<String>,
    pub effect: Option<String>,
    pub damage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub kind: Option<String>,
    pub name: String,
    pub effect: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeModifier {
    pub energy_type: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerDetails {
    pub effect: Option<String>,
    pub trainer_type: Option<TrainerKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyDetails {
    pub effect: String,
    pub energy_type: EnergyKind,
}

// ---------------------------------------------------------------------------
// List codec
// ---------------------------------------------------------------------------

/// Join tokens with the list delimiter. Tokens containing the delimiter do
/// not survive a round trip.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    let delimiter = LIST_DELIMITER.to_string();
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(&delimiter)
}

/// Inverse of [`join_list`]. An empty string decodes to an empty list.
pub fn split_list(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.split(LIST_DELIMITER).map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Discriminator stored alongside every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pokemon,
    Trainer,
    Energy,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pokemon => "pokemon",
            Category::Trainer => "trainer",
            Category::Energy => "energy",
        }
    }

    /// Case-insensitive match against the catalog's category labels.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "pokemon" | "pokémon" => Some(Category::Pokemon),
            "trainer" => Some(Category::Trainer),
            "energy" => Some(Category::Energy),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCondition {
    Mint,
    NearMint,
    LightlyPlayed,
    Played,
    Poor,
}

impl CardCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardCondition::Mint => "mint",
            CardCondition::NearMint => "near_mint",
            CardCondition::LightlyPlayed => "lightly_played",
            CardCondition::Played => "played",
            CardCondition::Poor => "poor",
        }
    }
}

impl FromStr for CardCondition {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "mint" => Ok(CardCondition::Mint),
            "near_mint" | "nearmint" => Ok(CardCondition::NearMint),
            "lightly_played" | "lightlyplayed" => Ok(CardCondition::LightlyPlayed),
            "played" => Ok(CardCondition::Played),
            "poor" => Ok(CardCondition::Poor),
            _ => Err(CollectionError::BadInput(format!(
                "Unknown card condition: {}",
                s
            ))),
        }
    }
}

/// Trainer subtypes: one-shot items, persistent stadiums, attached tools,
/// and once-per-turn supporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerKind {
    Item,
    Stadium,
    Tool,
    Supporter,
}

impl TrainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainerKind::Item => "item",
            TrainerKind::Stadium => "stadium",
            TrainerKind::Tool => "tool",
            TrainerKind::Supporter => "supporter",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "item" => Some(TrainerKind::Item),
            "stadium" => Some(TrainerKind::Stadium),
            "tool" | "pokémon tool" | "pokemon tool" => Some(TrainerKind::Tool),
            "supporter" => Some(TrainerKind::Supporter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyKind {
    #[default]
    Normal,
    Special,
}

impl EnergyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyKind::Normal => "normal",
            EnergyKind::Special => "special",
        }
    }

    /// Anything other than `special` is ordinary energy.
    pub fn parse(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("special") {
            EnergyKind::Special
        } else {
            EnergyKind::Normal
        }
    }
}
