//! Conversion of catalog transfer objects into collection cards.
//!
//! Mapping is pure: it reads a [`RemoteCard`], logs why a record was
//! unusable, and returns either a [`Card`] ready to persist or a
//! [`Rejected`] reason. Only a blank id or name rejects a record (plus an
//! unknown category in strict mode); every other missing field is defaulted.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::{UNKNOWN_SET_ID, UNKNOWN_SET_NAME};
use crate::models::{
    Ability, Attack, Card, CardDetails, CardPrices, Category, EnergyDetails, EnergyKind,
    PokemonDetails, PrintVariants, RemoteCard, RemoteTypeModifier, TrainerDetails, TrainerKind,
    TypeModifier,
};

pub use crate::models::card::{join_list, split_list};

/// Why a transfer object could not become a card.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("card has no identifier")]
    MissingId,
    #[error("card {0} has no name")]
    MissingName(String),
    #[error("card {id} has unrecognized category {category:?}")]
    UnknownCategory { id: String, category: Option<String> },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MapperOptions {
    /// Reject unknown or missing categories instead of treating them as
    /// Pokémon.
    pub strict_category: bool,
}

/// Map with the default (lenient category) options.
pub fn map(remote: &RemoteCard) -> Result<Card, Rejected> {
    map_with(remote, &MapperOptions::default())
}

pub fn map_with(remote: &RemoteCard, options: &MapperOptions) -> Result<Card, Rejected> {
    map_at(remote, options, Utc::now())
}

/// Map using `now` as the acquisition time and the fallback sync time.
pub fn map_at(
    remote: &RemoteCard,
    options: &MapperOptions,
    now: DateTime<Utc>,
) -> Result<Card, Rejected> {
    let external_id = remote.id.trim();
    if external_id.is_empty() {
        warn!(name = %remote.name, "Rejecting catalog card without identifier");
        return Err(Rejected::MissingId);
    }
    let name = remote.name.trim();
    if name.is_empty() {
        warn!(external_id, "Rejecting catalog card without name");
        return Err(Rejected::MissingName(external_id.to_string()));
    }

    let category = match remote.category.as_deref().and_then(Category::parse) {
        Some(c) => c,
        None if options.strict_category => {
            warn!(external_id, category = ?remote.category, "Rejecting card with unknown category");
            return Err(Rejected::UnknownCategory {
                id: external_id.to_string(),
                category: remote.category.clone(),
            });
        }
        None => {
            warn!(
                external_id,
                category = ?remote.category,
                "Unknown card category; treating as Pokemon"
            );
            Category::Pokemon
        }
    };

    let details = match category {
        Category::Pokemon => CardDetails::Pokemon(pokemon_details(remote)),
        Category::Trainer => CardDetails::Trainer(TrainerDetails {
            effect: non_blank(remote.effect.as_deref()),
            trainer_type: remote.trainer_type.as_deref().and_then(TrainerKind::parse),
        }),
        Category::Energy => CardDetails::Energy(EnergyDetails {
            effect: remote.effect.clone().unwrap_or_default(),
            energy_type: remote
                .energy_type
                .as_deref()
                .map(EnergyKind::parse)
                .unwrap_or_default(),
        }),
    };

    let (set_id, set_name) = match &remote.set {
        Some(set) => (
            non_blank(set.id.as_deref()).unwrap_or_else(|| UNKNOWN_SET_ID.to_string()),
            non_blank(set.name.as_deref()).unwrap_or_else(|| UNKNOWN_SET_NAME.to_string()),
        ),
        None => (UNKNOWN_SET_ID.to_string(), UNKNOWN_SET_NAME.to_string()),
    };

    let variants = remote
        .variants
        .as_ref()
        .map(|v| PrintVariants {
            normal: v.normal,
            reverse: v.reverse,
            holo: v.holo,
            first_edition: v.first_edition,
        })
        .unwrap_or_default();

    Ok(Card {
        id: 0,
        external_id: external_id.to_string(),
        name: name.to_string(),
        set_id,
        set_name,
        local_number: non_blank(remote.local_id.as_deref()),
        rarity: non_blank(remote.rarity.as_deref()),
        illustrator: non_blank(remote.illustrator.as_deref()),
        image: non_blank(remote.image.as_deref()),
        variants,
        prices: prices_from(remote),
        estimated_value: None,
        acquired_at: now,
        last_synced_at: synced_at(remote, now),
        notes: None,
        condition: None,
        details,
    })
}

/// Extract the two tracked market prices.
///
/// Cardmarket uses the average, then the trend. TCGplayer uses the market
/// price of the normal printing, then holofoil, then reverse holofoil.
pub fn prices_from(remote: &RemoteCard) -> CardPrices {
    let Some(pricing) = &remote.pricing else {
        return CardPrices::default();
    };

    let cardmarket_avg_eur = pricing
        .cardmarket
        .as_ref()
        .and_then(|cm| cm.avg.or(cm.trend));

    let tcgplayer_market_usd = pricing.tcgplayer.as_ref().and_then(|tp| {
        [&tp.normal, &tp.holofoil, &tp.reverse_holofoil]
            .into_iter()
            .flatten()
            .find_map(|p| p.market_price)
    });

    CardPrices {
        cardmarket_avg_eur,
        tcgplayer_market_usd,
    }
}

/// The catalog's `updated` timestamp, or `now` if absent or unparsable.
pub fn synced_at(remote: &RemoteCard, now: DateTime<Utc>) -> DateTime<Utc> {
    remote
        .updated
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

fn pokemon_details(remote: &RemoteCard) -> PokemonDetails {
    let dex_ids: Vec<String> = remote.dex_id.iter().map(|n| n.to_string()).collect();
    let legal = remote.legal.clone().unwrap_or_default();

    PokemonDetails {
        dex_ids: join_list(&dex_ids),
        hp: remote.hp,
        types: join_list(&remote.types),
        evolves_from: non_blank(remote.evolve_from.as_deref()),
        flavor_text: non_blank(remote.description.as_deref()),
        stage: non_blank(remote.stage.as_deref()),
        attacks: remote
            .attacks
            .iter()
            .map(|a| Attack {
                name: a.name.clone(),
                cost: a.cost.clone(),
                effect: non_blank(a.effect.as_deref()),
                damage: a.damage.clone(),
            })
            .collect(),
        abilities: remote
            .abilities
            .iter()
            .map(|a| Ability {
                kind: non_blank(a.kind.as_deref()),
                name: a.name.clone(),
                effect: non_blank(a.effect.as_deref()),
            })
            .collect(),
        weaknesses: type_modifiers(&remote.weaknesses),
        resistances: type_modifiers(&remote.resistances),
        retreat_cost: remote.retreat,
        legal_standard: legal.standard,
        legal_expanded: legal.expanded,
    }
}

fn type_modifiers(raw: &[RemoteTypeModifier]) -> Vec<TypeModifier> {
    raw.iter()
        .map(|m| TypeModifier {
            energy_type: m.energy_type.clone(),
            value: m.value.clone(),
        })
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
