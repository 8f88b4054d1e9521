//! Shared fixtures for the collection integration tests.
//!
//! Provides an in-memory store, catalog JSON for one card of each category,
//! and [`FakeSource`], a scripted [`CardSource`] that never touches the
//! network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pkmn_collection::models::{Card, RemoteCard, RemoteCardBrief};
use pkmn_collection::{
    mapper, CancellationToken, CardSource, CollectionError, CollectionStore, Importer, Result,
};
use serde_json::json;

pub fn store() -> CollectionStore {
    CollectionStore::open_in_memory().unwrap()
}

/// Map catalog JSON straight into an unsaved card.
pub fn card_from(value: serde_json::Value) -> Card {
    let remote: RemoteCard = serde_json::from_value(value).unwrap();
    mapper::map(&remote).unwrap()
}

// -- Catalog JSON -------------------------------------------------------------

pub fn furret_json() -> serde_json::Value {
    json!({
        "id": "swsh3-136",
        "localId": "136",
        "name": "Furret",
        "image": "https://assets.tcgdex.net/en/swsh/swsh3/136",
        "category": "Pokemon",
        "illustrator": "tetsuya koizumi",
        "rarity": "Uncommon",
        "set": { "id": "swsh3", "name": "Darkness Ablaze" },
        "variants": { "normal": true, "reverse": true, "holo": false, "firstEdition": false },
        "dexId": [162],
        "hp": 110,
        "types": ["Colorless"],
        "evolveFrom": "Sentret",
        "description": "It makes a nest to suit its long and skinny body.",
        "stage": "Stage1",
        "attacks": [
            { "cost": ["Colorless"], "name": "Feelin' Fine", "effect": "Draw 3 cards." },
            { "cost": ["Colorless", "Colorless", "Colorless"], "name": "Tail Smash", "damage": 90 }
        ],
        "weaknesses": [{ "type": "Fighting", "value": "×2" }],
        "retreat": 1,
        "legal": { "standard": false, "expanded": true },
        "pricing": {
            "cardmarket": { "unit": "EUR", "avg": 0.08, "trend": 0.1 },
            "tcgplayer": { "unit": "USD", "normal": { "marketPrice": 0.12 } }
        },
        "updated": "2024-06-01T10:00:00Z"
    })
}

pub fn trainer_json() -> serde_json::Value {
    json!({
        "id": "swsh1-178",
        "localId": "178",
        "name": "Marnie",
        "category": "Trainer",
        "rarity": "Uncommon",
        "set": { "id": "swsh1", "name": "Sword & Shield" },
        "effect": "Each player shuffles their hand and puts it on the bottom of their deck.",
        "trainerType": "Supporter"
    })
}

pub fn energy_json() -> serde_json::Value {
    json!({
        "id": "swsh3-174",
        "localId": "174",
        "name": "Capture Energy",
        "category": "Energy",
        "rarity": "Uncommon",
        "set": { "id": "swsh3", "name": "Darkness Ablaze" },
        "effect": "This card provides Colorless Energy.",
        "energyType": "Special"
    })
}

/// A minimal Pokémon card with the given identity.
pub fn pokemon_json(id: &str, set_id: &str, number: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "localId": number,
        "name": name,
        "category": "Pokemon",
        "set": { "id": set_id, "name": set_id.to_uppercase() },
        "hp": 60,
        "types": ["Grass"]
    })
}

pub fn furret() -> Card {
    card_from(furret_json())
}

pub fn marnie() -> Card {
    card_from(trainer_json())
}

pub fn capture_energy() -> Card {
    card_from(energy_json())
}

// -- FakeSource ---------------------------------------------------------------

enum Scripted {
    Card(RemoteCard),
    Transient,
    Malformed,
}

/// In-process catalog. Unknown ids are `Ok(None)`.
#[derive(Default)]
pub struct FakeSource {
    cards: Mutex<HashMap<String, Scripted>>,
    by_name: Mutex<HashMap<String, Vec<RemoteCardBrief>>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_card(&self, value: serde_json::Value) -> &Self {
        let remote: RemoteCard = serde_json::from_value(value).unwrap();
        self.cards
            .lock()
            .unwrap()
            .insert(remote.id.clone(), Scripted::Card(remote));
        self
    }

    /// Make `id` fail as if the catalog were down.
    pub fn failing(&self, id: &str) -> &Self {
        self.cards
            .lock()
            .unwrap()
            .insert(id.to_string(), Scripted::Transient);
        self
    }

    /// Make `id` come back as an unreadable body.
    pub fn malformed(&self, id: &str) -> &Self {
        self.cards
            .lock()
            .unwrap()
            .insert(id.to_string(), Scripted::Malformed);
        self
    }

    /// Register a name search result; ids without a scripted card are
    /// dangling hits.
    pub fn with_search(&self, name: &str, ids: &[&str]) -> &Self {
        let briefs = ids
            .iter()
            .map(|id| RemoteCardBrief {
                id: id.to_string(),
                name: name.to_string(),
                ..Default::default()
            })
            .collect();
        self.by_name
            .lock()
            .unwrap()
            .insert(name.to_lowercase(), briefs);
        self
    }

    /// Change the Cardmarket average the catalog reports for `id`.
    pub fn set_cardmarket_avg(&self, id: &str, avg: f64) {
        let mut cards = self.cards.lock().unwrap();
        if let Some(Scripted::Card(remote)) = cards.get_mut(id) {
            let pricing = remote.pricing.get_or_insert_with(Default::default);
            pricing
                .cardmarket
                .get_or_insert_with(Default::default)
                .avg = Some(avg);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardSource for FakeSource {
    async fn fetch_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<Option<RemoteCard>> {
        if cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.cards.lock().unwrap().get(id.trim()) {
            Some(Scripted::Card(remote)) => Ok(Some(remote.clone())),
            Some(Scripted::Transient) => Err(CollectionError::Transient("catalog returned 503".into())),
            Some(Scripted::Malformed) => Err(CollectionError::InvalidUpstreamData(
                "malformed response body".into(),
            )),
            None => Ok(None),
        }
    }

    async fn search_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCardBrief>> {
        if cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        let found = self.by_name.lock().unwrap().get(&name.trim().to_lowercase()).cloned();
        Ok(found.unwrap_or_default())
    }

    async fn search_by_number(
        &self,
        number: &str,
        set_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCardBrief>> {
        if cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        let cards = self.cards.lock().unwrap();
        let mut briefs: Vec<RemoteCardBrief> = cards
            .values()
            .filter_map(|s| match s {
                Scripted::Card(remote) => Some(remote),
                _ => None,
            })
            .filter(|r| r.local_id.as_deref() == Some(number))
            .filter(|r| match set_id {
                Some(set) => r.set.as_ref().and_then(|s| s.id.as_deref()) == Some(set),
                None => true,
            })
            .map(|r| RemoteCardBrief {
                id: r.id.clone(),
                local_id: r.local_id.clone(),
                name: r.name.clone(),
                image: r.image.clone(),
            })
            .collect();
        briefs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(briefs)
    }
}

/// An importer over a fresh in-memory store.
pub fn importer(source: Arc<FakeSource>) -> Importer {
    Importer::new(source, store())
}
