//! Personal Pokémon TCG collection manager.
//!
//! Cards are looked up in the public TCGdex catalog, mapped into a local
//! model and stored in an embedded DuckDB database. Every operation is
//! async and takes a [`CancellationToken`].
//!
//! # Quick start
//!
//! ```no_run
//! use pkmn_collection::{CancellationToken, CollectionSdk};
//!
//! # async fn run() -> pkmn_collection::Result<()> {
//! let sdk = CollectionSdk::builder().build().await?;
//! let cancel = CancellationToken::new();
//!
//! // Import a card by its catalog id
//! let furret = sdk.import_card("swsh3-136", &cancel).await?;
//!
//! // Browse the collection, newest first
//! let page = sdk.list_page(1, 20, &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod importer;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod source;
pub mod sql_builder;
pub mod store;

pub use connection::Connection;
pub use error::{CollectionError, ErrorKind, Result};
pub use importer::{ImportStage, Importer, RefreshReport};
pub use mapper::MapperOptions;
pub use source::{CardSource, TcgdexClient};
pub use sql_builder::SqlBuilder;
pub use store::CollectionStore;
pub use tokio_util::sync::CancellationToken;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use models::{Card, CardCondition, CollectionStats, RemoteCard};

// ---------------------------------------------------------------------------
// CollectionSdkBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`CollectionSdk`].
///
/// Use [`CollectionSdk::builder()`] for defaults or
/// [`CollectionSdkBuilder::from_env()`] to pick settings up from the
/// environment, chain overrides, then call
/// [`build()`](CollectionSdkBuilder::build).
pub struct CollectionSdkBuilder {
    db_path: Option<PathBuf>,
    in_memory: bool,
    base_url: String,
    language: String,
    timeout: Duration,
    strict_categories: bool,
    source: Option<Arc<dyn CardSource>>,
}

impl Default for CollectionSdkBuilder {
    fn default() -> Self {
        Self {
            db_path: None,
            in_memory: false,
            base_url: config::API_BASE.to_string(),
            language: config::DEFAULT_LANGUAGE.to_string(),
            timeout: config::REQUEST_TIMEOUT,
            strict_categories: false,
            source: None,
        }
    }
}

impl CollectionSdkBuilder {
    /// Start from defaults overridden by `PKMN_COLLECTION_*` variables.
    ///
    /// Blank variables are ignored, and so is a timeout that is not a positive
    /// whole number of seconds.
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Some(path) = env_var(config::ENV_DB_PATH) {
            builder.db_path = Some(PathBuf::from(path));
        }
        if let Some(base) = env_var(config::ENV_API_BASE) {
            builder.base_url = base;
        }
        if let Some(lang) = env_var(config::ENV_LANGUAGE) {
            builder.language = lang;
        }
        if let Some(raw) = env_var(config::ENV_TIMEOUT_SECS) {
            match config::parse_timeout_secs(&raw) {
                Some(timeout) => builder.timeout = timeout,
                None => warn!(value = %raw, "Ignoring invalid {}", config::ENV_TIMEOUT_SECS),
            }
        }
        builder
    }

    /// Set the database file.
    ///
    /// If not set, the platform data directory is used (e.g.
    /// `~/.local/share/pkmn-collection/collection.duckdb` on Linux).
    pub fn db_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.db_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep the collection in memory only. Takes precedence over `db_path`.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// Catalog root, without the language segment.
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Catalog language code. Defaults to `"en"`.
    pub fn language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Per-request timeout; never more than 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject catalog cards with a missing or unknown category instead of
    /// importing them as Pokémon.
    pub fn strict_categories(mut self, strict: bool) -> Self {
        self.strict_categories = strict;
        self
    }

    /// Use a custom catalog instead of the TCGdex client.
    pub fn source(mut self, source: Arc<dyn CardSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Open the database and wire up the catalog client.
    pub async fn build(self) -> Result<CollectionSdk> {
        let (store, location) = if self.in_memory {
            (CollectionStore::open_in_memory()?, ":memory:".to_string())
        } else {
            let path = self.db_path.unwrap_or_else(config::default_db_path);
            let location = path.display().to_string();
            (CollectionStore::open(path).await?, location)
        };

        let (source, catalog): (Arc<dyn CardSource>, String) = match self.source {
            Some(source) => (source, "custom".to_string()),
            None => {
                let client = TcgdexClient::new(&self.base_url, &self.language, self.timeout)?;
                let catalog = client.base_url().to_string();
                (Arc::new(client), catalog)
            }
        };

        let options = MapperOptions {
            strict_category: self.strict_categories,
        };
        info!(db = %location, %catalog, "Collection ready");
        Ok(CollectionSdk {
            importer: Importer::with_options(source, store.clone(), options),
            store,
            location,
            catalog,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// CollectionSdk
// ---------------------------------------------------------------------------

/// The main entry point: one collection database plus one catalog.
///
/// Created via [`CollectionSdk::builder()`]. Cheap to clone; clones share the
/// same database handle.
#[derive(Clone)]
pub struct CollectionSdk {
    store: CollectionStore,
    importer: Importer,
    location: String,
    catalog: String,
}

impl CollectionSdk {
    pub fn builder() -> CollectionSdkBuilder {
        CollectionSdkBuilder::default()
    }

    // -- Catalog -----------------------------------------------------------

    /// Fetch a card from the catalog and add it to the collection.
    pub async fn import_card(&self, external_id: &str, cancel: &CancellationToken) -> Result<Card> {
        self.importer.import_card(external_id, cancel).await
    }

    /// Search the catalog by name. Nothing is stored.
    pub async fn search_remote(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<RemoteCard>> {
        self.importer.search_remote(name, cancel).await
    }

    /// Update market prices for every card in the collection.
    pub async fn refresh_prices(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        self.importer.refresh_prices(cancel).await
    }

    // -- Collection --------------------------------------------------------

    /// Case-insensitive name search over the local collection.
    pub async fn search_local(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<Card>> {
        self.store.find_by_name(text, cancel).await
    }

    /// One page of the collection, newest first. Page numbers start at 1.
    pub async fn list_page(
        &self,
        page: i64,
        page_size: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Card>> {
        self.store.page(page, page_size, cancel).await
    }

    pub async fn update_condition_and_notes(
        &self,
        id: i64,
        condition: Option<CardCondition>,
        notes: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Card> {
        self.store
            .update_condition_and_notes(id, condition, notes, cancel)
            .await
    }

    pub async fn set_estimated_value(
        &self,
        id: i64,
        value: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<Card> {
        self.store.set_estimated_value(id, value, cancel).await
    }

    /// Remove a card; `false` if no card had that id.
    pub async fn remove(&self, id: i64, cancel: &CancellationToken) -> Result<bool> {
        let removed = self.store.remove(id, cancel).await?;
        if removed {
            info!(id, "Card removed");
        }
        Ok(removed)
    }

    pub async fn statistics(&self, cancel: &CancellationToken) -> Result<CollectionStats> {
        self.store.stats(cancel).await
    }

    // -- Accessors ---------------------------------------------------------

    /// The underlying store, for lookups the facade does not expose.
    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for CollectionSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionSdk(db={}, catalog={})", self.location, self.catalog)
    }
}
