//! Import orchestration: catalog → mapper → collection.
//!
//! One import walks a fixed sequence of stages and stops at the first
//! failure; nothing is retried automatically. The only write is the final
//! insert, so a failed or cancelled import never leaves a partial card.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CollectionError, ErrorKind, Result};
use crate::mapper::{self, MapperOptions};
use crate::models::{Card, RemoteCard, RemoteCardBrief};
use crate::source::CardSource;
use crate::store::CollectionStore;

/// Stages of a single import, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Validating,
    CheckingDuplicate,
    Fetching,
    Mapping,
    Persisting,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportStage::Validating => "validating",
            ImportStage::CheckingDuplicate => "checking_duplicate",
            ImportStage::Fetching => "fetching",
            ImportStage::Mapping => "mapping",
            ImportStage::Persisting => "persisting",
        };
        f.write_str(label)
    }
}

/// Outcome of a bulk price refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Cards whose prices were written.
    pub updated: usize,
    /// Cards whose fetch or write failed.
    pub failed: usize,
    /// Cards the catalog no longer knows.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Composes a [`CardSource`] and a [`CollectionStore`].
#[derive(Clone)]
pub struct Importer {
    source: Arc<dyn CardSource>,
    store: CollectionStore,
    options: MapperOptions,
}

impl Importer {
    pub fn new(source: Arc<dyn CardSource>, store: CollectionStore) -> Self {
        Self::with_options(source, store, MapperOptions::default())
    }

    pub fn with_options(
        source: Arc<dyn CardSource>,
        store: CollectionStore,
        options: MapperOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    /// Import one card by its catalog id.
    ///
    /// Returns the stored card with its local id. Failures keep their
    /// classification (`BadInput`, `Conflict`, `NotFound`, `Transient`,
    /// `InvalidUpstreamData`, `Cancelled`); anything unexpected is logged and
    /// surfaces as `OperationFailed`.
    pub async fn import_card(&self, external_id: &str, cancel: &CancellationToken) -> Result<Card> {
        let external_id = external_id.trim();
        match self.run_import(external_id, cancel).await {
            Ok(card) => {
                info!(external_id, id = card.id, name = %card.name, "Card imported");
                Ok(card)
            }
            Err((stage, e)) => Err(report_failure("import", external_id, stage, e)),
        }
    }

    async fn run_import(
        &self,
        external_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Card, (ImportStage, CollectionError)> {
        let mut stage = ImportStage::Validating;
        debug!(external_id, %stage, "Import stage");
        if external_id.is_empty() {
            return Err((
                stage,
                CollectionError::BadInput("card id must not be empty".into()),
            ));
        }
        if cancel.is_cancelled() {
            return Err((stage, CollectionError::Cancelled));
        }

        stage = ImportStage::CheckingDuplicate;
        debug!(external_id, %stage, "Import stage");
        let exists = self
            .store
            .exists(external_id, cancel)
            .await
            .map_err(|e| (stage, e))?;
        if exists {
            return Err((
                stage,
                CollectionError::Conflict(format!("card {} is already in the collection", external_id)),
            ));
        }

        stage = ImportStage::Fetching;
        debug!(external_id, %stage, "Import stage");
        let remote = self
            .source
            .fetch_by_id(external_id, cancel)
            .await
            .map_err(|e| (stage, e))?
            .ok_or_else(|| {
                (
                    stage,
                    CollectionError::NotFound(format!("card {} not found in the catalog", external_id)),
                )
            })?;

        stage = ImportStage::Mapping;
        debug!(external_id, %stage, "Import stage");
        let card = mapper::map_with(&remote, &self.options).map_err(|rejected| {
            (
                stage,
                CollectionError::InvalidUpstreamData(rejected.to_string()),
            )
        })?;

        stage = ImportStage::Persisting;
        debug!(external_id, %stage, "Import stage");
        self.store.add(&card, cancel).await.map_err(|e| (stage, e))
    }

    /// Search the catalog by name and resolve every hit to a full card.
    ///
    /// One request for the summary list plus one per hit; hits the catalog
    /// can no longer resolve are dropped.
    pub async fn search_remote(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<RemoteCard>> {
        let result = async {
            let briefs = self.source.search_by_name(name, cancel).await?;
            self.resolve(briefs, cancel).await
        }
        .await;
        result.map_err(|e| report_failure("search_remote", name, ImportStage::Fetching, e))
    }

    /// Search the catalog by card number, optionally within one set.
    pub async fn search_remote_by_number(
        &self,
        number: &str,
        set_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCard>> {
        let result = async {
            let briefs = self.source.search_by_number(number, set_id, cancel).await?;
            self.resolve(briefs, cancel).await
        }
        .await;
        result.map_err(|e| report_failure("search_remote_by_number", number, ImportStage::Fetching, e))
    }

    async fn resolve(
        &self,
        briefs: Vec<RemoteCardBrief>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCard>> {
        let mut cards = Vec::with_capacity(briefs.len());
        for brief in briefs {
            if brief.id.trim().is_empty() {
                continue;
            }
            match self.source.fetch_by_id(&brief.id, cancel).await? {
                Some(card) => cards.push(card),
                None => debug!(external_id = %brief.id, "Search hit no longer resolves"),
            }
        }
        Ok(cards)
    }

    /// Re-fetch one stored card and write its current prices.
    pub async fn refresh_card(&self, id: i64, cancel: &CancellationToken) -> Result<Card> {
        let result = async {
            let card = self
                .store
                .get_by_id(id, cancel)
                .await?
                .ok_or_else(|| CollectionError::NotFound(format!("no card with id {}", id)))?;
            self.refresh_one(&card, cancel).await
        }
        .await;
        result.map_err(|e| report_failure("refresh_card", &id.to_string(), ImportStage::Fetching, e))
    }

    /// Refresh prices for the whole collection, one card at a time.
    ///
    /// A failing card is logged and counted but never stops the run.
    /// Cancellation stops it; cards already refreshed keep their new prices.
    pub async fn refresh_prices(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        let cards = self
            .store
            .all(cancel)
            .await
            .map_err(|e| report_failure("refresh_prices", "*", ImportStage::CheckingDuplicate, e))?;

        let mut report = RefreshReport::default();
        for card in &cards {
            if cancel.is_cancelled() {
                info!(?report, "Price refresh cancelled");
                return Err(CollectionError::Cancelled);
            }
            match self.refresh_one(card, cancel).await {
                Ok(_) => report.updated += 1,
                Err(CollectionError::Cancelled) => {
                    info!(?report, "Price refresh cancelled");
                    return Err(CollectionError::Cancelled);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!(external_id = %card.external_id, "Card no longer in catalog; skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(external_id = %card.external_id, error = %e, "Price refresh failed for card");
                    report.failed += 1;
                }
            }
        }

        info!(
            updated = report.updated,
            failed = report.failed,
            skipped = report.skipped,
            "Price refresh finished"
        );
        Ok(report)
    }

    async fn refresh_one(&self, card: &Card, cancel: &CancellationToken) -> Result<Card> {
        let remote = self
            .source
            .fetch_by_id(&card.external_id, cancel)
            .await?
            .ok_or_else(|| {
                CollectionError::NotFound(format!("card {} not found in the catalog", card.external_id))
            })?;
        let prices = mapper::prices_from(&remote);
        let synced_at = mapper::synced_at(&remote, Utc::now());
        self.store
            .update_prices(card.id, &prices, synced_at, cancel)
            .await
    }
}

/// Log a failure once, at a level that matches its kind, and make sure
/// infrastructure errors never reach the caller unclassified.
fn report_failure(
    operation: &str,
    subject: &str,
    stage: ImportStage,
    e: CollectionError,
) -> CollectionError {
    match e.kind() {
        ErrorKind::Cancelled => {
            info!(operation, subject, %stage, "Cancelled by caller");
            e
        }
        ErrorKind::NotFound | ErrorKind::Conflict | ErrorKind::BadInput => {
            info!(operation, subject, %stage, reason = %e, "Rejected");
            e
        }
        ErrorKind::Transient => {
            warn!(operation, subject, %stage, error = %e, "Catalog unavailable");
            e
        }
        ErrorKind::InvalidUpstreamData => {
            warn!(operation, subject, %stage, error = %e, "Catalog returned unusable data");
            e
        }
        ErrorKind::Internal => match e {
            CollectionError::OperationFailed(_) => {
                error!(operation, subject, %stage, error = %e, "Operation failed");
                e
            }
            other => {
                error!(operation, subject, %stage, error = %other, "Unexpected failure");
                CollectionError::OperationFailed(format!("{} failed", operation))
            }
        },
    }
}
