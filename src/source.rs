//! Remote card catalog access.
//!
//! [`CardSource`] is the contract the importer depends on; [`TcgdexClient`]
//! implements it against the public TCGdex REST API. The client keeps no
//! state beyond its HTTP connection pool and never caches responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config;
use crate::error::{CollectionError, Result};
use crate::models::{RemoteCard, RemoteCardBrief};

/// A catalog that can look cards up by id, name or number.
///
/// A missing card is `Ok(None)` (or an empty list), never an error.
#[async_trait]
pub trait CardSource: Send + Sync {
    async fn fetch_by_id(&self, id: &str, cancel: &CancellationToken)
        -> Result<Option<RemoteCard>>;

    async fn search_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCardBrief>>;

    async fn search_by_number(
        &self,
        number: &str,
        set_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCardBrief>>;
}

// ---------------------------------------------------------------------------
// TcgdexClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TcgdexClient {
    client: Client,
    base_url: String,
}

impl TcgdexClient {
    /// Create a client for `{base_url}/{language}`.
    ///
    /// `timeout` is capped at [`config::REQUEST_TIMEOUT`].
    pub fn new(base_url: &str, language: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout.min(config::REQUEST_TIMEOUT))
            .user_agent(config::USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CollectionError::OperationFailed(format!("HTTP client setup: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), language),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET and decode the body. A 404 is `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, ?query, "Catalog request");

        let request = async {
            let response = self
                .client
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            classify_status(status)?;

            let body = response.text().await.map_err(transport_error)?;
            decode_body(&body).map(Some)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CollectionError::Cancelled),
            result = request => result,
        }
    }
}

#[async_trait]
impl CardSource for TcgdexClient {
    async fn fetch_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteCard>> {
        let id = require("card id", id)?;
        self.get_json(&format!("cards/{}", id), &[], cancel).await
    }

    async fn search_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCardBrief>> {
        let name = require("card name", name)?;
        let found: Option<Vec<RemoteCardBrief>> =
            self.get_json("cards", &[("name", name)], cancel).await?;
        Ok(found.unwrap_or_default())
    }

    async fn search_by_number(
        &self,
        number: &str,
        set_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCardBrief>> {
        let number = require("card number", number)?;
        let mut query = vec![("localId", number)];
        if let Some(set) = set_id.map(str::trim).filter(|s| !s.is_empty()) {
            query.push(("set.id", set));
        }
        let found: Option<Vec<RemoteCardBrief>> = self.get_json("cards", &query, cancel).await?;
        Ok(found.unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CollectionError::BadInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}

/// Map a non-404 status to the error taxonomy.
///
/// Rate limiting and server errors may clear up on retry; any other
/// unexpected status means the catalog is not behaving as documented.
pub fn classify_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(CollectionError::Transient(format!("catalog returned {}", status)))
    } else {
        Err(CollectionError::InvalidUpstreamData(format!(
            "catalog returned unexpected status {}",
            status
        )))
    }
}

/// Decode a response body; malformed JSON is upstream data, not transport.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "Catalog returned an undecodable body");
        CollectionError::InvalidUpstreamData(format!("malformed response body: {}", e))
    })
}

fn transport_error(e: reqwest::Error) -> CollectionError {
    if e.is_decode() {
        CollectionError::InvalidUpstreamData(e.to_string())
    } else {
        CollectionError::Transient(e.to_string())
    }
}
