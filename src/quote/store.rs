//! The authoritative quote collection and its persistence rules.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::random::{pick_index, RandomSource};
use super::types::{default_quotes, ImportError, Quote, ValidationError};
use crate::storage::{KeyValueStore, StorageError, QUOTES_KEY};

/// A [`QuoteStore`] shared between the app handlers and the sync poller.
///
/// Each holder takes the lock for a whole operation, so operations never
/// interleave.
pub type SharedStore<S> = Arc<Mutex<QuoteStore<S>>>;

/// Owns the in-memory quote collection and the durable store behind it.
pub struct QuoteStore<S: KeyValueStore> {
    quotes: Vec<Quote>,
    storage: S,
    rng: Box<dyn RandomSource>,
}

impl<S: KeyValueStore> QuoteStore<S> {
    /// Restore the collection from `storage`.
    ///
    /// Falls back to [`default_quotes`] when nothing is stored, the stored
    /// value cannot be read or parsed, or it holds an empty array. Never
    /// fails and never leaves the collection empty.
    pub async fn load(storage: S, rng: Box<dyn RandomSource>) -> Self {
        let quotes = match storage.get(QUOTES_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<Quote>>(&bytes) {
                Ok(quotes) if !quotes.is_empty() => {
                    tracing::debug!(count = quotes.len(), "Restored saved quotes");
                    quotes
                }
                Ok(_) => {
                    tracing::debug!("Saved quote list is empty, using defaults");
                    default_quotes()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Saved quotes are malformed, using defaults");
                    default_quotes()
                }
            },
            Ok(None) => {
                tracing::debug!("No saved quotes, using defaults");
                default_quotes()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read saved quotes, using defaults");
                default_quotes()
            }
        };

        Self {
            quotes,
            storage,
            rng,
        }
    }

    /// Wrap the store for sharing with the poller.
    pub fn into_shared(self) -> SharedStore<S> {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the full collection to durable storage.
    ///
    /// A full or unavailable backend is logged and otherwise ignored: the
    /// in-memory collection stays authoritative for the session.
    pub async fn persist(&self) {
        if let Err(e) = self.try_persist().await {
            tracing::warn!(
                error = %e,
                count = self.quotes.len(),
                "Failed to save quotes, keeping in-memory copy"
            );
        }
    }

    /// Like [`persist`](Self::persist) but hands the error back.
    pub async fn try_persist(&self) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&self.quotes)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.storage.set(QUOTES_KEY, &bytes).await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Validate, append, and persist a user-entered quote.
    ///
    /// No de-duplication happens here; the same text may be added twice.
    pub async fn add(&mut self, text: &str, category: &str) -> Result<Quote, ValidationError> {
        let quote = Quote::new(text, category)?;
        self.quotes.push(quote.clone());
        tracing::debug!(category = %quote.category, total = self.quotes.len(), "Added quote");
        self.persist().await;
        Ok(quote)
    }

    /// Append every incoming quote whose text is not already present.
    ///
    /// Matching is on `text` alone, so an incoming quote with known text and
    /// a different category is dropped. Existing quotes are never edited or
    /// removed. Does not persist; see [`merge_remote`](Self::merge_remote).
    pub fn reconcile(&mut self, incoming: impl IntoIterator<Item = Quote>) -> usize {
        let mut added = 0;
        for quote in incoming {
            if self.quotes.iter().any(|q| q.text == quote.text) {
                continue;
            }
            self.quotes.push(quote);
            added += 1;
        }
        added
    }

    /// [`reconcile`](Self::reconcile), persisting only when something was
    /// appended.
    pub async fn merge_remote(&mut self, incoming: impl IntoIterator<Item = Quote>) -> usize {
        let added = self.reconcile(incoming);
        if added > 0 {
            self.persist().await;
        }
        added
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Choose one quote uniformly from the candidate set for `category`.
    ///
    /// `None` or `"all"` considers the whole collection. Returns `None` when
    /// no quote matches.
    pub fn pick_random(&mut self, category: Option<&str>) -> Option<Quote> {
        let candidates: Vec<&Quote> = self
            .quotes
            .iter()
            .filter(|q| q.matches_filter(category))
            .collect();
        let index = pick_index(self.rng.as_mut(), candidates.len())?;
        Some(candidates[index].clone())
    }

    /// Every quote in the candidate set for `category`, in insertion order.
    pub fn filter_by_category(&self, category: Option<&str>) -> Vec<&Quote> {
        self.quotes
            .iter()
            .filter(|q| q.matches_filter(category))
            .collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for quote in &self.quotes {
            if !seen.contains(&quote.category.as_str()) {
                seen.push(&quote.category);
            }
        }
        seen
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Pretty-printed JSON array of the whole collection.
    pub fn export_snapshot(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.quotes)
    }

    /// Append every quote in a JSON array snapshot and persist.
    ///
    /// Entries are taken verbatim: duplicates are kept and empty fields are
    /// not rejected. Nothing is appended on error.
    pub async fn import_snapshot(&mut self, bytes: &[u8]) -> Result<usize, ImportError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ImportError::ParseFailure(e.to_string()))?;
        if !value.is_array() {
            return Err(ImportError::NotAnArray);
        }
        let imported: Vec<Quote> =
            serde_json::from_value(value).map_err(|e| ImportError::ParseFailure(e.to_string()))?;

        let count = imported.len();
        self.quotes.extend(imported);
        tracing::info!(imported = count, total = self.quotes.len(), "Imported quotes");
        self.persist().await;
        Ok(count)
    }
}
