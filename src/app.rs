//! Event handlers between the user-facing surface and the quote store.
//!
//! Each handler does one store call and hands the outcome to the
//! [`Renderer`]. Rules about quotes live in [`crate::quote`], not here.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::quote::{read_snapshot, write_snapshot, Quote, SharedStore, ValidationError, ALL_CATEGORIES};
use crate::remote::{publish_detached, sync_once, RemoteQuoteSource, SyncEvent};
use crate::storage::{KeyValueStore, MemoryStore, LAST_VIEWED_KEY, SELECTED_FILTER_KEY};
use crate::ui::Renderer;

pub struct App<S: KeyValueStore + 'static, R: Renderer> {
    store: SharedStore<S>,
    /// Lives only as long as the process.
    session: MemoryStore,
    renderer: R,
    remote: Option<Arc<dyn RemoteQuoteSource>>,
    publish_new_quotes: bool,
    filter: String,
}

impl<S: KeyValueStore + 'static, R: Renderer> App<S, R> {
    pub fn new(store: SharedStore<S>, session: MemoryStore, renderer: R) -> Self {
        Self {
            store,
            session,
            renderer,
            remote: None,
            publish_new_quotes: false,
            filter: ALL_CATEGORIES.to_string(),
        }
    }

    /// Attach a remote source for manual sync and, when `publish` is set,
    /// for announcing new quotes.
    pub fn with_remote(mut self, source: Arc<dyn RemoteQuoteSource>, publish: bool) -> Self {
        self.remote = Some(source);
        self.publish_new_quotes = publish;
        self
    }

    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Current category filter ("all" or a known category).
    pub fn filter(&self) -> &str {
        &self.filter
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Restore the saved filter and the session's last viewed quote, then
    /// render the category list.
    ///
    /// A saved filter naming a category that no longer exists falls back to
    /// "all" without comment.
    pub async fn init(&mut self) {
        let store = self.store.lock().await;

        let saved = match store.storage().get(SELECTED_FILTER_KEY).await {
            Ok(value) => value.and_then(|bytes| String::from_utf8(bytes).ok()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read saved filter");
                None
            }
        };
        let categories = store.categories();
        self.filter = match saved {
            Some(f) if f == ALL_CATEGORIES || categories.contains(&f.as_str()) => f,
            Some(f) => {
                tracing::debug!(filter = %f, "Saved filter no longer matches a category");
                ALL_CATEGORIES.to_string()
            }
            None => ALL_CATEGORIES.to_string(),
        };
        self.renderer.show_categories(&categories, &self.filter);
        drop(store);

        if let Some(quote) = self.last_viewed().await {
            self.renderer.show_quote(Some(&quote));
        }
    }

    /// The quote most recently shown in this session, if any.
    pub async fn last_viewed(&self) -> Option<Quote> {
        let bytes = self.session.get(LAST_VIEWED_KEY).await.ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Pick and show a random quote under the current filter.
    pub async fn show_random(&mut self) -> Option<Quote> {
        let picked = self.store.lock().await.pick_random(Some(&self.filter));
        self.renderer.show_quote(picked.as_ref());

        if let Some(quote) = &picked {
            match serde_json::to_vec(quote) {
                Ok(bytes) => {
                    if let Err(e) = self.session.set(LAST_VIEWED_KEY, &bytes).await {
                        tracing::warn!(error = %e, "Failed to remember last viewed quote");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode last viewed quote"),
            }
        }
        picked
    }

    /// Switch the category filter, save it, and list the matching quotes.
    ///
    /// Unknown categories leave the filter unchanged.
    pub async fn select_filter(&mut self, category: &str) -> bool {
        let store = self.store.lock().await;

        // Imported categories are stored verbatim, so an exact match wins
        // before falling back to the trimmed input.
        let is_known =
            |c: &str| c == ALL_CATEGORIES || store.categories().contains(&c);
        let category = if is_known(category) {
            category
        } else {
            category.trim()
        };
        if !is_known(category) {
            self.renderer
                .notify(&format!("Unknown category \"{}\".", category));
            self.renderer.show_matches(&[]);
            return false;
        }

        self.filter = category.to_string();
        if let Err(e) = store
            .storage()
            .set(SELECTED_FILTER_KEY, self.filter.as_bytes())
            .await
        {
            tracing::warn!(error = %e, "Failed to save selected filter");
        }

        self.renderer
            .show_categories(&store.categories(), &self.filter);
        self.renderer
            .show_matches(&store.filter_by_category(Some(&self.filter)));
        true
    }

    /// Show the categories and every quote under the current filter.
    pub async fn list(&mut self) {
        let store = self.store.lock().await;
        self.renderer
            .show_categories(&store.categories(), &self.filter);
        self.renderer
            .show_matches(&store.filter_by_category(Some(&self.filter)));
    }

    /// Add a quote from user input.
    ///
    /// On success the category list is re-rendered and, if configured, the
    /// quote is posted to the remote source in the background.
    pub async fn add_quote(&mut self, text: &str, category: &str) -> Result<Quote, ValidationError> {
        let mut store = self.store.lock().await;
        let quote = match store.add(text, category).await {
            Ok(quote) => quote,
            Err(e) => {
                self.renderer.notify(&e.to_string());
                return Err(e);
            }
        };

        self.renderer.notify("Quote added successfully!");
        self.renderer
            .show_categories(&store.categories(), &self.filter);
        drop(store);

        if self.publish_new_quotes {
            if let Some(source) = &self.remote {
                publish_detached(Arc::clone(source), quote.clone());
            }
        }
        Ok(quote)
    }

    /// Export the whole collection to `path`.
    pub async fn export_to(&mut self, path: &Path) -> Result<usize> {
        let (bytes, count) = {
            let store = self.store.lock().await;
            let bytes = store
                .export_snapshot()
                .context("Failed to serialize quotes")?;
            (bytes, store.len())
        };

        if let Err(e) = write_snapshot(&bytes, path) {
            self.renderer.notify(&format!("Export failed: {:#}", e));
            return Err(e);
        }
        self.renderer
            .notify(&format!("Exported {} quotes to {}", count, path.display()));
        Ok(count)
    }

    /// Append every quote from the snapshot file at `path`.
    pub async fn import_from(&mut self, path: &Path) -> Result<usize> {
        let bytes = match read_snapshot(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.renderer.notify(&format!("Import failed: {:#}", e));
                return Err(e);
            }
        };

        let mut store = self.store.lock().await;
        match store.import_snapshot(&bytes).await {
            Ok(count) => {
                self.renderer
                    .notify(&format!("Quotes imported successfully! ({} added)", count));
                self.renderer
                    .show_categories(&store.categories(), &self.filter);
                Ok(count)
            }
            Err(e) => {
                self.renderer.notify(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Run one reconcile pass against the remote source now.
    pub async fn sync_now(&mut self) -> Result<usize> {
        let Some(source) = self.remote.clone() else {
            self.renderer.notify("No remote source configured.");
            return Ok(0);
        };

        match sync_once(&self.store, source.as_ref()).await {
            Ok(report) if report.added > 0 => {
                self.renderer.notify(&format!(
                    "Quotes synced with server! ({} new)",
                    report.added
                ));
                let store = self.store.lock().await;
                self.renderer
                    .show_categories(&store.categories(), &self.filter);
                Ok(report.added)
            }
            Ok(_) => {
                self.renderer.notify("Already up to date.");
                Ok(0)
            }
            Err(e) => {
                self.renderer.notify(&format!("Sync failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Surface a notification from the background poller.
    pub async fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::QuotesAdded { count, at } => {
                self.renderer.notify(&format!(
                    "Quotes synced with server! ({} new at {})",
                    count,
                    at.format("%H:%M:%S")
                ));
                let store = self.store.lock().await;
                self.renderer
                    .show_categories(&store.categories(), &self.filter);
            }
            SyncEvent::FetchFailed { error } => {
                // Already logged by the poller; the next tick retries.
                tracing::debug!(error = %error, "Background sync failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::{QuoteStore, SequenceRandom};
    use crate::remote::RemoteError;
    use crate::storage::QUOTES_KEY;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Quote(Option<Quote>),
        Categories(Vec<String>, String),
        Matches(Vec<Quote>),
        Notice(String),
    }

    #[derive(Default)]
    struct RecordingRenderer {
        shown: Vec<Shown>,
    }

    impl RecordingRenderer {
        fn last(&self) -> Option<&Shown> {
            self.shown.last()
        }

        fn notices(&self) -> Vec<&str> {
            self.shown
                .iter()
                .filter_map(|s| match s {
                    Shown::Notice(m) => Some(m.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Renderer for RecordingRenderer {
        fn show_quote(&mut self, quote: Option<&Quote>) {
            self.shown.push(Shown::Quote(quote.cloned()));
        }

        fn show_categories(&mut self, categories: &[&str], selected: &str) {
            self.shown.push(Shown::Categories(
                categories.iter().map(|c| c.to_string()).collect(),
                selected.to_string(),
            ));
        }

        fn show_matches(&mut self, quotes: &[&Quote]) {
            self.shown
                .push(Shown::Matches(quotes.iter().map(|q| (*q).clone()).collect()));
        }

        fn notify(&mut self, message: &str) {
            self.shown.push(Shown::Notice(message.to_string()));
        }
    }

    struct FixedSource {
        quotes: Vec<Quote>,
        published: AtomicUsize,
    }

    #[async_trait]
    impl RemoteQuoteSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<Quote>, RemoteError> {
            Ok(self.quotes.clone())
        }

        async fn publish(&self, _quote: &Quote) -> Result<(), RemoteError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn q(text: &str, category: &str) -> Quote {
        Quote {
            text: text.to_owned(),
            category: category.to_owned(),
        }
    }

    async fn app_with(storage: MemoryStore) -> App<MemoryStore, RecordingRenderer> {
        let seed = vec![q("Do or do not", "Wisdom"), q("Carpe diem", "Life")];
        storage
            .set(QUOTES_KEY, &serde_json::to_vec(&seed).unwrap())
            .await
            .unwrap();
        let store = QuoteStore::load(storage, Box::new(SequenceRandom::new(vec![0.0]))).await;
        App::new(store.into_shared(), MemoryStore::new(), RecordingRenderer::default())
    }

    #[tokio::test]
    async fn test_init_defaults_to_all() {
        let mut app = app_with(MemoryStore::new()).await;
        app.init().await;

        assert_eq!(app.filter(), "all");
        assert_eq!(
            app.renderer().last(),
            Some(&Shown::Categories(
                vec!["Wisdom".into(), "Life".into()],
                "all".into()
            ))
        );
    }

    #[tokio::test]
    async fn test_init_restores_saved_filter() {
        let storage = MemoryStore::new();
        storage.set(SELECTED_FILTER_KEY, b"Life").await.unwrap();
        let mut app = app_with(storage).await;

        app.init().await;

        assert_eq!(app.filter(), "Life");
    }

    #[tokio::test]
    async fn test_init_stale_filter_falls_back() {
        let storage = MemoryStore::new();
        storage.set(SELECTED_FILTER_KEY, b"Gone").await.unwrap();
        let mut app = app_with(storage).await;

        app.init().await;

        assert_eq!(app.filter(), "all");
        assert!(app.renderer().notices().is_empty());
    }

    #[tokio::test]
    async fn test_show_random_remembers_in_session_only() {
        let durable = MemoryStore::new();
        let mut app = app_with(durable.clone()).await;
        app.init().await;

        let picked = app.show_random().await;

        assert_eq!(picked, Some(q("Do or do not", "Wisdom")));
        assert_eq!(app.last_viewed().await, picked);
        assert!(!durable.contains(LAST_VIEWED_KEY));

        // A fresh init in the same session redisplays it
        app.init().await;
        assert_eq!(app.renderer().last(), Some(&Shown::Quote(picked)));
    }

    #[tokio::test]
    async fn test_select_filter_persists_and_lists() {
        let durable = MemoryStore::new();
        let mut app = app_with(durable.clone()).await;

        assert!(app.select_filter(" Life ").await);

        assert_eq!(app.filter(), "Life");
        assert_eq!(
            durable.get(SELECTED_FILTER_KEY).await.unwrap(),
            Some(b"Life".to_vec())
        );
        assert_eq!(
            app.renderer().last(),
            Some(&Shown::Matches(vec![q("Carpe diem", "Life")]))
        );
        assert_eq!(app.show_random().await, Some(q("Carpe diem", "Life")));
    }

    #[tokio::test]
    async fn test_select_filter_padded_imported_category() {
        let mut app = app_with(MemoryStore::new()).await;
        app.store()
            .lock()
            .await
            .import_snapshot(br#"[{"text":"Padded","category":" Life "}]"#)
            .await
            .unwrap();

        assert!(app.select_filter(" Life ").await);
        assert_eq!(app.filter(), " Life ");
        assert_eq!(app.show_random().await, Some(q("Padded", " Life ")));

        // Trimmed input still reaches the unpadded category
        assert!(app.select_filter("Life ").await);
        assert_eq!(app.filter(), "Life");
    }

    #[tokio::test]
    async fn test_select_unknown_filter_rejected() {
        let durable = MemoryStore::new();
        let mut app = app_with(durable.clone()).await;

        assert!(!app.select_filter("Nope").await);

        assert_eq!(app.filter(), "all");
        assert!(!durable.contains(SELECTED_FILTER_KEY));
        assert_eq!(app.renderer().last(), Some(&Shown::Matches(Vec::new())));
    }

    #[tokio::test]
    async fn test_add_quote_success_updates_categories() {
        let mut app = app_with(MemoryStore::new()).await;

        let added = app.add_quote("Stay hungry", "Motivation").await.unwrap();

        assert_eq!(added, q("Stay hungry", "Motivation"));
        assert_eq!(app.renderer().notices(), vec!["Quote added successfully!"]);
        assert_eq!(
            app.renderer().last(),
            Some(&Shown::Categories(
                vec!["Wisdom".into(), "Life".into(), "Motivation".into()],
                "all".into()
            ))
        );
    }

    #[tokio::test]
    async fn test_add_quote_validation_message() {
        let mut app = app_with(MemoryStore::new()).await;

        let err = app.add_quote("  ", "Life").await.unwrap_err();

        assert_eq!(err, ValidationError::Empty);
        assert_eq!(
            app.renderer().notices(),
            vec!["Please fill in both the quote and category."]
        );
        assert_eq!(app.store().lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_add_quote_publishes_when_enabled() {
        let source = Arc::new(FixedSource {
            quotes: Vec::new(),
            published: AtomicUsize::new(0),
        });
        let mut app = app_with(MemoryStore::new())
            .await
            .with_remote(source.clone(), true);

        app.add_quote("Stay hungry", "Motivation").await.unwrap();
        // Let the detached publish run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(source.published.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_now_scenario() {
        let source = Arc::new(FixedSource {
            quotes: vec![q("Do or do not", "Server"), q("sunt aut facere", "Server")],
            published: AtomicUsize::new(0),
        });
        let mut app = app_with(MemoryStore::new())
            .await
            .with_remote(source, false);

        assert_eq!(app.sync_now().await.unwrap(), 1);
        assert_eq!(app.sync_now().await.unwrap(), 0);
        assert_eq!(
            app.renderer().notices(),
            vec!["Quotes synced with server! (1 new)", "Already up to date."]
        );
        assert_eq!(app.store().lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_sync_without_remote() {
        let mut app = app_with(MemoryStore::new()).await;
        assert_eq!(app.sync_now().await.unwrap(), 0);
        assert_eq!(app.renderer().notices(), vec!["No remote source configured."]);
    }

    #[tokio::test]
    async fn test_export_import_round_trip_doubles() {
        let dir = std::env::temp_dir().join("quotebox_app_test_round_trip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quotes.json");

        let mut app = app_with(MemoryStore::new()).await;
        assert_eq!(app.export_to(&path).await.unwrap(), 2);
        assert_eq!(app.import_from(&path).await.unwrap(), 2);

        let store = app.store().lock().await;
        assert_eq!(store.len(), 4);
        assert_eq!(store.quotes()[0], store.quotes()[2]);
        assert_eq!(store.quotes()[1], store.quotes()[3]);
        drop(store);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_import_bad_file_reports_and_keeps_state() {
        let dir = std::env::temp_dir().join("quotebox_app_test_bad_import");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quotes.json");
        std::fs::write(&path, r#"{"text":"x","category":"y"}"#).unwrap();

        let mut app = app_with(MemoryStore::new()).await;
        assert!(app.import_from(&path).await.is_err());

        assert_eq!(
            app.renderer().notices(),
            vec!["Invalid file format: expected a JSON array of quotes"]
        );
        assert_eq!(app.store().lock().await.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_handle_sync_event_notifies() {
        let mut app = app_with(MemoryStore::new()).await;
        app.handle_sync_event(SyncEvent::QuotesAdded {
            count: 2,
            at: chrono::Utc::now(),
        })
        .await;
        app.handle_sync_event(SyncEvent::FetchFailed {
            error: "boom".into(),
        })
        .await;

        let notices = app.renderer().notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Quotes synced with server! (2 new at "));
    }
}
