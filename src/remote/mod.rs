//! Remote quote source and background sync.
//!
//! - [`client`] - HTTP source: fetch the remote set, post new quotes
//! - [`poller`] - cancellable periodic reconcile against a source

mod client;
mod poller;

pub use client::{
    build_client, publish_detached, HttpQuoteSource, RemoteError, RemoteQuoteSource,
    SERVER_CATEGORY,
};
pub use poller::{sync_once, SyncEvent, SyncPoller, SyncReport};
