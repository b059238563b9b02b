//! Random quote manager.
//!
//! A [`quote::QuoteStore`] owns the collection and keeps it in a durable
//! [`storage::KeyValueStore`]; [`remote`] reconciles it against an HTTP
//! endpoint; [`app`] wires user actions to the store and a [`ui::Renderer`].

pub mod app;
pub mod config;
pub mod quote;
pub mod remote;
pub mod storage;
pub mod ui;
pub mod util;
