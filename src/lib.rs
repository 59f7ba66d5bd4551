//! Outbox - offline-first record sync with an app-shell asset cache
//!
//! Records created while offline are queued in a local outbox and
//! reconciled with a remote document store when connectivity returns. The
//! remote's snapshots are mirrored locally so the last known state stays
//! readable offline.
//!
//! # Architecture
//!
//! - [`engine`] - Outbox/reconciliation protocol and its event loop
//! - [`storage`] - SQLite outbox, mirror and asset tables
//! - [`channel`] - Remote document store (HTTP or in-memory)
//! - [`connectivity`] - Online/offline state and edge events
//! - [`view`] - Projection of mirror and outbox into the rendered list
//! - [`asset_cache`] - Versioned cache-first shell asset store
//! - [`model`] - Records, drafts, outbox entries, status vocabulary
//! - [`config`] - Database path and settings resolution
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod asset_cache;
pub mod channel;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod model;
pub mod storage;
pub mod view;

pub use error::{Error, Result};
