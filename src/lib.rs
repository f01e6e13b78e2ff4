//! # Corpus Viewer
//!
//! A read-only browser for a pre-scraped document corpus: a page index with
//! filtering and pagination, a navigation tree, section-grouped page content,
//! and search / RAG query clients against a retrieval service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐
//! │ RemoteSource │     │SnapshotSource│
//! │   (HTTP)     │     │ (JSON files) │
//! └──────┬───────┘     └──────┬───────┘
//!        └────────┬───────────┘
//!                 ▼  RecordSource
//!   ┌─────────┬─────────┬───────────┬───────┐
//!   │ listing │ navtree │ reconcile │ query │
//!   └─────────┴─────────┴─────┬─────┴───────┘
//!                             ▼
//!                          compose
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cview pages --query passport          # filtered page index
//! cview tree --current 1042             # navigation with the page revealed
//! cview page 1042                       # content + navigation sidebar
//! cview search "renew licence"          # retrieval hits
//! cview ask "how do I renew?"           # RAG answer with sources
//! cview serve                           # serve a snapshot directory
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and env overrides |
//! | [`error`] | Fetch error taxonomy |
//! | [`models`] | Wire records |
//! | [`fetcher`] | `RecordSource` trait and both transports |
//! | [`navtree`] | Forest building, expansion state, tree rendering |
//! | [`compose`] | Section grouping of page blocks |
//! | [`reconcile`] | Concurrent page fetch and stale-response discard |
//! | [`query`] | Search and RAG clients |
//! | [`listing`] | Page index filter and pagination |
//! | [`server`] | Static snapshot HTTP server |

pub mod compose;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod listing;
pub mod models;
pub mod navtree;
pub mod query;
pub mod reconcile;
pub mod server;
