//! Record fetching from the content and retrieval services.
//!
//! The [`RecordSource`] trait is the single seam between the view models and
//! I/O. Two transports implement it:
//!
//! - **[`RemoteSource`]**: the HTTP content/retrieval service.
//! - **[`SnapshotSource`]**: precomputed JSON files in a data directory
//!   (`pages_index.json` and `page_bundles/<id>.json`).
//!
//! Both decode into the same [`crate::models`] types, so nothing above this
//! module knows which transport is active. Use [`source_from_config`] to
//! pick one from configuration:
//!
//! ```rust,no_run
//! # use corpus_viewer::config::Config;
//! # use corpus_viewer::fetcher::source_from_config;
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::minimal();
//! let source = source_from_config(&config.source)?;
//! let pages = source.list_pages(20, 0).await?;
//! # Ok(())
//! # }
//! ```

mod remote;
mod snapshot;

pub use remote::RemoteSource;
pub use snapshot::{bundle_path, index_path, is_safe_id, SnapshotSource};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, SourceConfig, Transport};
use crate::error::FetchResult;
use crate::models::{
    Health, NavNode, PageBundle, PageNavigation, PageSummary, RagAnswer, SearchResponse,
};

/// Read access to a document corpus.
///
/// | Method | Remote endpoint |
/// |--------|-----------------|
/// | [`list_pages`](RecordSource::list_pages) | `GET /pages?limit&offset` |
/// | [`page_bundle`](RecordSource::page_bundle) | `GET /pages/{id}/blocks` |
/// | [`page_navigation`](RecordSource::page_navigation) | `GET /navigation/page/{id}` |
/// | [`navigation_tree`](RecordSource::navigation_tree) | `GET /navigation/tree` |
/// | [`search`](RecordSource::search) | `POST /search` |
/// | [`rag`](RecordSource::rag) | `POST /rag` |
/// | [`health`](RecordSource::health) | `GET /health` |
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Transport name for logs and messages.
    fn name(&self) -> &'static str;

    async fn list_pages(&self, limit: usize, offset: usize) -> FetchResult<Vec<PageSummary>>;

    async fn page_bundle(&self, page_id: &str) -> FetchResult<PageBundle>;

    async fn page_navigation(&self, page_id: &str) -> FetchResult<PageNavigation>;

    async fn navigation_tree(&self) -> FetchResult<Vec<NavNode>>;

    async fn search(&self, query: &str, top_k: usize) -> FetchResult<SearchResponse>;

    async fn rag(&self, query: &str, top_k: Option<usize>) -> FetchResult<RagAnswer>;

    async fn health(&self) -> FetchResult<Health>;
}

/// Instantiate the transport selected by `config.transport`.
pub fn source_from_config(config: &SourceConfig) -> FetchResult<Arc<dyn RecordSource>> {
    let source: Arc<dyn RecordSource> = match config.transport {
        Transport::Remote => Arc::new(RemoteSource::new(config)?),
        Transport::StaticSnapshot => Arc::new(SnapshotSource::new(&config.data_dir)),
    };
    Ok(source)
}

/// CLI entry point for `cview health`.
pub async fn run_health(config: &Config) -> Result<()> {
    let source = source_from_config(&config.source)?;
    match source.health().await {
        Ok(health) => {
            println!("{:<12} {}", "TRANSPORT", "STATUS");
            println!("{:<12} {}", source.name(), health.status);
            Ok(())
        }
        Err(e) => {
            println!("{:<12} {}", "TRANSPORT", "STATUS");
            println!("{:<12} unavailable ({})", source.name(), e);
            anyhow::bail!("{} transport is unhealthy", source.name())
        }
    }
}
