//! Static snapshot transport.
//!
//! Serves precomputed JSON from a data directory:
//!
//! ```text
//! <data_dir>/
//!   pages_index.json          bare array or {items: [...]} of PageSummary
//!   page_bundles/<id>.json    one PageBundle per page
//! ```
//!
//! Navigation is derived from parent links with
//! [`navtree::build_forest`](crate::navtree::build_forest) and
//! [`navtree::navigation_for`](crate::navtree::navigation_for). The index
//! usually omits `parent_url`; it is then read from the page's bundle. Search
//! and RAG need the live retrieval service and are unsupported here.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RecordSource;
use crate::error::{FetchError, FetchResult};
use crate::models::{
    Health, NavNode, PageBundle, PageList, PageMeta, PageNavigation, PageSummary, RagAnswer,
    SearchResponse,
};
use crate::navtree;

pub const INDEX_FILE: &str = "pages_index.json";
pub const BUNDLE_DIR: &str = "page_bundles";

pub fn index_path(data_dir: &Path) -> PathBuf {
    data_dir.join(INDEX_FILE)
}

/// Path of a page bundle, or `None` if the id could resolve outside
/// `page_bundles/`.
pub fn bundle_path(data_dir: &Path, page_id: &str) -> Option<PathBuf> {
    is_safe_id(page_id).then(|| data_dir.join(BUNDLE_DIR).join(format!("{}.json", page_id)))
}

/// An id usable as a single file name.
pub fn is_safe_id(page_id: &str) -> bool {
    !page_id.is_empty()
        && page_id != "."
        && page_id != ".."
        && !page_id.contains(['/', '\\', '\0'])
}

pub struct SnapshotSource {
    data_dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path, what: &str) -> FetchResult<T> {
        debug!(path = %path.display(), "reading snapshot file");
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(FetchError::not_found(what)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(format!("{}: {}", what, e)))
    }

    async fn all_pages(&self) -> FetchResult<Vec<PageSummary>> {
        let list: PageList = self
            .read_json(&index_path(&self.data_dir), "page index")
            .await?;
        Ok(list.into_items())
    }

    /// Index pages with `parent_url` filled in from each page's bundle when
    /// the index does not carry it.
    async fn linked_pages(&self) -> FetchResult<Vec<PageSummary>> {
        let mut pages = self.all_pages().await?;
        for page in pages.iter_mut().filter(|p| p.parent_url.is_none()) {
            let Some(path) = bundle_path(&self.data_dir, &page.page_id) else {
                continue;
            };
            match self.read_json::<BundleHead>(&path, "page bundle").await {
                Ok(head) => page.parent_url = head.page.parent_url,
                Err(e) => debug!(page_id = %page.page_id, error = %e, "no parent link"),
            }
        }
        Ok(pages)
    }

    /// `pages_index.json` exactly as stored.
    pub async fn raw_index(&self) -> FetchResult<Value> {
        self.read_json(&index_path(&self.data_dir), "page index")
            .await
    }

    /// `page_bundles/<id>.json` exactly as stored.
    pub async fn raw_bundle(&self, page_id: &str) -> FetchResult<Value> {
        let what = format!("page {}", page_id);
        let path = bundle_path(&self.data_dir, page_id).ok_or_else(|| FetchError::not_found(&what))?;
        self.read_json(&path, &what).await
    }
}

/// The `page` object of a bundle; blocks are skipped.
#[derive(Deserialize)]
struct BundleHead {
    page: PageMeta,
}

#[async_trait]
impl RecordSource for SnapshotSource {
    fn name(&self) -> &'static str {
        "static-snapshot"
    }

    async fn list_pages(&self, limit: usize, offset: usize) -> FetchResult<Vec<PageSummary>> {
        Ok(self
            .all_pages()
            .await?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn page_bundle(&self, page_id: &str) -> FetchResult<PageBundle> {
        let what = format!("page {}", page_id);
        let path = bundle_path(&self.data_dir, page_id).ok_or_else(|| FetchError::not_found(&what))?;
        self.read_json(&path, &what).await
    }

    async fn page_navigation(&self, page_id: &str) -> FetchResult<PageNavigation> {
        let pages = self.linked_pages().await?;
        navtree::navigation_for(&pages, page_id)
            .ok_or_else(|| FetchError::not_found(format!("navigation for page {}", page_id)))
    }

    async fn navigation_tree(&self) -> FetchResult<Vec<NavNode>> {
        Ok(navtree::build_forest(&self.linked_pages().await?))
    }

    async fn search(&self, _query: &str, _top_k: usize) -> FetchResult<SearchResponse> {
        Err(FetchError::Unsupported("search", "static-snapshot"))
    }

    async fn rag(&self, _query: &str, _top_k: Option<usize>) -> FetchResult<RagAnswer> {
        Err(FetchError::Unsupported("rag", "static-snapshot"))
    }

    async fn health(&self) -> FetchResult<Health> {
        match tokio::fs::metadata(index_path(&self.data_dir)).await {
            Ok(meta) if meta.is_file() => Ok(Health {
                status: "ok".to_string(),
            }),
            Ok(_) => Err(FetchError::not_found(INDEX_FILE)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::not_found(INDEX_FILE)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_ids() {
        assert!(is_safe_id("12345"));
        assert!(is_safe_id("page-1.v2"));
        assert!(!is_safe_id(""));
        assert!(!is_safe_id(".."));
        assert!(!is_safe_id("../etc/passwd"));
        assert!(!is_safe_id("a\\b"));
    }

    #[test]
    fn bundle_path_stays_in_bundle_dir() {
        let dir = Path::new("/data");
        assert_eq!(
            bundle_path(dir, "p1").unwrap(),
            PathBuf::from("/data/page_bundles/p1.json")
        );
        assert!(bundle_path(dir, "../p1").is_none());
    }
}
