//! HTTP transport against the content/retrieval service.
//!
//! Transient failures are retried with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - HTTP 404 → [`FetchError::NotFound`], no retry
//! - other 4xx → [`FetchError::Transport`], no retry
//! - network errors → retry
//! - backoff: 250ms, 500ms, 1s, ... (capped at 2^5 steps)

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::RecordSource;
use crate::config::SourceConfig;
use crate::error::{FetchError, FetchResult};
use crate::models::{
    Health, NavNode, NavTreeResponse, PageBundle, PageList, PageNavigation, PageSummary,
    RagAnswer, SearchResponse,
};

pub struct RemoteSource {
    client: reqwest::Client,
    base: Url,
    max_retries: u32,
}

impl RemoteSource {
    pub fn new(config: &SourceConfig) -> FetchResult<Self> {
        let base = Url::parse(config.base_url.trim())
            .map_err(|e| FetchError::Transport(format!("invalid base url: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::Transport(format!(
                "base url cannot carry paths: {}",
                base
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base,
            max_retries: config.max_retries,
        })
    }

    /// Base url with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> FetchResult<T> {
        self.send_json(Method::GET, url, None, what).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: serde_json::Value,
        what: &str,
    ) -> FetchResult<T> {
        self.send_json(Method::POST, url, Some(body), what).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        what: &str,
    ) -> FetchResult<T> {
        let build = || -> RequestBuilder {
            let req = self.client.request(method.clone(), url.clone());
            match &body {
                Some(b) => req.json(b),
                None => req,
            }
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(250 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            debug!(%method, %url, attempt, "request");

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(%url, attempt, error = %e, "request failed");
                    last_err = Some(FetchError::from(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let bytes = response.bytes().await?;
                return serde_json::from_slice(&bytes).map_err(|e| {
                    FetchError::Malformed(format!("{}: {}", what, e))
                });
            }

            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::not_found(what));
            }

            let body_text = response.text().await.unwrap_or_default();
            let err = FetchError::Transport(format!("HTTP {}: {}", status, body_text.trim()));

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(%url, attempt, %status, "retryable response");
                last_err = Some(err);
                continue;
            }

            return Err(err);
        }

        Err(last_err
            .unwrap_or_else(|| FetchError::Transport(format!("{}: retries exhausted", what))))
    }
}

#[async_trait]
impl RecordSource for RemoteSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn list_pages(&self, limit: usize, offset: usize) -> FetchResult<Vec<PageSummary>> {
        let mut url = self.endpoint(&["pages"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let list: PageList = self.get_json(url, "page list").await?;
        Ok(list.into_items())
    }

    async fn page_bundle(&self, page_id: &str) -> FetchResult<PageBundle> {
        let url = self.endpoint(&["pages", page_id, "blocks"]);
        self.get_json(url, &format!("page {}", page_id)).await
    }

    async fn page_navigation(&self, page_id: &str) -> FetchResult<PageNavigation> {
        let url = self.endpoint(&["navigation", "page", page_id]);
        self.get_json(url, &format!("navigation for page {}", page_id))
            .await
    }

    async fn navigation_tree(&self) -> FetchResult<Vec<NavNode>> {
        let url = self.endpoint(&["navigation", "tree"]);
        let tree: NavTreeResponse = self.get_json(url, "navigation tree").await?;
        Ok(tree.tree)
    }

    async fn search(&self, query: &str, top_k: usize) -> FetchResult<SearchResponse> {
        let url = self.endpoint(&["search"]);
        self.post_json(url, json!({ "query": query, "top_k": top_k }), "search")
            .await
    }

    async fn rag(&self, query: &str, top_k: Option<usize>) -> FetchResult<RagAnswer> {
        let url = self.endpoint(&["rag"]);
        let body = match top_k {
            Some(k) => json!({ "query": query, "top_k": k }),
            None => json!({ "query": query }),
        };
        self.post_json(url, body, "rag answer").await
    }

    async fn health(&self) -> FetchResult<Health> {
        let url = self.endpoint(&["health"]);
        self.get_json(url, "health").await
    }
}
