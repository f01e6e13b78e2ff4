//! Search and RAG query clients.
//!
//! Each client owns its query text, its last results and a loading flag.
//! `submit` performs exactly one round trip and the loading flag is cleared
//! by an [`InFlight`] guard, so it is reset on success, on failure and when
//! the submit future is dropped half-way.

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::compose::section_key;
use crate::config::Config;
use crate::fetcher::{self, RecordSource};
use crate::models::{title_or_url, RagSource, SearchHit};

/// Bounds the retrieval service accepts for `top_k`.
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 50;

pub fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(MIN_TOP_K, MAX_TOP_K)
}

/// Sets a loading flag for its lifetime.
pub struct InFlight<'a> {
    flag: &'a mut bool,
}

impl<'a> InFlight<'a> {
    pub fn start(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

// ============ Search ============

#[derive(Debug, Clone, Default)]
pub struct SearchClient {
    query: String,
    top_k: usize,
    hits: Vec<SearchHit>,
    duration: Option<f64>,
    loading: bool,
    error: Option<String>,
}

impl SearchClient {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: clamp_top_k(top_k),
            ..Self::default()
        }
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    /// Server-reported duration of the last search, in seconds.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && !self.query.trim().is_empty()
    }

    /// Run the query. Returns false without any request when
    /// [`can_submit`](Self::can_submit) is false.
    pub async fn submit(&mut self, source: &dyn RecordSource) -> bool {
        if !self.can_submit() {
            return false;
        }
        let Self {
            query,
            top_k,
            hits,
            duration,
            loading,
            error,
        } = self;
        let _in_flight = InFlight::start(loading);
        hits.clear();
        *duration = None;
        *error = None;

        debug!(query = %query, top_k = *top_k, transport = source.name(), "search");
        match source.search(query.trim(), *top_k).await {
            Ok(response) => {
                *hits = response.hits;
                *duration = response.duration;
            }
            Err(e) => {
                warn!(error = %e, "search failed");
                *error = Some(e.to_string());
            }
        }
        true
    }

    pub fn render(&self) -> Vec<String> {
        if let Some(e) = &self.error {
            return vec![format!("Search failed: {}", e)];
        }
        let mut lines = render_hits(&self.hits);
        if let Some(secs) = self.duration {
            lines.push(format!("({} results in {:.3}s)", self.hits.len(), secs));
        }
        lines
    }
}

/// Numbered hits in the order given.
pub fn render_hits(hits: &[SearchHit]) -> Vec<String> {
    if hits.is_empty() {
        return vec!["No results.".to_string()];
    }
    let mut lines = Vec::new();
    for (i, hit) in hits.iter().enumerate() {
        lines.push(format!(
            "{}. [{:.3}] {}",
            i + 1,
            hit.score,
            title_or_url(hit.title.as_deref(), &hit.url)
        ));
        lines.push(format!("    url: {}", hit.url));
        if !hit.section_path.is_empty() {
            lines.push(format!("    section: {}", section_key(&hit.section_path)));
        }
        lines.push(format!(
            "    excerpt: \"{}\"",
            hit.text_preview.replace('\n', " ").trim()
        ));
        lines.push(format!("    page: {}", hit.page_id));
        lines.push(String::new());
    }
    lines
}

// ============ RAG ============

#[derive(Debug, Clone, Default)]
pub struct RagClient {
    query: String,
    top_k: Option<usize>,
    answer: Option<String>,
    sources: Vec<RagSource>,
    /// Model-side problem reported next to a fallback answer.
    notice: Option<String>,
    loading: bool,
    error: Option<String>,
}

impl RagClient {
    pub fn new(top_k: Option<usize>) -> Self {
        Self {
            top_k: top_k.map(clamp_top_k),
            ..Self::default()
        }
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn sources(&self) -> &[RagSource] {
        &self.sources
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && !self.query.trim().is_empty()
    }

    pub async fn submit(&mut self, source: &dyn RecordSource) -> bool {
        if !self.can_submit() {
            return false;
        }
        let Self {
            query,
            top_k,
            answer,
            sources,
            notice,
            loading,
            error,
        } = self;
        let _in_flight = InFlight::start(loading);
        *answer = None;
        sources.clear();
        *notice = None;
        *error = None;

        debug!(query = %query, top_k = ?top_k, transport = source.name(), "rag");
        match source.rag(query.trim(), *top_k).await {
            Ok(response) => {
                *answer = Some(response.answer);
                *sources = response.sources;
                *notice = response.error.filter(|e| !e.trim().is_empty());
            }
            Err(e) => {
                warn!(error = %e, "rag request failed");
                *error = Some(e.to_string());
            }
        }
        true
    }

    pub fn render(&self) -> Vec<String> {
        if let Some(e) = &self.error {
            return vec![format!("Answer failed: {}", e)];
        }
        let mut lines = Vec::new();
        match self.answer.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => lines.extend(a.lines().map(str::to_string)),
            _ => lines.push("(no answer)".to_string()),
        }
        if let Some(n) = &self.notice {
            lines.push(format!("! {}", n));
        }
        if !self.sources.is_empty() {
            lines.push(String::new());
            lines.push("Sources:".to_string());
            lines.extend(render_sources(&self.sources));
        }
        lines
    }
}

pub fn render_sources(sources: &[RagSource]) -> Vec<String> {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "  [{}] {} ({}) score {:.3}",
                i + 1,
                title_or_url(s.title.as_deref(), &s.url),
                s.url,
                s.score
            )
        })
        .collect()
}

// ============ CLI ============

/// CLI entry point for `cview search`.
pub async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let source = fetcher::source_from_config(&config.source)?;
    let mut client = SearchClient::new(top_k.unwrap_or(config.query.top_k));
    client.set_query(query);

    if !client.submit(source.as_ref()).await {
        bail!("query is empty");
    }
    for line in client.render() {
        println!("{}", line);
    }
    if let Some(e) = client.error() {
        bail!("search failed: {}", e);
    }
    Ok(())
}

/// CLI entry point for `cview ask`.
pub async fn run_ask(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let source = fetcher::source_from_config(&config.source)?;
    let mut client = RagClient::new(top_k);
    client.set_query(query);

    if !client.submit(source.as_ref()).await {
        bail!("query is empty");
    }
    for line in client.render() {
        println!("{}", line);
    }
    if let Some(e) = client.error() {
        bail!("rag request failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, FetchResult};
    use crate::models::{
        Health, NavNode, PageBundle, PageNavigation, PageSummary, RagAnswer, SearchResponse,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers search/rag from canned data and counts calls.
    #[derive(Default)]
    struct Canned {
        hits: Vec<SearchHit>,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordSource for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }
        async fn list_pages(&self, _: usize, _: usize) -> FetchResult<Vec<PageSummary>> {
            Ok(Vec::new())
        }
        async fn page_bundle(&self, id: &str) -> FetchResult<PageBundle> {
            Err(FetchError::not_found(id))
        }
        async fn page_navigation(&self, id: &str) -> FetchResult<PageNavigation> {
            Err(FetchError::not_found(id))
        }
        async fn navigation_tree(&self) -> FetchResult<Vec<NavNode>> {
            Ok(Vec::new())
        }
        async fn search(&self, _query: &str, _top_k: usize) -> FetchResult<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                return Err(FetchError::Transport("HTTP 500".into()));
            }
            Ok(SearchResponse {
                hits: self.hits.clone(),
                duration: Some(0.25),
            })
        }
        async fn rag(&self, query: &str, _top_k: Option<usize>) -> FetchResult<RagAnswer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Transport("HTTP 500".into()));
            }
            Ok(RagAnswer {
                answer: format!("answer to {}", query),
                sources: Vec::new(),
                error: Some("model timeout".into()),
            })
        }
        async fn health(&self) -> FetchResult<Health> {
            Ok(Health {
                status: "ok".into(),
            })
        }
    }

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            chunk_id: id.to_string(),
            page_id: format!("page-{}", id),
            url: format!("https://site/{}", id),
            title: Some(format!("Hit {}", id)),
            section_path: vec!["A".into()],
            text_preview: "preview".into(),
            score,
        }
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_request() {
        let source = Canned::default();
        let mut client = SearchClient::new(8);
        client.set_query("   ");
        assert!(!client.submit(&source).await);
        assert!(!client.is_loading());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_submit_clears_loading() {
        let source = Canned {
            hits: vec![hit("a", 0.9)],
            ..Canned::default()
        };
        let mut client = SearchClient::new(8);
        client.set_query("passport");
        assert!(client.submit(&source).await);
        assert!(!client.is_loading());
        assert_eq!(client.hits().len(), 1);
        assert_eq!(client.duration(), Some(0.25));
    }

    #[tokio::test]
    async fn hits_keep_service_order() {
        let source = Canned {
            hits: vec![hit("low", 0.1), hit("high", 0.9), hit("mid", 0.5)],
            ..Canned::default()
        };
        let mut client = SearchClient::new(8);
        client.set_query("q");
        client.submit(&source).await;
        let ids: Vec<&str> = client.hits().iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["low", "high", "mid"]);
    }

    #[tokio::test]
    async fn failure_clears_previous_hits_and_records_error() {
        let good = Canned {
            hits: vec![hit("a", 0.9)],
            ..Canned::default()
        };
        let bad = Canned {
            fail: true,
            ..Canned::default()
        };
        let mut client = SearchClient::new(8);
        client.set_query("q");
        client.submit(&good).await;
        client.submit(&bad).await;
        assert!(client.hits().is_empty());
        assert!(client.error().unwrap().contains("HTTP 500"));
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn dropped_submit_clears_loading() {
        let source = Canned {
            delay: Some(Duration::from_secs(5)),
            ..Canned::default()
        };
        let mut client = SearchClient::new(8);
        client.set_query("slow");
        let res =
            tokio::time::timeout(Duration::from_millis(20), client.submit(&source)).await;
        assert!(res.is_err());
        assert!(!client.is_loading());
        assert!(client.can_submit());
    }

    #[test]
    fn top_k_is_clamped() {
        assert_eq!(SearchClient::new(0).top_k(), 1);
        assert_eq!(SearchClient::new(500).top_k(), 50);
        assert_eq!(SearchClient::new(8).top_k(), 8);
    }

    #[tokio::test]
    async fn rag_keeps_answer_and_notice() {
        let source = Canned::default();
        let mut client = RagClient::new(None);
        client.set_query("how do I renew?");
        assert!(client.submit(&source).await);
        assert_eq!(client.answer(), Some("answer to how do I renew?"));
        assert_eq!(client.notice(), Some("model timeout"));
        assert!(!client.is_loading());
        let text = client.render().join("\n");
        assert!(text.contains("! model timeout"));
    }

    #[tokio::test]
    async fn rag_empty_query_is_rejected() {
        let source = Canned::default();
        let mut client = RagClient::new(Some(4));
        assert!(!client.submit(&source).await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn render_hits_formats_scores() {
        let lines = render_hits(&[hit("a", 0.87654)]);
        assert_eq!(lines[0], "1. [0.877] Hit a");
        assert!(lines.contains(&"    section: A".to_string()));
        assert_eq!(render_hits(&[]), vec!["No results."]);
    }
}
