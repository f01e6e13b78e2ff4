//! Page view: concurrent content + navigation fetch, reconciled into one
//! render.
//!
//! A page needs two independent records, the [`PageBundle`] and the
//! [`PageNavigation`]. Both are requested at once with [`join_settled`] and
//! merged only after both settle; either may fail without taking the other
//! down:
//!
//! | content | navigation | rendered |
//! |---------|------------|----------|
//! | ok      | ok         | content + sidebar |
//! | ok      | failed     | content, sidebar omitted, notice |
//! | failed  | ok         | "not found"/"failed" state + sidebar |
//! | failed  | failed     | "not found"/"failed" state, notices |
//!
//! When the requested page changes while a fetch is in flight, only the most
//! recent request may be committed. [`PageViewState`] tags every request with
//! a [`FetchTicket`] and [`PageViewState::settle`] drops results whose ticket
//! is no longer current.

use anyhow::Result;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

use crate::compose::{compose, ComposedDocument};
use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::fetcher::{self, RecordSource};
use crate::models::{PageBundle, PageMeta, PageNavigation};

/// Await two futures concurrently and return both outputs. Neither result
/// short-circuits the other.
pub async fn join_settled<A, B>(a: A, b: B) -> (A::Output, B::Output)
where
    A: Future,
    B: Future,
{
    tokio::join!(a, b)
}

/// Which of the two page fetches a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    Content,
    Navigation,
}

impl fmt::Display for ViewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewSource::Content => f.write_str("content"),
            ViewSource::Navigation => f.write_str("navigation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentState {
    Loaded {
        page: PageMeta,
        document: ComposedDocument,
    },
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page_id: String,
    pub content: ContentState,
    /// `None` when the navigation fetch failed.
    pub navigation: Option<PageNavigation>,
    /// One entry per failed fetch, in content-then-navigation order.
    pub failures: Vec<(ViewSource, String)>,
}

impl PageView {
    /// Merge both settled fetches. Failures are logged and recorded, never
    /// returned.
    pub fn reconcile(
        page_id: &str,
        content: FetchResult<PageBundle>,
        navigation: FetchResult<PageNavigation>,
    ) -> Self {
        let mut failures = Vec::new();

        let content = match content {
            Ok(bundle) => ContentState::Loaded {
                document: compose(bundle.blocks),
                page: bundle.page,
            },
            Err(e) => {
                warn!(page_id, source = %ViewSource::Content, error = %e, "page fetch failed");
                failures.push((ViewSource::Content, e.to_string()));
                match e {
                    FetchError::NotFound { .. } => ContentState::NotFound,
                    other => ContentState::Failed(other.to_string()),
                }
            }
        };

        let navigation = match navigation {
            Ok(nav) => Some(nav),
            Err(e) => {
                warn!(page_id, source = %ViewSource::Navigation, error = %e, "page fetch failed");
                failures.push((ViewSource::Navigation, e.to_string()));
                None
            }
        };

        Self {
            page_id: page_id.to_string(),
            content,
            navigation,
            failures,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.content, ContentState::Loaded { .. })
    }

    /// Page title from the bundle, else from the navigation context.
    pub fn title(&self) -> Option<&str> {
        match &self.content {
            ContentState::Loaded { page, .. } if !page.title.trim().is_empty() => Some(&page.title),
            _ => self
                .navigation
                .as_ref()
                .map(|n| n.current.display_title())
                .filter(|t| !t.is_empty()),
        }
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("# {}", self.title().unwrap_or("Page"))];

        match &self.content {
            ContentState::Loaded { page, document } => {
                if let Some(trail) = breadcrumb_line(&page.breadcrumbs) {
                    lines.push(trail);
                }
                if !page.url.is_empty() {
                    lines.push(page.url.clone());
                }
                for (source, message) in &self.failures {
                    lines.push(format!("! {} unavailable: {}", source, message));
                }
                lines.push(String::new());
                if document.is_empty() {
                    lines.push("(this page has no content)".to_string());
                } else {
                    lines.extend(document.render());
                }
            }
            ContentState::NotFound => {
                lines.push(String::new());
                lines.push(format!("Page not found: {}", self.page_id));
                lines.extend(self.navigation_failure_notice());
            }
            ContentState::Failed(message) => {
                lines.push(String::new());
                lines.push(format!("Failed to load page content: {}", message));
                lines.extend(self.navigation_failure_notice());
            }
        }

        if let Some(nav) = &self.navigation {
            lines.push(String::new());
            lines.extend(render_navigation(nav));
        }
        lines
    }

    fn navigation_failure_notice(&self) -> Option<String> {
        self.failures
            .iter()
            .find(|(s, _)| *s == ViewSource::Navigation)
            .map(|(s, m)| format!("! {} unavailable: {}", s, m))
    }
}

/// Breadcrumb trail joined with `›`; blank labels are skipped.
fn breadcrumb_line(breadcrumbs: &[String]) -> Option<String> {
    let labels: Vec<&str> = breadcrumbs
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .collect();
    (!labels.is_empty()).then(|| labels.join(" › "))
}

/// Sidebar lines: parent, siblings, children.
pub fn render_navigation(nav: &PageNavigation) -> Vec<String> {
    let mut lines = vec!["--- Navigation ---".to_string()];
    if let Some(parent) = &nav.parent {
        lines.push(format!("Up:       {} [{}]", parent.display_title(), parent.page_id));
    }
    for (label, refs) in [("Siblings", &nav.siblings), ("Children", &nav.children)] {
        if refs.is_empty() {
            continue;
        }
        lines.push(format!("{}:", label));
        for r in refs {
            lines.push(format!("  - {} [{}]", r.display_title(), r.page_id));
        }
    }
    lines
}

/// Identifies one page request. Only the ticket issued last is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    page_id: String,
}

impl FetchTicket {
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Transient state of the page view.
#[derive(Debug, Default)]
pub struct PageViewState {
    generation: u64,
    pending: Option<FetchTicket>,
    view: Option<PageView>,
}

impl PageViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading `page_id`. The previous view is cleared at once so no
    /// stale page is shown while the new one is in flight.
    pub fn request(&mut self, page_id: &str) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            page_id: page_id.to_string(),
        };
        if let Some(old) = self.pending.replace(ticket.clone()) {
            debug!(superseded = %old.page_id, page_id, "page request superseded");
        }
        self.view = None;
        ticket
    }

    /// True from [`request`](Self::request) until the matching
    /// [`settle`](Self::settle).
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Commit both results if `ticket` is the latest request. Returns false
    /// (and changes nothing) for a superseded ticket.
    pub fn settle(
        &mut self,
        ticket: &FetchTicket,
        content: FetchResult<PageBundle>,
        navigation: FetchResult<PageNavigation>,
    ) -> bool {
        if self.pending.as_ref() != Some(ticket) {
            debug!(
                page_id = %ticket.page_id,
                generation = ticket.generation,
                "discarding stale page response"
            );
            return false;
        }
        self.pending = None;
        self.view = Some(PageView::reconcile(&ticket.page_id, content, navigation));
        true
    }

    pub fn view(&self) -> Option<&PageView> {
        self.view.as_ref()
    }

    pub fn requested_page(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|t| t.page_id.as_str())
            .or_else(|| self.view.as_ref().map(|v| v.page_id.as_str()))
    }
}

/// Fetch bundle and navigation for one page concurrently.
pub async fn fetch_page(
    source: &dyn RecordSource,
    page_id: &str,
) -> (FetchResult<PageBundle>, FetchResult<PageNavigation>) {
    join_settled(source.page_bundle(page_id), source.page_navigation(page_id)).await
}

/// Request, fetch and settle one page. Returns whether the result was
/// committed.
pub async fn load_page(source: &dyn RecordSource, state: &mut PageViewState, page_id: &str) -> bool {
    let ticket = state.request(page_id);
    let (content, navigation) = fetch_page(source, page_id).await;
    state.settle(&ticket, content, navigation)
}

/// CLI entry point for `cview page <id>`.
pub async fn run_page(config: &Config, page_id: &str) -> Result<()> {
    let source = fetcher::source_from_config(&config.source)?;
    let mut state = PageViewState::new();
    load_page(source.as_ref(), &mut state, page_id).await;

    if let Some(view) = state.view() {
        for line in view.render() {
            println!("{}", line);
        }
    }
    Ok(())
}
