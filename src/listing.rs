//! Page index: filter by title, then paginate.

use anyhow::Result;
use tracing::warn;

use crate::config::Config;
use crate::fetcher;
use crate::models::PageSummary;

#[derive(Debug, Clone)]
pub struct PageIndex {
    items: Vec<PageSummary>,
    query: String,
    page: usize,
    page_size: usize,
    /// Indices into `items` matching `query`, in item order.
    matches: Vec<usize>,
}

impl PageIndex {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            query: String::new(),
            page: 0,
            page_size: page_size.max(1),
            matches: Vec::new(),
        }
    }

    pub fn with_items(page_size: usize, items: Vec<PageSummary>) -> Self {
        let mut index = Self::new(page_size);
        index.set_items(items);
        index
    }

    /// Replace the item list, keeping the query and clamping the page.
    pub fn set_items(&mut self, items: Vec<PageSummary>) {
        self.items = items;
        self.refilter();
        self.page = self.page.min(self.last_page());
    }

    /// Set the filter text. Always returns to the first page.
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.page = 0;
        self.refilter();
    }

    fn refilter(&mut self) {
        let needle = self.query.to_lowercase();
        self.matches = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, p)| needle.is_empty() || p.title.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn filtered_len(&self) -> usize {
        self.matches.len()
    }

    pub fn filtered(&self) -> impl Iterator<Item = &PageSummary> {
        self.matches.iter().map(|&i| &self.items[i])
    }

    /// Items of the current page.
    pub fn window(&self) -> Vec<&PageSummary> {
        let start = (self.page * self.page_size).min(self.matches.len());
        let end = (start + self.page_size).min(self.matches.len());
        self.matches[start..end]
            .iter()
            .map(|&i| &self.items[i])
            .collect()
    }

    /// At least 1, even when nothing matches.
    pub fn page_count(&self) -> usize {
        self.matches.len().div_ceil(self.page_size).max(1)
    }

    fn last_page(&self) -> usize {
        self.page_count() - 1
    }

    pub fn has_next(&self) -> bool {
        (self.page + 1) * self.page_size < self.matches.len()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn next(&mut self) -> bool {
        if self.has_next() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.has_prev() {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to `page`, clamped to the last page.
    pub fn go_to(&mut self, page: usize) {
        self.page = page.min(self.last_page());
    }

    pub fn render(&self) -> Vec<String> {
        let window = self.window();
        if window.is_empty() {
            return vec!["No pages.".to_string()];
        }
        let mut lines = Vec::new();
        for page in window {
            lines.push(format!("{}  [{}]", page.display_title(), page.page_id));
            lines.push(format!("    {}", summary_line(page)));
        }
        lines.push(String::new());
        lines.push(format!(
            "Page {} of {} ({} pages)",
            self.page + 1,
            self.page_count(),
            self.matches.len()
        ));
        lines
    }
}

fn summary_line(page: &PageSummary) -> String {
    let mut parts = vec![page.url.clone()];
    if let Some(n) = page.chunks_count {
        parts.push(format!("{} chunks", n));
    }
    if let Some(n) = page.tables_count {
        parts.push(format!("{} tables", n));
    }
    if let Some(dt) = page.fetched_at_utc() {
        parts.push(format!("fetched {}", dt.format("%Y-%m-%d")));
    }
    parts.join(" • ")
}

/// CLI entry point for `cview pages`. `page` is 1-based.
pub async fn run_pages(config: &Config, query: Option<&str>, page: usize) -> Result<()> {
    let source = fetcher::source_from_config(&config.source)?;
    let items = match source.list_pages(config.listing.fetch_limit, 0).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, transport = source.name(), "page list fetch failed");
            println!("Failed to load pages: {}", e);
            Vec::new()
        }
    };

    let mut index = PageIndex::with_items(config.listing.page_size, items);
    if let Some(q) = query {
        index.set_query(q);
    }
    index.go_to(page.saturating_sub(1));

    for line in index.render() {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(i: usize, title: &str) -> PageSummary {
        PageSummary {
            page_id: format!("p{}", i),
            url: format!("https://site/{}", i),
            title: title.to_string(),
            text_chars_total: None,
            chunks_count: Some(3),
            tables_count: Some(1),
            fetched_at: Some("2024-05-01T12:00:00Z".to_string()),
            parent_url: None,
        }
    }

    fn numbered(n: usize) -> Vec<PageSummary> {
        (0..n).map(|i| page(i, &format!("Page {}", i))).collect()
    }

    #[test]
    fn empty_query_matches_everything() {
        let index = PageIndex::with_items(20, numbered(45));
        assert_eq!(index.filtered_len(), 45);
        assert_eq!(index.page_count(), 3);
    }

    #[test]
    fn filter_is_case_insensitive_on_title() {
        let mut index = PageIndex::with_items(
            20,
            vec![page(0, "Passport renewal"), page(1, "Driving licence"), page(2, "PASSPORT fees")],
        );
        index.set_query("passport");
        let ids: Vec<&str> = index.filtered().map(|p| p.page_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p2"]);
    }

    #[test]
    fn whitespace_query_is_matched_literally() {
        let mut index = PageIndex::with_items(
            20,
            vec![page(0, "Passport renewal"), page(1, "Fees"), page(2, "Road tax")],
        );
        index.set_query(" ");
        let ids: Vec<&str> = index.filtered().map(|p| p.page_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p2"]);
    }

    #[test]
    fn windows_and_boundaries() {
        let mut index = PageIndex::with_items(20, numbered(45));
        assert!(!index.has_prev());
        assert_eq!(index.window().len(), 20);
        assert!(index.next());
        assert!(index.next());
        assert_eq!(index.window().len(), 5);
        assert_eq!(index.window()[0].page_id, "p40");
        assert!(!index.has_next());
        assert!(!index.next());
        assert_eq!(index.page(), 2);
    }

    #[test]
    fn exact_multiple_has_no_empty_trailing_page() {
        let mut index = PageIndex::with_items(20, numbered(40));
        index.next();
        assert!(!index.has_next());
        assert_eq!(index.page_count(), 2);
    }

    #[test]
    fn setting_query_resets_page() {
        let mut index = PageIndex::with_items(20, numbered(45));
        index.next();
        index.set_query("zzz");
        assert_eq!(index.page(), 0);
        assert_eq!(index.filtered_len(), 0);
        assert!(!index.has_next());
        assert!(!index.has_prev());
        assert_eq!(index.render(), vec!["No pages."]);
    }

    #[test]
    fn go_to_is_clamped() {
        let mut index = PageIndex::with_items(20, numbered(45));
        index.go_to(99);
        assert_eq!(index.page(), 2);
    }

    #[test]
    fn render_falls_back_to_url_and_has_footer() {
        let index = PageIndex::with_items(20, vec![page(0, "")]);
        let lines = index.render();
        assert_eq!(lines[0], "https://site/0  [p0]");
        assert_eq!(
            lines[1],
            "    https://site/0 • 3 chunks • 1 tables • fetched 2024-05-01"
        );
        assert_eq!(lines.last().unwrap(), "Page 1 of 1 (1 pages)");
    }

    #[test]
    fn shrinking_items_clamps_page() {
        let mut index = PageIndex::with_items(20, numbered(45));
        index.go_to(2);
        index.set_items(numbered(10));
        assert_eq!(index.page(), 0);
    }
}
