//! Navigation tree: forest construction, expansion state and rendering.
//!
//! A [`NavTree`] owns an immutable forest of [`NavNode`]s plus the *open set*
//! of expanded page ids. Rendering is a pure traversal ([`render_rows`]) over
//! the forest and a snapshot of the open set; the open set only changes
//! through [`NavTree::toggle`] and friends, never during a traversal.
//!
//! ```text
//! ▾ Services                 depth 0, open
//!   ▸ Payments               depth 1, closed (has children)
//!     Taxes                  depth 1, leaf
//! ▸ Help                     depth 0, closed
//! ```
//!
//! [`build_forest`] and [`navigation_for`] derive the same structures the
//! content service computes server-side, so the snapshot transport can serve
//! navigation from the page index alone.

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchResult;
use crate::fetcher;
use crate::models::{NavNode, NavRef, PageNavigation, PageSummary};

/// Indentation per tree level.
pub const INDENT: &str = "  ";

/// One visible line of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavRow {
    pub page_id: String,
    pub title: String,
    pub url: String,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

impl NavRow {
    /// Toggle marker followed by the title, indented by depth.
    pub fn render(&self) -> String {
        let marker = match (self.has_children, self.expanded) {
            (true, true) => "▾",
            (true, false) => "▸",
            (false, _) => " ",
        };
        let title = if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        };
        format!("{}{} {}", INDENT.repeat(self.depth), marker, title)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavTree {
    roots: Vec<NavNode>,
    open: BTreeSet<String>,
}

impl NavTree {
    /// A freshly loaded tree: exactly the root level is open.
    pub fn new(roots: Vec<NavNode>) -> Self {
        let open = roots.iter().map(|n| n.page_id.clone()).collect();
        Self { roots, open }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a fetch outcome. A failed fetch yields an empty tree.
    pub fn from_fetch(result: FetchResult<Vec<NavNode>>) -> Self {
        match result {
            Ok(roots) => {
                debug!(roots = roots.len(), "navigation tree loaded");
                Self::new(roots)
            }
            Err(e) => {
                warn!(error = %e, "navigation tree unavailable");
                Self::empty()
            }
        }
    }

    pub fn roots(&self) -> &[NavNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn open_ids(&self) -> &BTreeSet<String> {
        &self.open
    }

    pub fn is_open(&self, page_id: &str) -> bool {
        self.open.contains(page_id)
    }

    pub fn find(&self, page_id: &str) -> Option<&NavNode> {
        let mut path = Vec::new();
        path_to(&self.roots, page_id, &mut path).then(|| path[path.len() - 1])
    }

    /// Flip one node between open and closed and return whether it is now
    /// open. Leaves and unknown ids are left untouched.
    pub fn toggle(&mut self, page_id: &str) -> bool {
        let toggleable = self.find(page_id).is_some_and(NavNode::has_children);
        if !toggleable {
            return false;
        }
        if !self.open.remove(page_id) {
            self.open.insert(page_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn expand(&mut self, page_id: &str) {
        if self.find(page_id).is_some_and(NavNode::has_children) {
            self.open.insert(page_id.to_string());
        }
    }

    pub fn collapse(&mut self, page_id: &str) {
        self.open.remove(page_id);
    }

    /// Open every node that has children.
    pub fn expand_all(&mut self) {
        fn collect(nodes: &[NavNode], out: &mut BTreeSet<String>) {
            for node in nodes {
                if node.has_children() {
                    out.insert(node.page_id.clone());
                    collect(&node.children, out);
                }
            }
        }
        collect(&self.roots, &mut self.open);
    }

    pub fn collapse_all(&mut self) {
        self.open.clear();
    }

    /// Open every ancestor of `page_id` so that it becomes visible.
    /// Returns false if the id is not in the tree.
    pub fn expand_path_to(&mut self, page_id: &str) -> bool {
        let mut path = Vec::new();
        if !path_to(&self.roots, page_id, &mut path) {
            return false;
        }
        let ancestors: Vec<String> = path[..path.len() - 1]
            .iter()
            .map(|n| n.page_id.clone())
            .collect();
        self.open.extend(ancestors);
        true
    }

    /// Visible rows for the current open set.
    pub fn rows(&self) -> Vec<NavRow> {
        render_rows(&self.roots, &self.open)
    }

    /// Rendered lines; the row for `current` is prefixed with `>`.
    pub fn render(&self, current: Option<&str>) -> Vec<String> {
        if self.is_empty() {
            return vec!["(navigation is empty)".to_string()];
        }
        self.rows()
            .iter()
            .map(|row| {
                let prefix = if Some(row.page_id.as_str()) == current {
                    "> "
                } else {
                    "  "
                };
                format!("{}{}", prefix, row.render())
            })
            .collect()
    }
}

/// Depth-first traversal: every root is visible; a node's children are
/// visible iff the node is in `open` and has children.
pub fn render_rows(roots: &[NavNode], open: &BTreeSet<String>) -> Vec<NavRow> {
    fn walk(nodes: &[NavNode], depth: usize, open: &BTreeSet<String>, out: &mut Vec<NavRow>) {
        for node in nodes {
            let expanded = node.has_children() && open.contains(&node.page_id);
            out.push(NavRow {
                page_id: node.page_id.clone(),
                title: node.title.clone(),
                url: node.url.clone(),
                depth,
                has_children: node.has_children(),
                expanded,
            });
            if expanded {
                walk(&node.children, depth + 1, open, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(roots, 0, open, &mut out);
    out
}

/// Collect the chain root..=target into `path`.
fn path_to<'a>(nodes: &'a [NavNode], page_id: &str, path: &mut Vec<&'a NavNode>) -> bool {
    for node in nodes {
        path.push(node);
        if node.page_id == page_id || path_to(&node.children, page_id, path) {
            return true;
        }
        path.pop();
    }
    false
}

/// Build a forest from flat pages linked by `parent_url`.
///
/// Pages are taken in url order. A page whose `parent_url` is the url of
/// another page becomes its child; every other page is a root. Children are
/// sorted by title (stable, so equal titles stay in url order). Duplicate
/// page ids keep their first occurrence. A parent chain that loops back on
/// itself is cut at the first member met in url order, which becomes a root.
pub fn build_forest(pages: &[PageSummary]) -> Vec<NavNode> {
    let mut seen = BTreeSet::new();
    let mut pages: Vec<&PageSummary> = pages
        .iter()
        .filter(|p| seen.insert(p.page_id.as_str()))
        .collect();
    pages.sort_by(|a, b| a.url.cmp(&b.url));

    let mut by_url: HashMap<&str, usize> = HashMap::new();
    for (idx, page) in pages.iter().enumerate() {
        if !page.url.is_empty() {
            by_url.entry(page.url.as_str()).or_insert(idx);
        }
    }

    let mut parent: Vec<Option<usize>> = pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            page.parent_url
                .as_deref()
                .and_then(|url| by_url.get(url).copied())
                .filter(|&p| p != idx)
        })
        .collect();

    for start in 0..pages.len() {
        let mut cursor = parent[start];
        let mut steps = 0;
        while let Some(p) = cursor {
            if p == start {
                debug!(page_id = %pages[start].page_id, "parent cycle cut");
                parent[start] = None;
                break;
            }
            steps += 1;
            if steps > pages.len() {
                break;
            }
            cursor = parent[p];
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); pages.len()];
    let mut roots = Vec::new();
    for (idx, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(idx),
            None => roots.push(idx),
        }
    }

    fn node(idx: usize, pages: &[&PageSummary], children: &[Vec<usize>]) -> NavNode {
        let page = pages[idx];
        let mut kids: Vec<NavNode> = children[idx]
            .iter()
            .map(|&c| node(c, pages, children))
            .collect();
        kids.sort_by(|a, b| a.title.cmp(&b.title));
        NavNode {
            page_id: page.page_id.clone(),
            url: page.url.clone(),
            title: page.title.clone(),
            parent_url: page.parent_url.clone(),
            children: kids,
        }
    }

    roots
        .into_iter()
        .map(|idx| node(idx, &pages, &children))
        .collect()
}

/// Parent, siblings and children of `page_id`, resolved by `parent_url`.
///
/// Siblings are the pages sharing the page's `parent_url`, even when the
/// parent page itself is absent; the page is never its own sibling or child.
/// A page without `parent_url` has no parent and no siblings. Siblings and
/// children are ordered by title.
pub fn navigation_for(pages: &[PageSummary], page_id: &str) -> Option<PageNavigation> {
    let current = pages.iter().find(|p| p.page_id == page_id)?;
    let parent_url = current.parent_url.as_deref().filter(|u| !u.is_empty());

    let linked_to = |url: &str| -> Vec<NavRef> {
        sorted_refs(
            pages
                .iter()
                .filter(|p| p.page_id != page_id && p.parent_url.as_deref() == Some(url)),
        )
    };

    let parent = parent_url
        .and_then(|url| pages.iter().find(|p| p.url == url))
        .map(summary_ref);
    let siblings = parent_url.map(linked_to).unwrap_or_default();
    let children = if current.url.is_empty() {
        Vec::new()
    } else {
        linked_to(&current.url)
    };

    Some(PageNavigation {
        current: summary_ref(current),
        parent,
        siblings,
        children,
    })
}

fn summary_ref(page: &PageSummary) -> NavRef {
    NavRef {
        page_id: page.page_id.clone(),
        url: page.url.clone(),
        title: page.title.clone(),
    }
}

/// Refs ordered by title, one per page id.
fn sorted_refs<'a>(pages: impl Iterator<Item = &'a PageSummary>) -> Vec<NavRef> {
    let mut seen = BTreeSet::new();
    let mut refs: Vec<NavRef> = pages
        .filter(|p| seen.insert(p.page_id.as_str()))
        .map(summary_ref)
        .collect();
    refs.sort_by(|a, b| a.title.cmp(&b.title));
    refs
}

/// CLI entry point for `cview tree`.
pub async fn run_tree(
    config: &Config,
    expand: &[String],
    expand_all: bool,
    current: Option<&str>,
) -> Result<()> {
    let source = fetcher::source_from_config(&config.source)?;
    let mut tree = NavTree::from_fetch(source.navigation_tree().await);

    if expand_all {
        tree.expand_all();
    }
    for id in expand {
        tree.expand(id);
    }
    if let Some(id) = current {
        if !tree.expand_path_to(id) {
            warn!(page_id = %id, "current page is not in the navigation tree");
        }
    }

    for line in tree.render(current) {
        println!("{}", line);
    }
    Ok(())
}
