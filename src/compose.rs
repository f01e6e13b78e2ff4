//! Content composition: group a page's blocks into ordered sections.
//!
//! Blocks arrive flat, each tagged with a `section_path`. The same path may
//! reappear after blocks of other sections, so grouping is by key rather than
//! by contiguous run:
//!
//! ```text
//! input   (A,1) (B,2) (A,3)
//! output  A: [1, 3]
//!         B: [2]
//! ```
//!
//! Sections are ordered by the first appearance of their key; inside a
//! section blocks keep reading (`source_order`) order.

use std::collections::HashMap;

use crate::models::{ContentBlock, TableBlock, TextBlock};

/// Joins the labels of a section path into a key.
pub const SECTION_SEPARATOR: &str = " / ";

/// Key for blocks without a section path.
pub const DEFAULT_SECTION: &str = "(no section)";

/// Caption shown for a table without one.
pub const DEFAULT_TABLE_CAPTION: &str = "Table";

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub key: String,
    pub blocks: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposedDocument {
    pub sections: Vec<Section>,
}

/// Display key for a section path. Blank labels are dropped; an empty
/// result maps to [`DEFAULT_SECTION`].
pub fn section_key(path: &[String]) -> String {
    let labels: Vec<&str> = path
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if labels.is_empty() {
        DEFAULT_SECTION.to_string()
    } else {
        labels.join(SECTION_SEPARATOR)
    }
}

/// Group blocks into sections.
///
/// Blocks are first put in `source_order` (stable, so equal orders keep
/// their input order), then appended to the section of their key, creating
/// sections in first-seen order.
pub fn compose(blocks: impl IntoIterator<Item = ContentBlock>) -> ComposedDocument {
    let mut blocks: Vec<ContentBlock> = blocks.into_iter().collect();
    blocks.sort_by_key(ContentBlock::source_order);

    let mut sections: Vec<Section> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for block in blocks {
        let key = section_key(block.section_path());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            sections.push(Section {
                key,
                blocks: Vec::new(),
            });
            sections.len() - 1
        });
        sections[slot].blocks.push(block);
    }

    ComposedDocument { sections }
}

impl ComposedDocument {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.key == key)
    }

    /// All blocks, section by section.
    pub fn blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.sections.iter().flat_map(|s| s.blocks.iter())
    }

    pub fn block_count(&self) -> usize {
        self.sections.iter().map(|s| s.blocks.len()).sum()
    }

    pub fn text_count(&self) -> usize {
        self.blocks()
            .filter(|b| matches!(b, ContentBlock::Text(_)))
            .count()
    }

    pub fn table_count(&self) -> usize {
        self.blocks()
            .filter(|b| matches!(b, ContentBlock::Table(_)))
            .count()
    }

    /// Section headings followed by their rendered blocks.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for section in &self.sections {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("== {} ==", section.key));
            for block in &section.blocks {
                lines.push(String::new());
                lines.extend(render_block(block));
            }
        }
        lines
    }
}

pub fn render_block(block: &ContentBlock) -> Vec<String> {
    match block {
        ContentBlock::Text(text) => render_text(text),
        ContentBlock::Table(table) => render_table(table),
    }
}

fn render_text(block: &TextBlock) -> Vec<String> {
    block.text.lines().map(str::to_string).collect()
}

/// Caption, then an aligned header and body. Missing columns or rows
/// simply produce no header or no body.
pub fn render_table(table: &TableBlock) -> Vec<String> {
    let caption = table
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_TABLE_CAPTION);
    let mut lines = vec![format!("[{}]", caption)];

    let width_count = table
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(table.columns.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0usize; width_count];
    for row in std::iter::once(&table.columns).chain(table.rows.iter()) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    if !table.columns.is_empty() {
        lines.push(format_row(&table.columns));
        let rule: Vec<String> = widths[..table.columns.len()]
            .iter()
            .map(|w| "-".repeat(*w))
            .collect();
        lines.push(format!("|-{}-|", rule.join("-|-")));
    }
    for row in &table.rows {
        if !row.is_empty() {
            lines.push(format_row(row));
        }
    }
    lines
}
