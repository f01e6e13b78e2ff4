//! Wire records consumed from the content and retrieval services.
//!
//! Every type here is an immutable snapshot. Optional and collection fields
//! decode to their empty value when absent *or* `null`, so a sparse record is
//! never a decode error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Decode `null` the same way as an absent field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Display text of a loosely typed JSON scalar; `null` is empty.
fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// A list of labels where any entry may be `null`, a number, or an object
/// carrying `title`, `name` or `text`.
fn lenient_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|value| match value {
            Value::Object(mut map) => ["title", "name", "text"]
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                })
                .unwrap_or_default(),
            other => cell_text(other),
        })
        .collect())
}

/// Table rows where a row or a cell may be `null` or a non-string scalar.
fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Option<Vec<Option<Vec<Value>>>> = Option::deserialize(deserializer)?;
    Ok(rows
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.unwrap_or_default().into_iter().map(cell_text).collect())
        .collect())
}

// ============ Pages ============

/// One row of the page index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_chars_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
}

impl PageSummary {
    /// Title, or the url when the title is blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// `fetched_at` parsed as RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]` (UTC).
    pub fn fetched_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.fetched_at.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

/// `GET /pages` answers either with a bare array or with `{items: [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageList {
    Bare(Vec<PageSummary>),
    Wrapped {
        #[serde(default, deserialize_with = "null_default")]
        items: Vec<PageSummary>,
    },
}

impl PageList {
    pub fn into_items(self) -> Vec<PageSummary> {
        match self {
            PageList::Bare(items) | PageList::Wrapped { items } => items,
        }
    }
}

// ============ Content blocks ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub chunk_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub source_order: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub section_path: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    pub table_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub source_order: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub section_path: Vec<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "lenient_labels")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub rows: Vec<Vec<String>>,
}

/// A unit of page content, discriminated by the `kind` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentBlock {
    Text(TextBlock),
    Table(TableBlock),
}

impl ContentBlock {
    pub fn source_order(&self) -> i64 {
        match self {
            ContentBlock::Text(b) => b.source_order,
            ContentBlock::Table(b) => b.source_order,
        }
    }

    pub fn section_path(&self) -> &[String] {
        match self {
            ContentBlock::Text(b) => &b.section_path,
            ContentBlock::Table(b) => &b.section_path,
        }
    }

    /// `chunk_id` or `table_id`.
    pub fn id(&self) -> &str {
        match self {
            ContentBlock::Text(b) => &b.chunk_id,
            ContentBlock::Table(b) => &b.table_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
    /// Trail of ancestor titles ending at this page.
    #[serde(default, deserialize_with = "lenient_labels", skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<String>,
}

/// All content of one page, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBundle {
    pub page: PageMeta,
    #[serde(default, deserialize_with = "null_default")]
    pub blocks: Vec<ContentBlock>,
}

// ============ Navigation ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavNode {
    pub page_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub children: Vec<NavNode>,
}

impl NavNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// `GET /navigation/tree` body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NavTreeResponse {
    #[serde(default, deserialize_with = "null_default")]
    pub tree: Vec<NavNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavRef {
    pub page_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
}

impl NavRef {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Parent, siblings and children of one page. `siblings` never contains
/// `current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNavigation {
    pub current: NavRef,
    #[serde(default)]
    pub parent: Option<NavRef>,
    #[serde(default, deserialize_with = "null_default")]
    pub siblings: Vec<NavRef>,
    #[serde(default, deserialize_with = "null_default")]
    pub children: Vec<NavRef>,
}

// ============ Retrieval ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub page_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub section_path: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub text_preview: String,
    #[serde(default, deserialize_with = "null_default")]
    pub score: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_default")]
    pub hits: Vec<SearchHit>,
    /// Server-side time in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSource {
    pub chunk_id: String,
    pub page_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub section_path: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_default")]
    pub score: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RagAnswer {
    #[serde(default, deserialize_with = "null_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sources: Vec<RagSource>,
    /// Model-side failure reported alongside a fallback answer.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    #[serde(default, deserialize_with = "null_default")]
    pub status: String,
}

/// Title of a retrieval result, falling back to its url.
pub fn title_or_url<'a>(title: Option<&'a str>, url: &'a str) -> &'a str {
    match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => url,
    }
}
