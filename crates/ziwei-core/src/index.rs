//! Load-once hierarchical document index.
//!
//! The reference corpus is a pre-built tree of sections. Each node carries a
//! title, an optional short summary, optional retrievable body text, and
//! child nodes. The index is parsed once, flattened, and never mutated.
//!
//! # Layout
//!
//! At construction the tree is flattened into a `Vec<IndexEntry>` in
//! depth-first pre-order using an explicit stack, and a `node_id → position`
//! map is built. That gives:
//!
//! - O(1) lookup by id ([`DocumentIndex::get`]),
//! - a table of contents rendered by a single linear pass,
//! - no recursion over arbitrarily deep corpora.
//!
//! # Upstream JSON
//!
//! ```json
//! {
//!   "doc_name": "ziwei.pdf",
//!   "structure": [
//!     { "node_id": "0001", "title": "总论", "summary": "…",
//!       "nodes": [ { "node_id": "0002", "title": "紫微", "prefix_summary": "…", "text": "…" } ] }
//!   ]
//! }
//! ```
//!
//! `summary` wins over `prefix_summary`; an empty string counts as absent.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;

/// Marker appended to a summary cut short in the table of contents.
pub const ELLIPSIS: &str = "...";

/// Default summary length (in characters) in the table of contents.
pub const DEFAULT_SUMMARY_CHARS: usize = 100;

/// A node of the corpus tree, as supplied to [`DocumentIndex::new`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawNode")]
pub struct IndexNode {
    pub node_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body_text: Option<String>,
    pub children: Vec<IndexNode>,
}

impl IndexNode {
    pub fn new(node_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            title: title.into(),
            summary: None,
            body_text: None,
            children: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_text = Some(body.into());
        self
    }

    pub fn with_children(mut self, children: Vec<IndexNode>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Deserialize)]
struct RawNode {
    node_id: String,
    #[serde(default)]
    title: String,
    summary: Option<String>,
    prefix_summary: Option<String>,
    text: Option<String>,
    nodes: Option<Vec<IndexNode>>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl From<RawNode> for IndexNode {
    fn from(raw: RawNode) -> Self {
        Self {
            node_id: raw.node_id,
            title: raw.title,
            summary: non_empty(raw.summary).or_else(|| non_empty(raw.prefix_summary)),
            body_text: non_empty(raw.text),
            children: raw.nodes.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(default)]
    doc_name: String,
    #[serde(default)]
    structure: Vec<IndexNode>,
}

/// A flattened index node.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub node_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body_text: Option<String>,
    /// Zero for top-level nodes.
    pub depth: usize,
    /// Positions of the direct children, in corpus order.
    pub children: Vec<usize>,
}

/// Outcome of resolving oracle-selected ids against the index.
#[derive(Debug)]
pub struct Resolution<'a> {
    /// Entries that exist and carry body text, in request order.
    pub hits: Vec<&'a IndexEntry>,
    /// Ids that were unknown or named a node without body text.
    pub dropped: usize,
}

/// Immutable hierarchical index over the reference corpus.
#[derive(Debug)]
pub struct DocumentIndex {
    document_name: String,
    entries: Vec<IndexEntry>,
    roots: Vec<usize>,
    by_id: HashMap<String, usize>,
    shadowed: Vec<String>,
}

impl DocumentIndex {
    /// Flatten `roots` into an index.
    pub fn new(document_name: impl Into<String>, roots: Vec<IndexNode>) -> Self {
        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut top: Vec<usize> = Vec::with_capacity(roots.len());
        let mut by_id = HashMap::new();
        let mut shadowed = Vec::new();

        let mut stack: Vec<(IndexNode, usize, Option<usize>)> =
            roots.into_iter().rev().map(|n| (n, 0, None)).collect();

        while let Some((node, depth, parent)) = stack.pop() {
            let pos = entries.len();
            let IndexNode {
                node_id,
                title,
                summary,
                body_text,
                children,
            } = node;

            // First occurrence in depth-first order wins.
            if by_id.contains_key(&node_id) {
                shadowed.push(node_id.clone());
            } else {
                by_id.insert(node_id.clone(), pos);
            }

            entries.push(IndexEntry {
                node_id,
                title,
                summary,
                body_text,
                depth,
                children: Vec::with_capacity(children.len()),
            });

            match parent {
                Some(p) => entries[p].children.push(pos),
                None => top.push(pos),
            }

            stack.extend(children.into_iter().rev().map(|c| (c, depth + 1, Some(pos))));
        }

        Self {
            document_name: document_name.into(),
            entries,
            roots: top,
            by_id,
            shadowed,
        }
    }

    /// Parse the upstream JSON index (`doc_name` / `structure`).
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawIndex = serde_json::from_str(json)?;
        Ok(Self::new(raw.doc_name, raw.structure))
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in depth-first pre-order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn roots(&self) -> impl Iterator<Item = &IndexEntry> {
        self.roots.iter().map(|&i| &self.entries[i])
    }

    pub fn children<'a>(&'a self, entry: &'a IndexEntry) -> impl Iterator<Item = &'a IndexEntry> {
        entry.children.iter().map(|&i| &self.entries[i])
    }

    /// Exact-match lookup by node id.
    pub fn get(&self, node_id: &str) -> Option<&IndexEntry> {
        self.by_id.get(node_id).map(|&i| &self.entries[i])
    }

    /// Ids that appeared more than once; lookups resolve to the first.
    pub fn shadowed_ids(&self) -> &[String] {
        &self.shadowed
    }

    /// Render the table of contents shown to the oracle.
    ///
    /// One line per node: `{indent}- [{node_id}] {title}: {summary}` with two
    /// spaces of indent per depth level. Nodes without a summary keep their
    /// line with an empty summary field.
    pub fn table_of_contents(&self, summary_chars: usize) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let summary = entry
                .summary
                .as_deref()
                .map(|s| truncate_summary(s, summary_chars))
                .unwrap_or(Cow::Borrowed(""));
            for _ in 0..entry.depth {
                out.push_str("  ");
            }
            out.push_str("- [");
            out.push_str(&entry.node_id);
            out.push_str("] ");
            out.push_str(&entry.title);
            out.push_str(": ");
            out.push_str(&summary);
            out.push('\n');
        }
        out
    }

    /// Resolve ids to entries carrying body text, keeping request order.
    ///
    /// Unknown ids and ids of nodes without text are dropped silently and
    /// only counted; duplicates are kept as given.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Resolution<'_> {
        let mut hits = Vec::with_capacity(ids.len());
        let mut dropped = 0;
        for id in ids {
            match self.get(id.as_ref()) {
                Some(entry) if entry.body_text.is_some() => hits.push(entry),
                _ => dropped += 1,
            }
        }
        Resolution { hits, dropped }
    }
}

/// Cut `summary` to at most `max_chars` characters, appending [`ELLIPSIS`]
/// when anything was removed. Counts chars, not bytes.
pub fn truncate_summary(summary: &str, max_chars: usize) -> Cow<'_, str> {
    match summary.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &summary[..cut], ELLIPSIS)),
        None => Cow::Borrowed(summary),
    }
}

/// Join entries as `### {title}\n{body}` blocks separated by a blank line.
pub fn render_excerpts(hits: &[&IndexEntry]) -> String {
    hits.iter()
        .filter_map(|entry| {
            entry
                .body_text
                .as_deref()
                .map(|body| format!("### {}\n{}", entry.title, body))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentIndex {
        DocumentIndex::new(
            "sample",
            vec![
                IndexNode::new("0001", "总论")
                    .with_summary("Overview")
                    .with_children(vec![
                        IndexNode::new("0002", "紫微")
                            .with_summary("Emperor star")
                            .with_body("Alpha"),
                        IndexNode::new("0003", "天机").with_children(vec![IndexNode::new(
                            "0004", "天机入命",
                        )
                        .with_body("Gamma")]),
                    ]),
                IndexNode::new("0005", "附录").with_body("Omega"),
            ],
        )
    }

    #[test]
    fn test_flatten_preorder() {
        let index = sample();
        let order: Vec<_> = index.entries().iter().map(|e| e.node_id.as_str()).collect();
        assert_eq!(order, ["0001", "0002", "0003", "0004", "0005"]);
        let depths: Vec<_> = index.entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths, [0, 1, 1, 2, 0]);

        let roots: Vec<_> = index.roots().map(|e| e.node_id.as_str()).collect();
        assert_eq!(roots, ["0001", "0005"]);

        let first = index.get("0001").unwrap();
        let kids: Vec<_> = index.children(first).map(|e| e.node_id.as_str()).collect();
        assert_eq!(kids, ["0002", "0003"]);
    }

    #[test]
    fn test_table_of_contents() {
        let toc = sample().table_of_contents(DEFAULT_SUMMARY_CHARS);
        let expected = [
            "- [0001] 总论: Overview\n",
            "  - [0002] 紫微: Emperor star\n",
            "  - [0003] 天机: \n",
            "    - [0004] 天机入命: \n",
            "- [0005] 附录: \n",
        ]
        .concat();
        assert_eq!(toc, expected);
    }

    #[test]
    fn test_truncate_150_chars() {
        let summary = "x".repeat(150);
        let out = truncate_summary(&summary, 100);
        assert_eq!(out, format!("{}...", "x".repeat(100)));
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let summary = "命".repeat(120);
        let out = truncate_summary(&summary, 100);
        assert_eq!(out.chars().count(), 103);
        assert!(out.ends_with(ELLIPSIS));

        let exact = "命".repeat(100);
        assert_eq!(truncate_summary(&exact, 100), exact.as_str());
    }

    #[test]
    fn test_from_json_collapses_summary() {
        let json = r#"{
            "doc_name": "ziwei.pdf",
            "structure": [
                {"node_id": "0001", "title": "A", "summary": "primary", "prefix_summary": "fallback",
                 "nodes": [
                    {"node_id": "0002", "title": "B", "prefix_summary": "fallback only", "text": "body"},
                    {"node_id": "0003", "title": "C", "summary": "", "prefix_summary": "used", "nodes": null}
                 ]}
            ]
        }"#;
        let index = DocumentIndex::from_json(json).unwrap();
        assert_eq!(index.document_name(), "ziwei.pdf");
        assert_eq!(index.get("0001").unwrap().summary.as_deref(), Some("primary"));
        assert_eq!(index.get("0002").unwrap().summary.as_deref(), Some("fallback only"));
        assert_eq!(index.get("0003").unwrap().summary.as_deref(), Some("used"));
        assert_eq!(index.get("0002").unwrap().body_text.as_deref(), Some("body"));
        assert!(index.get("0001").unwrap().body_text.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(DocumentIndex::from_json("not json").is_err());
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let index = DocumentIndex::new(
            "dup",
            vec![
                IndexNode::new("0001", "first").with_body("one"),
                IndexNode::new("0001", "second").with_body("two"),
            ],
        );
        assert_eq!(index.get("0001").unwrap().title, "first");
        assert_eq!(index.shadowed_ids(), ["0001".to_string()]);
    }

    #[test]
    fn test_resolve_keeps_order_and_counts_drops() {
        let index = sample();
        let res = index.resolve(&["0005", "9999", "0001", "0002", "0005"]);
        let ids: Vec<_> = res.hits.iter().map(|e| e.node_id.as_str()).collect();
        assert_eq!(ids, ["0005", "0002", "0005"]);
        assert_eq!(res.dropped, 2);
    }

    #[test]
    fn test_render_excerpts() {
        let index = sample();
        let res = index.resolve(&["0004", "0002"]);
        assert_eq!(render_excerpts(&res.hits), "### 天机入命\nGamma\n\n### 紫微\nAlpha");
        assert_eq!(render_excerpts(&[]), "");
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let mut node = IndexNode::new("leaf", "leaf").with_body("deep");
        for i in 0..5_000 {
            node = IndexNode::new(format!("n{}", i), "level").with_children(vec![node]);
        }
        let index = DocumentIndex::new("deep", vec![node]);
        assert_eq!(index.len(), 5_001);
        assert_eq!(index.get("leaf").unwrap().depth, 5_000);
        assert!(index.table_of_contents(10).lines().count() == 5_001);
    }
}
