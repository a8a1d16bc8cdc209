//! Oracle selection: the prompt sent to the LLM and the tolerant parsing of
//! whatever comes back.
//!
//! The oracle is asked for a JSON array of node ids but is not trusted to
//! produce one. Parsing is a tagged two-stage strategy:
//!
//! 1. **Structured** — parse the reply as JSON and take the id list from the
//!    first of `node_ids`, `ids`, `nodes` that holds an array, or the reply
//!    itself when it is a bare array.
//! 2. **Pattern** — scan the raw text for quoted four-digit tokens such as
//!    `"0007"`.
//!
//! If neither stage finds anything the selection is [`Selection::Empty`],
//! which callers treat as a normal "nothing relevant" outcome.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Object fields accepted as the id list, in priority order.
pub const ID_FIELDS: [&str; 3] = ["node_ids", "ids", "nodes"];

/// Ids the oracle picked, tagged with the stage that recovered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Structured(Vec<String>),
    Pattern(Vec<String>),
    Empty,
}

impl Selection {
    pub fn ids(&self) -> &[String] {
        match self {
            Selection::Structured(ids) | Selection::Pattern(ids) => ids,
            Selection::Empty => &[],
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Selection::Structured(_) => "structured",
            Selection::Pattern(_) => "pattern",
            Selection::Empty => "empty",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// Build the directive prompt asking the oracle to pick relevant nodes.
pub fn selection_prompt(toc: &str, query: &str) -> String {
    format!(
        "You are a retrieval assistant. Below is the table of contents of a reference \
document; every line shows a node id in brackets, its title, and a short summary.\n\
\n\
Table of contents:\n\
{toc}\n\
User query: \"{query}\"\n\
\n\
Pick the node ids whose content best answers the query. Select at most 3-5 nodes. \
Return ONLY a JSON array of the four-digit ids exactly as they appear in the brackets, \
e.g. [\"0001\", \"0005\"]. If a JSON object is required, use {{\"node_ids\": [...]}}.\n"
    )
}

/// Stage one: structured JSON parsing.
///
/// Returns `None` when the reply is not JSON or carries no recognised id
/// list. Non-string array elements are skipped.
pub fn parse_structured(raw: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let list = match &value {
        Value::Array(items) => items,
        Value::Object(map) => ID_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_array))?,
        _ => return None,
    };
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([0-9]{4})""#).expect("static id pattern compiles"))
}

/// Stage two: pull quoted four-digit ids out of free text, in order.
pub fn extract_pattern(raw: &str) -> Vec<String> {
    id_pattern()
        .captures_iter(raw)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Run both stages and tag the result.
pub fn parse_selection(raw: &str) -> Selection {
    if let Some(ids) = parse_structured(raw) {
        if !ids.is_empty() {
            return Selection::Structured(ids);
        }
    }

    let ids = extract_pattern(raw);
    if ids.is_empty() {
        Selection::Empty
    } else {
        Selection::Pattern(ids)
    }
}
