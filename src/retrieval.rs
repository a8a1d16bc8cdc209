//! Two-round retrieval over the document index, using the oracle as a
//! relevance judge instead of embeddings.
//!
//! # Protocol
//!
//! 1. **Summarize** — the index is rendered once, at construction, as a table
//!    of contents: one line per node with its id, title, and a truncated
//!    summary.
//! 2. **Select** — the table of contents and the query go to the oracle,
//!    which is asked for a short JSON list of node ids.
//! 3. **Parse** — structured JSON first, quoted-id pattern second
//!    (see [`ziwei_core::select`]).
//! 4. **Resolve** — ids are looked up exactly; unknown ids and nodes without
//!    body text are dropped and counted.
//! 5. **Assemble** — `### title` + body blocks, in the oracle's order.
//!
//! # Failure policy
//!
//! Retrieval is an enhancement, never a dependency. [`RetrievalEngine::search`]
//! absorbs every oracle failure (disabled, network, HTTP status, timeout) and
//! returns an empty string with a warning. No retries. Callers that want the
//! details use [`RetrievalEngine::search_detailed`].
//!
//! The oracle call is the only suspension point and is bounded by
//! [`RetrievalSettings::timeout`]. Dropping the returned future cancels the
//! in-flight request.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use ziwei_core::index::{render_excerpts, DocumentIndex};
use ziwei_core::select::{parse_selection, selection_prompt, Selection};

use crate::config::Config;
use crate::oracle::{create_oracle, Oracle, OracleError, OracleRequest};

/// Tuning knobs for the engine, decoupled from the TOML config.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Deadline for the oracle call.
    pub timeout: Duration,
    /// Summary length, in characters, in the table of contents.
    pub summary_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            summary_chars: ziwei_core::index::DEFAULT_SUMMARY_CHARS,
        }
    }
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.oracle.timeout(),
            summary_chars: config.retrieval.summary_chars,
        }
    }
}

/// Recoverable retrieval failures. [`RetrievalEngine::search`] never lets
/// these escape.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval unavailable: {0}")]
    Unavailable(#[from] OracleError),

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
}

/// Detailed outcome of one search.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Assembled excerpts; empty when nothing relevant was found.
    pub text: String,
    /// Ids returned by the oracle, in its order.
    pub selected: Vec<String>,
    /// `"structured"`, `"pattern"`, or `"empty"`.
    pub strategy: &'static str,
    /// Selected ids that were unknown or had no body text.
    pub dropped: usize,
}

/// Read and parse the document index from disk.
pub fn load_index(path: &Path) -> Result<DocumentIndex> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document index: {}", path.display()))?;
    let index = DocumentIndex::from_json(&content)
        .with_context(|| format!("Failed to parse document index: {}", path.display()))?;

    if !index.shadowed_ids().is_empty() {
        warn!(
            count = index.shadowed_ids().len(),
            ids = ?index.shadowed_ids(),
            "duplicate node ids in index; first occurrence wins"
        );
    }
    info!(
        document = index.document_name(),
        nodes = index.len(),
        "loaded document index"
    );
    Ok(index)
}

/// Retrieval engine over one immutable index.
///
/// Cheap to clone; clones share the index, the rendered table of contents,
/// and the oracle.
#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<DocumentIndex>,
    toc: Arc<str>,
    oracle: Arc<dyn Oracle>,
    settings: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(
        index: Arc<DocumentIndex>,
        oracle: Arc<dyn Oracle>,
        settings: RetrievalSettings,
    ) -> Self {
        let toc: Arc<str> = index.table_of_contents(settings.summary_chars).into();
        Self {
            index,
            toc,
            oracle,
            settings,
        }
    }

    /// Load the index and oracle named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let index = load_index(&config.index.path)?;
        let oracle = create_oracle(&config.oracle)?;
        Ok(Self::new(
            Arc::new(index),
            oracle,
            RetrievalSettings::from_config(config),
        ))
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn table_of_contents(&self) -> &str {
        &self.toc
    }

    pub fn oracle(&self) -> &dyn Oracle {
        self.oracle.as_ref()
    }

    /// Excerpts relevant to `query`, or `""` when there are none or
    /// retrieval failed.
    pub async fn search(&self, query: &str) -> String {
        match self.search_detailed(query).await {
            Ok(retrieval) => retrieval.text,
            Err(e) => {
                warn!(error = %e, "retrieval failed; continuing without context");
                String::new()
            }
        }
    }

    /// Like [`search`](Self::search) but reports the selection and failures.
    pub async fn search_detailed(&self, query: &str) -> Result<Retrieval, RetrievalError> {
        if query.trim().is_empty() {
            return Ok(Retrieval {
                strategy: Selection::Empty.strategy(),
                ..Retrieval::default()
            });
        }

        let request = OracleRequest::json(selection_prompt(&self.toc, query));
        let raw = tokio::time::timeout(self.settings.timeout, self.oracle.complete(&request))
            .await
            .map_err(|_| RetrievalError::Timeout(self.settings.timeout))??;

        let selection = parse_selection(&raw);
        if selection.is_empty() {
            debug!(reply = %raw, "oracle reply carried no node ids");
        }

        let resolution = self.index.resolve(selection.ids());
        if resolution.dropped > 0 {
            debug!(
                dropped = resolution.dropped,
                "ignored selected ids without retrievable text"
            );
        }
        info!(
            model = self.oracle.model_name(),
            strategy = selection.strategy(),
            selected = ?selection.ids(),
            kept = resolution.hits.len(),
            "retrieval selected nodes"
        );

        Ok(Retrieval {
            text: render_excerpts(&resolution.hits),
            selected: selection.ids().to_vec(),
            strategy: selection.strategy(),
            dropped: resolution.dropped,
        })
    }
}

/// CLI entry point for `zw search`.
pub async fn run_search(config: &Config, query: &str, explain: bool) -> Result<()> {
    let engine = RetrievalEngine::from_config(config)?;

    let text = if explain {
        match engine.search_detailed(query).await {
            Ok(r) => {
                eprintln!(
                    "strategy: {}  selected: {:?}  dropped: {}",
                    r.strategy, r.selected, r.dropped
                );
                r.text
            }
            Err(e) => {
                eprintln!("retrieval failed: {}", e);
                String::new()
            }
        }
    } else {
        engine.search(query).await
    };

    if text.is_empty() {
        println!("No results.");
    } else {
        println!("{}", text);
    }
    Ok(())
}

/// CLI entry point for `zw toc`.
pub fn run_toc(config: &Config) -> Result<()> {
    let index = load_index(&config.index.path)?;
    print!("{}", index.table_of_contents(config.retrieval.summary_chars));
    Ok(())
}
