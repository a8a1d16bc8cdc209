//! # `zw` — ziwei-context CLI
//!
//! ## Usage
//!
//! ```bash
//! zw --config ./config/zw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `zw toc` | Print the document index as a table of contents |
//! | `zw search "<query>"` | Retrieve grounding excerpts for a query |
//! | `zw triad --chart c.json <index>` | Print the three parties and four areas of a palace |
//! | `zw mutagens <stem>` | Print the four transformations of a heavenly stem |
//! | `zw chart --chart c.json` | Print a text summary of a chart |
//! | `zw chart --chart c.json --report` | Build (or narrate) the whole-chart report prompt |
//! | `zw palace --chart c.json <index>` | Build (or narrate) the reading prompt of a palace |
//!
//! Logs go to stderr and follow `RUST_LOG` (default `zw=info,ziwei_context=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ziwei_context::palace::{self, Language};
use ziwei_context::{config, retrieval, rules_cmd};

/// ziwei-context CLI — palace relationships and oracle-guided retrieval for
/// Zi Wei Dou Shu chart narration.
#[derive(Parser)]
#[command(
    name = "zw",
    about = "ziwei-context — palace relationships and oracle-guided retrieval for Zi Wei Dou Shu charts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Only `toc`, `search`, `palace`, and `chart --report` read it.
    #[arg(long, global = true, default_value = "./config/zw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the document index as the table of contents shown to the oracle.
    Toc,

    /// Retrieve grounding excerpts for a query.
    ///
    /// Prints `No results.` when nothing relevant was found or the oracle is
    /// unavailable; retrieval failures never make this command fail.
    Search {
        query: String,

        /// Print the oracle's selection and dropped-id count to stderr.
        #[arg(long)]
        explain: bool,
    },

    /// Print the three parties and four areas (三方四正) of a palace.
    Triad {
        /// Chart JSON produced by the chart engine.
        #[arg(long)]
        chart: PathBuf,

        /// Palace index; any integer, taken modulo the palace count.
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },

    /// Print the four transformations (四化) triggered by a heavenly stem.
    Mutagens { stem: String },

    /// Print a text summary of every palace in a chart.
    Chart {
        #[arg(long)]
        chart: PathBuf,

        /// Build the whole-chart report prompt, with retrieved grounding.
        #[arg(long)]
        report: bool,

        #[arg(long, value_enum, default_value_t = Language::Zh)]
        lang: Language,

        /// With `--report`, send the prompt to the oracle and print the report.
        #[arg(long)]
        narrate: bool,
    },

    /// Build the reading prompt for one palace, with retrieved grounding.
    Palace {
        #[arg(long)]
        chart: PathBuf,

        #[arg(allow_hyphen_values = true)]
        index: i64,

        /// Whole-chart background to include in the prompt.
        #[arg(long)]
        context: Option<String>,

        #[arg(long, value_enum, default_value_t = Language::Zh)]
        lang: Language,

        /// Send the prompt to the oracle and print the report instead.
        #[arg(long)]
        narrate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zw=info,ziwei_context=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Triad { chart, index } => return rules_cmd::run_triad(chart, *index),
        Commands::Mutagens { stem } => return rules_cmd::run_mutagens(stem),
        Commands::Chart {
            chart,
            report: false,
            ..
        } => return palace::run_chart(chart),
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Toc => {
            retrieval::run_toc(&cfg)?;
        }
        Commands::Search { query, explain } => {
            retrieval::run_search(&cfg, &query, explain).await?;
        }
        Commands::Palace {
            chart,
            index,
            context,
            lang,
            narrate,
        } => {
            palace::run_palace(&cfg, &chart, index, context, lang, narrate).await?;
        }
        Commands::Chart {
            chart,
            lang,
            narrate,
            ..
        } => {
            palace::run_chart_report(&cfg, &chart, lang, narrate).await?;
        }
        Commands::Triad { .. } | Commands::Mutagens { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
