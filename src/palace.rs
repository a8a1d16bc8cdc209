//! Palace and chart briefings: everything the narration model needs.
//!
//! A palace briefing merges three sources:
//!
//! - the palace's own stars,
//! - its three-parties-four-areas and stem transformations
//!   ([`ziwei_core::rules`]),
//! - grounding excerpts from the [`RetrievalEngine`].
//!
//! A chart briefing covers all twelve palaces at once: the
//! [`chart_summary`] plus grounding retrieved for the whole chart.
//!
//! Both implement [`Briefing`]. [`narrate`] sends the prompt to the
//! [`Oracle`] in free-text mode and falls back to the briefing's placeholder
//! report when the oracle cannot answer.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use ziwei_core::chart::{Chart, ChartPosition, Star};
use ziwei_core::rules::{describe_transformations, resolve_triad, transformations_for, Triad};
use ziwei_core::CoreError;

use crate::config::Config;
use crate::oracle::{Oracle, OracleRequest};
use crate::retrieval::RetrievalEngine;

/// Placeholder used when a palace stem is not one of the ten canonical ones.
pub const UNKNOWN_STEM: &str = "Unknown Stem";

/// Output language of the narrated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl Language {
    fn instruction(self) -> &'static str {
        match self {
            Language::Zh => "Write the whole report in Simplified Chinese.",
            Language::En => {
                "Write the whole report in English. Translate Zi Wei terms but keep the \
                 Chinese term in brackets, e.g. 'Life Palace (命宫)'."
            }
        }
    }
}

/// A prompt ready for narration, with a fallback report for when no
/// oracle answers.
pub trait Briefing: Send + Sync {
    fn prompt(&self) -> String;

    fn placeholder_report(&self) -> String;
}

/// `紫微(庙,禄)、天机(旺)` — brightness and birth-year transformation.
pub fn format_major_stars(stars: &[Star]) -> String {
    stars
        .iter()
        .map(|s| {
            let brightness = s.brightness().unwrap_or("");
            match s.mutagen() {
                Some(m) => format!("{}({},{})", s.name, brightness, m),
                None => format!("{}({})", s.name, brightness),
            }
        })
        .collect::<Vec<_>>()
        .join("、")
}

/// `文昌(得)、火星(-)` — brightness or `-`.
pub fn format_minor_stars(stars: &[Star]) -> String {
    stars
        .iter()
        .map(|s| format!("{}({})", s.name, s.brightness().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("、")
}

/// Names only.
pub fn format_adjective_stars(stars: &[Star]) -> String {
    stars
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join("、")
}

fn or_none(s: &str) -> &str {
    if s.is_empty() {
        "无"
    } else {
        s
    }
}

/// Query handed to the retrieval engine for one palace.
pub fn retrieval_query(palace: &ChartPosition) -> String {
    format!(
        "紫微斗数 {} {} {}",
        palace.name,
        format_major_stars(&palace.major_stars),
        format_minor_stars(&palace.minor_stars)
    )
}

fn decade_range(palace: &ChartPosition) -> Option<(u32, u32)> {
    palace.decadal.as_ref().and_then(|d| d.range)
}

/// Plain-text rendering of every palace, for whole-chart prompts.
pub fn chart_summary(chart: &Chart) -> String {
    let mut out = String::new();
    if let Some(class) = &chart.five_elements_class {
        out.push_str(&format!("五行局：{}\n\n", class));
    }
    for p in &chart.palaces {
        out.push_str(&format!(
            "### {} ({}宫)\n- 主星：{}\n- 辅星：{}\n- 杂曜：{}\n",
            p.name,
            p.earthly_branch,
            or_none(&format_major_stars(&p.major_stars)),
            or_none(&format_minor_stars(&p.minor_stars)),
            or_none(&format_adjective_stars(&p.adjective_stars)),
        ));
        if let Some((from, to)) = decade_range(p) {
            out.push_str(&format!("- 十年大限：{}-{}\n", from, to));
        }
        out.push('\n');
    }
    out
}

/// One linked palace in a briefing.
#[derive(Debug, Clone)]
pub struct LinkedPalace {
    pub role: &'static str,
    pub name: String,
    pub major_stars: String,
}

impl LinkedPalace {
    fn new(role: &'static str, palace: &ChartPosition) -> Self {
        Self {
            role,
            name: palace.name.clone(),
            major_stars: format_major_stars(&palace.major_stars),
        }
    }
}

/// Everything known about one palace, ready to be rendered as a prompt.
#[derive(Debug, Clone)]
pub struct PalaceBriefing {
    pub palace_name: String,
    pub major_stars: String,
    pub minor_stars: String,
    pub adjective_stars: String,
    pub decade: Option<(u32, u32)>,
    /// Core, opposite, and the two triad palaces, in that order.
    pub linked: [LinkedPalace; 4],
    pub stem: String,
    /// `廉贞→禄, …`, or [`UNKNOWN_STEM`].
    pub transformations: String,
    pub grounding: String,
    pub context: Option<String>,
    pub language: Language,
}

impl PalaceBriefing {
    /// Assemble a briefing for palace `index` of `chart`.
    ///
    /// An empty chart is an error. An unknown stem is not: it is logged and
    /// rendered as [`UNKNOWN_STEM`].
    pub fn build(
        chart: &Chart,
        index: i64,
        grounding: String,
        context: Option<String>,
        language: Language,
    ) -> Result<Self, CoreError> {
        let triad = resolve_triad(&chart.palaces, index)?;
        Ok(Self::from_triad(&triad, grounding, context, language))
    }

    /// Assemble a briefing from an already resolved triad.
    pub fn from_triad(
        triad: &Triad<'_>,
        grounding: String,
        context: Option<String>,
        language: Language,
    ) -> Self {
        let core = triad.core;

        let transformations = match transformations_for(&core.heavenly_stem) {
            Ok(pairs) => describe_transformations(&pairs),
            Err(e) => {
                warn!(palace = %core.name, error = %e, "cannot derive stem transformations");
                UNKNOWN_STEM.to_string()
            }
        };

        Self {
            palace_name: core.name.clone(),
            major_stars: format_major_stars(&core.major_stars),
            minor_stars: format_minor_stars(&core.minor_stars),
            adjective_stars: format_adjective_stars(&core.adjective_stars),
            decade: decade_range(core),
            linked: [
                LinkedPalace::new("本宫", triad.core),
                LinkedPalace::new("对宫", triad.opposite),
                LinkedPalace::new("三方", triad.triad1),
                LinkedPalace::new("三方", triad.triad2),
            ],
            stem: core.heavenly_stem.clone(),
            transformations,
            grounding,
            context,
            language,
        }
    }
}

impl Briefing for PalaceBriefing {
    /// Render the narration prompt.
    fn prompt(&self) -> String {
        let mut out = format!(
            "You are a Zi Wei Dou Shu (紫微斗数) master. Give an in-depth reading of the **{}** palace.\n\n",
            self.palace_name
        );

        out.push_str(&format!(
            "## 1. The palace (本宫)\n\
             - Major stars (主星): {}\n\
             - Minor stars (辅星): {}\n\
             - Other stars (杂曜): {}\n",
            or_none(&self.major_stars),
            or_none(&self.minor_stars),
            or_none(&self.adjective_stars),
        ));
        if let Some((from, to)) = self.decade {
            out.push_str(&format!("- Decade (大限): {}-{}\n", from, to));
        }

        out.push_str("\n## 2. Three parties and four areas (三方四正)\n");
        for linked in &self.linked {
            let stars = if linked.major_stars.is_empty() {
                "no major stars"
            } else {
                linked.major_stars.as_str()
            };
            out.push_str(&format!("- {} {}: {}\n", linked.role, linked.name, stars));
        }
        out.push_str(&format!(
            "- Palace stem (宫干): {}\n\
             - Stem transformations (四化): {}\n\
             Check whether the transformed stars appear among the three parties.\n",
            self.stem, self.transformations
        ));

        out.push_str("\n## 3. Classical sources (古籍)\n");
        if self.grounding.is_empty() {
            out.push_str("No classical excerpts were found.\n");
        } else {
            out.push_str(&format!("{}\n", self.grounding));
        }

        out.push_str(&format!(
            "\n## 4. Whole-chart background\n{}\n",
            self.context.as_deref().unwrap_or("No background provided.")
        ));

        out.push_str(&format!(
            "\n## Instructions\n\
             1. Judge the palace's foundation from the brightness of its major stars.\n\
             2. Read the opposite palace as outside influence and the triad palaces as resources; \
             say whether they support or clash with this palace.\n\
             3. Trace the transformations (禄 权 科 忌) and where they land.\n\
             4. Quote the classical excerpts where they apply and explain them in modern terms.\n\
             5. Use Markdown. {}\n",
            self.language.instruction()
        ));
        out
    }

    fn placeholder_report(&self) -> String {
        format!(
            "(Placeholder report for {})\n\nThe stars {} indicate... \
             (Add a valid API key for a real reading)",
            self.palace_name,
            or_none(&self.major_stars)
        )
    }
}

/// All twelve palaces plus grounding, for a whole-chart report.
#[derive(Debug, Clone)]
pub struct ChartBriefing {
    pub summary: String,
    pub grounding: String,
    pub language: Language,
}

impl ChartBriefing {
    pub fn new(chart: &Chart, grounding: String, language: Language) -> Self {
        Self {
            summary: chart_summary(chart),
            grounding,
            language,
        }
    }
}

impl Briefing for ChartBriefing {
    fn prompt(&self) -> String {
        let grounding = if self.grounding.is_empty() {
            "No classical excerpts were found."
        } else {
            self.grounding.as_str()
        };
        format!(
            "You are a Zi Wei Dou Shu (紫微斗数) expert. Based on the chart data and classical \
context below, write a detailed, personalised report covering ALL 12 palaces.\n\
\n\
## Chart data\n\
{summary}\
## Classical sources (古籍)\n\
{grounding}\n\
\n\
## Report structure\n\
### 1. Core analysis\n\
Give an in-depth reading of these palaces, explaining how the major stars, their brightness \
and the transformations interact:\n\
- **Life Palace (命宫)**: personality, overall destiny, core strengths and weaknesses.\n\
- **Career Palace (官禄)**: career path, suitable industries, working style.\n\
- **Wealth Palace (财帛)**: financial potential, money habits, sources of wealth.\n\
- **Spouse Palace (夫妻)**: relationship patterns, ideal partner, likely challenges.\n\
### 2. Full chart overview\n\
Briefly read the remaining eight palaces, pointing out notable stars or patterns.\n\
### 3. Summary and advice\n\
Close with a synthesis and concrete advice.\n\
\n\
Keep the tone mystical yet accessible and encouraging. Use Markdown headers and bullet points. \
{instruction}\n",
            summary = self.summary,
            instruction = self.language.instruction(),
        )
    }

    fn placeholder_report(&self) -> String {
        "(Placeholder report)\n\n## Core personality\nYou are a complex individual with... \
         (Add a valid API key for a real reading)"
            .to_string()
    }
}

/// Retrieve grounding for palace `index` and build its briefing.
pub async fn prepare_briefing(
    engine: &RetrievalEngine,
    chart: &Chart,
    index: i64,
    context: Option<String>,
    language: Language,
) -> Result<PalaceBriefing> {
    let triad = resolve_triad(&chart.palaces, index)?;
    let query = retrieval_query(triad.core);
    info!(query = %query, "fetching grounding for palace");
    let grounding = engine.search(&query).await;
    Ok(PalaceBriefing::from_triad(
        &triad, grounding, context, language,
    ))
}

/// Retrieve grounding for the whole chart and build its briefing.
///
/// The serialized chart is the retrieval query.
pub async fn prepare_chart_briefing(
    engine: &RetrievalEngine,
    chart: &Chart,
    language: Language,
) -> Result<ChartBriefing> {
    let query = serde_json::to_string(chart).context("Failed to serialize chart")?;
    info!(palaces = chart.palaces.len(), "fetching grounding for chart");
    let grounding = engine.search(&query).await;
    Ok(ChartBriefing::new(chart, grounding, language))
}

/// Send a briefing to the oracle as a free-text narration request.
///
/// Narration never fails: when the oracle is disabled, unreachable, or
/// returns nothing, the briefing's placeholder report is returned instead.
pub async fn narrate(oracle: &dyn Oracle, briefing: &dyn Briefing) -> String {
    match oracle.complete(&OracleRequest::text(briefing.prompt())).await {
        Ok(report) => report,
        Err(e) => {
            warn!(
                model = oracle.model_name(),
                error = %e,
                "narration unavailable, returning placeholder report"
            );
            briefing.placeholder_report()
        }
    }
}

/// Read a chart JSON file produced by the chart engine.
pub fn load_chart(path: &Path) -> Result<Chart> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chart file: {}", path.display()))?;
    Chart::from_json(&content)
        .with_context(|| format!("Failed to parse chart file: {}", path.display()))
}

/// CLI entry point for `zw chart` without `--report`.
pub fn run_chart(chart_path: &Path) -> Result<()> {
    let chart = load_chart(chart_path)?;
    print!("{}", chart_summary(&chart));
    Ok(())
}

/// CLI entry point for `zw chart --report`.
///
/// Prints the whole-chart report prompt, or with `narrate` the report.
pub async fn run_chart_report(
    config: &Config,
    chart_path: &Path,
    language: Language,
    narrate_report: bool,
) -> Result<()> {
    let chart = load_chart(chart_path)?;
    let engine = RetrievalEngine::from_config(config)?;
    let briefing = prepare_chart_briefing(&engine, &chart, language).await?;
    emit(&engine, &briefing, narrate_report).await;
    Ok(())
}

/// CLI entry point for `zw palace`.
///
/// Prints the narration prompt, or with `narrate` the report produced by the
/// configured oracle.
pub async fn run_palace(
    config: &Config,
    chart_path: &Path,
    index: i64,
    context: Option<String>,
    language: Language,
    narrate_report: bool,
) -> Result<()> {
    let chart = load_chart(chart_path)?;
    let engine = RetrievalEngine::from_config(config)?;
    let briefing = prepare_briefing(&engine, &chart, index, context, language).await?;
    emit(&engine, &briefing, narrate_report).await;
    Ok(())
}

async fn emit(engine: &RetrievalEngine, briefing: &dyn Briefing, narrate_report: bool) {
    if narrate_report {
        println!("{}", narrate(engine.oracle(), briefing).await);
    } else {
        print!("{}", briefing.prompt());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart() -> Chart {
        let stems = ["丙", "丁", "戊", "己", "庚", "辛", "壬", "癸", "甲", "乙", "?", "丁"];
        let palaces: Vec<_> = (0..12)
            .map(|i| {
                json!({
                    "index": i,
                    "name": format!("宫{}", i),
                    "heavenlyStem": stems[i],
                    "earthlyBranch": "寅",
                    "majorStars": if i == 0 {
                        json!([{"name": "紫微", "brightness": "庙", "mutagen": "科"}, {"name": "天府", "brightness": "旺"}])
                    } else {
                        json!([])
                    },
                    "minorStars": [{"name": "文昌", "brightness": ""}],
                    "adjectiveStars": [{"name": "天姚"}, {"name": "红鸾"}],
                    "decadal": {"range": [4 + 10 * i, 13 + 10 * i]}
                })
            })
            .collect();
        serde_json::from_value(json!({"palaces": palaces, "fiveElementsClass": "水二局"})).unwrap()
    }

    #[test]
    fn test_star_formatting() {
        let c = chart();
        assert_eq!(format_major_stars(&c.palaces[0].major_stars), "紫微(庙,科)、天府(旺)");
        assert_eq!(format_minor_stars(&c.palaces[0].minor_stars), "文昌(-)");
        assert_eq!(format_adjective_stars(&c.palaces[0].adjective_stars), "天姚、红鸾");
    }

    #[test]
    fn test_retrieval_query() {
        let c = chart();
        assert_eq!(retrieval_query(&c.palaces[0]), "紫微斗数 宫0 紫微(庙,科)、天府(旺) 文昌(-)");
    }

    #[test]
    fn test_briefing_links_and_transformations() {
        let c = chart();
        let b = PalaceBriefing::build(&c, 12, "### 紫微\nAlpha".into(), None, Language::Zh).unwrap();
        assert_eq!(b.palace_name, "宫0");
        let names: Vec<_> = b.linked.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["宫0", "宫6", "宫4", "宫8"]);
        assert_eq!(b.stem, "丙");
        assert_eq!(b.transformations, "天同→禄, 天机→权, 文昌→科, 廉贞→忌");
        assert_eq!(b.decade, Some((4, 13)));

        let prompt = b.prompt();
        assert!(prompt.contains("**宫0**"));
        assert!(prompt.contains("天同→禄, 天机→权, 文昌→科, 廉贞→忌"));
        assert!(prompt.contains("### 紫微\nAlpha"));
        assert!(prompt.contains("对宫 宫6: no major stars"));
        assert!(prompt.contains("Simplified Chinese"));
    }

    #[test]
    fn test_unknown_stem_degrades() {
        let c = chart();
        let b = PalaceBriefing::build(&c, -2, String::new(), Some("bg".into()), Language::En)
            .unwrap();
        assert_eq!(b.palace_name, "宫10");
        assert_eq!(b.transformations, UNKNOWN_STEM);
        let prompt = b.prompt();
        assert!(prompt.contains("No classical excerpts were found."));
        assert!(prompt.contains("bg"));
        assert!(prompt.contains("Life Palace (命宫)"));
    }

    #[test]
    fn test_empty_chart_is_invalid_input() {
        let empty: Chart = serde_json::from_value(json!({"palaces": []})).unwrap();
        let err = PalaceBriefing::build(&empty, 0, String::new(), None, Language::Zh).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_from_triad_matches_build() {
        let c = chart();
        let triad = resolve_triad(&c.palaces, 3).unwrap();
        let from_triad = PalaceBriefing::from_triad(&triad, String::new(), None, Language::Zh);
        let built = PalaceBriefing::build(&c, 3, String::new(), None, Language::Zh).unwrap();
        assert_eq!(from_triad.prompt(), built.prompt());
    }

    #[test]
    fn test_palace_placeholder_report() {
        let b = PalaceBriefing::build(&chart(), 0, String::new(), None, Language::Zh).unwrap();
        let report = b.placeholder_report();
        assert!(report.starts_with("(Placeholder report for 宫0)"));
        assert!(report.contains("紫微(庙,科)、天府(旺)"));
    }

    #[test]
    fn test_chart_briefing_prompt() {
        let b = ChartBriefing::new(&chart(), "### 总论\nIntro".into(), Language::En);
        let prompt = b.prompt();
        assert!(prompt.contains("ALL 12 palaces"));
        assert!(prompt.contains("五行局：水二局"));
        assert_eq!(prompt.matches("### 宫").count(), 12);
        assert!(prompt.contains("### 总论\nIntro"));
        assert!(prompt.contains("### 1. Core analysis"));
        assert!(prompt.contains("### 3. Summary and advice"));
        assert!(prompt.contains("Life Palace (命宫)"));

        let ungrounded = ChartBriefing::new(&chart(), String::new(), Language::Zh);
        assert!(ungrounded.prompt().contains("No classical excerpts were found."));
    }

    #[tokio::test]
    async fn test_narrate_falls_back_without_oracle() {
        let b = PalaceBriefing::build(&chart(), 0, String::new(), None, Language::Zh).unwrap();
        let report = narrate(&crate::oracle::DisabledOracle, &b).await;
        assert_eq!(report, b.placeholder_report());

        let whole = ChartBriefing::new(&chart(), String::new(), Language::Zh);
        let report = narrate(&crate::oracle::DisabledOracle, &whole).await;
        assert!(report.starts_with("(Placeholder report)"));
    }

    #[test]
    fn test_chart_summary() {
        let summary = chart_summary(&chart());
        assert!(summary.starts_with("五行局：水二局\n"));
        assert!(summary.contains("### 宫0 (寅宫)\n- 主星：紫微(庙,科)、天府(旺)"));
        assert!(summary.contains("- 主星：无"));
        assert!(summary.contains("- 十年大限：114-123"));
        assert_eq!(summary.matches("### ").count(), 12);
    }
}
