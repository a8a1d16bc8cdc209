//! # ziwei-context
//!
//! Grounding and palace-relationship context for Zi Wei Dou Shu chart
//! narration.
//!
//! Given a chart produced by an external astrology engine, this crate decides
//! *what reference text is relevant* to a palace and *how palaces relate to
//! each other*, and assembles both into a prompt for a narration model.
//!
//! ## Architecture
//!
//! ```text
//!  chart JSON ──▶ ┌──────────────────┐      ┌──────────────────────┐
//!                 │ rules (core)     │      │ RetrievalEngine      │
//!                 │ triad + 四化     │      │ ToC ─▶ oracle ─▶ ids │
//!                 └────────┬─────────┘      │ ids ─▶ index ─▶ text │
//!                          │                └──────────┬───────────┘
//!                          ▼                           ▼
//!                      ┌──────────────────────────────────┐
//!                      │ PalaceBriefing ─▶ narration prompt│
//!                      └──────────────────────────────────┘
//! ```
//!
//! Pure logic (chart model, rules, index, selection parsing) lives in the
//! `ziwei-core` crate; this crate adds configuration, the HTTP oracle, the
//! async engine, and the `zw` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`oracle`] | Chat-completion oracle trait and OpenAI-compatible client |
//! | [`retrieval`] | Two-round oracle-guided retrieval |
//! | [`palace`] | Palace briefing and narration prompt |
//! | [`rules_cmd`] | `zw triad` / `zw mutagens` output |

pub mod config;
pub mod oracle;
pub mod palace;
pub mod retrieval;
pub mod rules_cmd;
