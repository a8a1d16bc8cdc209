//! `zw triad` and `zw mutagens`: print palace relationships and stem
//! transformations. Neither command needs a config file.

use anyhow::Result;
use std::path::Path;
use ziwei_core::rules::{resolve_triad, transformations_for};

use crate::palace::{format_major_stars, load_chart};

/// Print the three-parties-four-areas of palace `index`.
pub fn run_triad(chart_path: &Path, index: i64) -> Result<()> {
    let chart = load_chart(chart_path)?;
    let triad = resolve_triad(&chart.palaces, index)?;

    let rows = [
        ("core", triad.indices.core, triad.core),
        ("opposite", triad.indices.opposite, triad.opposite),
        ("triad1", triad.indices.triad1, triad.triad1),
        ("triad2", triad.indices.triad2, triad.triad2),
    ];
    for (role, idx, palace) in rows {
        let stars = format_major_stars(&palace.major_stars);
        println!(
            "{:<9} [{:>2}] {} ({}): {}",
            role,
            idx,
            palace.name,
            palace.heavenly_stem,
            if stars.is_empty() { "-" } else { stars.as_str() }
        );
    }
    Ok(())
}

/// Print the four transformations of `stem`, one per line.
pub fn run_mutagens(stem: &str) -> Result<()> {
    for t in transformations_for(stem)? {
        println!("{}\t{}\t{}", t.kind.symbol(), t.kind.label(), t.star);
    }
    Ok(())
}
