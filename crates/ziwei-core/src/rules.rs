//! Palace relationship rules.
//!
//! Two pieces of fixed domain logic:
//!
//! - **Three parties and four areas** (三方四正): for a palace, the palace
//!   itself, the palace opposite it (six steps away), and the two palaces
//!   four steps away in each direction.
//! - **Stem transformations** (四化): each heavenly stem turns four named
//!   stars into Fortune (禄), Power (权), Status (科), and Adversity (忌).
//!
//! # Index arithmetic
//!
//! All arithmetic is modulo the number of palaces and uses Euclidean
//! remainder, so any `i64` target (negative or past the end) lands on a
//! valid palace:
//!
//! ```rust
//! use ziwei_core::rules::triad_indices;
//!
//! let t = triad_indices(12, -1).unwrap();
//! assert_eq!((t.core, t.opposite, t.triad1, t.triad2), (11, 5, 3, 7));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::chart::ChartPosition;
use crate::error::{CoreError, Result};

const OPPOSITE_OFFSET: usize = 6;
const TRIAD_OFFSET: usize = 4;

/// Resolved palace indices of a triad, each in `[0, count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriadIndices {
    pub core: usize,
    pub opposite: usize,
    pub triad1: usize,
    pub triad2: usize,
}

/// Borrowed view of the four linked palaces.
#[derive(Debug, Clone, Copy)]
pub struct Triad<'a> {
    /// The target palace itself (本宫).
    pub core: &'a ChartPosition,
    pub opposite: &'a ChartPosition,
    pub triad1: &'a ChartPosition,
    pub triad2: &'a ChartPosition,
    pub indices: TriadIndices,
}

/// Compute triad indices for a chart of `count` palaces.
///
/// The offsets are fixed for twelve-palace charts (opposite = +6, triads =
/// +4 / +8) and applied modulo `count`; only `count == 0` is rejected.
pub fn triad_indices(count: usize, target: i64) -> Result<TriadIndices> {
    if count == 0 {
        return Err(CoreError::InvalidInput(
            "palace sequence is empty".to_string(),
        ));
    }

    let core = target.rem_euclid(count as i64) as usize;
    Ok(TriadIndices {
        core,
        opposite: (core + OPPOSITE_OFFSET) % count,
        triad1: (core + TRIAD_OFFSET) % count,
        triad2: (core + 2 * TRIAD_OFFSET) % count,
    })
}

/// Resolve the three-parties-four-areas of `target` within `positions`.
///
/// Returns references into `positions`; never fails for a non-empty slice.
pub fn resolve_triad(positions: &[ChartPosition], target: i64) -> Result<Triad<'_>> {
    let indices = triad_indices(positions.len(), target)?;
    Ok(Triad {
        core: &positions[indices.core],
        opposite: &positions[indices.opposite],
        triad1: &positions[indices.triad1],
        triad2: &positions[indices.triad2],
        indices,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Stem transformations
// ═══════════════════════════════════════════════════════════════════════

/// The ten heavenly stems, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stem {
    Jia,
    Yi,
    Bing,
    Ding,
    Wu,
    Ji,
    Geng,
    Xin,
    Ren,
    Gui,
}

impl Stem {
    pub const ALL: [Stem; 10] = [
        Stem::Jia,
        Stem::Yi,
        Stem::Bing,
        Stem::Ding,
        Stem::Wu,
        Stem::Ji,
        Stem::Geng,
        Stem::Xin,
        Stem::Ren,
        Stem::Gui,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Stem::Jia => "甲",
            Stem::Yi => "乙",
            Stem::Bing => "丙",
            Stem::Ding => "丁",
            Stem::Wu => "戊",
            Stem::Ji => "己",
            Stem::Geng => "庚",
            Stem::Xin => "辛",
            Stem::Ren => "壬",
            Stem::Gui => "癸",
        }
    }

    /// The four transformations this stem triggers, in kind order.
    pub fn transformations(self) -> [Transformation; 4] {
        let stars = &TRANSFORMATION_TABLE[self as usize];
        TransformationKind::ALL.map(|kind| Transformation {
            star: stars[kind as usize],
            kind,
        })
    }
}

impl FromStr for Stem {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Stem::ALL
            .into_iter()
            .find(|stem| stem.symbol() == trimmed)
            .ok_or_else(|| CoreError::UnknownStem(s.to_string()))
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The four transformation categories, in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformationKind {
    /// 化禄
    Fortune,
    /// 化权
    Power,
    /// 化科
    Status,
    /// 化忌
    Adversity,
}

impl TransformationKind {
    pub const ALL: [TransformationKind; 4] = [
        TransformationKind::Fortune,
        TransformationKind::Power,
        TransformationKind::Status,
        TransformationKind::Adversity,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            TransformationKind::Fortune => "禄",
            TransformationKind::Power => "权",
            TransformationKind::Status => "科",
            TransformationKind::Adversity => "忌",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransformationKind::Fortune => "Fortune",
            TransformationKind::Power => "Power",
            TransformationKind::Status => "Status",
            TransformationKind::Adversity => "Adversity",
        }
    }
}

/// One (star, kind) pair of a stem's transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformation {
    pub star: &'static str,
    pub kind: TransformationKind,
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.star, self.kind.symbol())
    }
}

/// Rows follow [`Stem::ALL`]; columns follow [`TransformationKind::ALL`].
const TRANSFORMATION_TABLE: [[&str; 4]; 10] = [
    ["廉贞", "破军", "武曲", "太阳"],
    ["天机", "天梁", "紫微", "太阴"],
    ["天同", "天机", "文昌", "廉贞"],
    ["太阴", "天同", "天机", "巨门"],
    ["贪狼", "太阴", "右弼", "天机"],
    ["武曲", "贪狼", "天梁", "文曲"],
    ["太阳", "武曲", "太阴", "天同"],
    ["巨门", "太阳", "文曲", "文昌"],
    ["天梁", "紫微", "左辅", "武曲"],
    ["破军", "巨门", "太阴", "贪狼"],
];

/// Look up the four transformations triggered by `stem`.
///
/// Fails with [`CoreError::UnknownStem`] for anything but the ten canonical
/// symbols; the caller decides whether that is fatal.
pub fn transformations_for(stem: &str) -> Result<[Transformation; 4]> {
    Ok(stem.parse::<Stem>()?.transformations())
}

/// Render transformations as `廉贞→禄, 破军→权, 武曲→科, 太阳→忌`.
pub fn describe_transformations(transformations: &[Transformation]) -> String {
    transformations
        .iter()
        .map(Transformation::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn palaces(count: usize) -> Vec<ChartPosition> {
        (0..count)
            .map(|i| ChartPosition {
                index: i,
                name: format!("palace-{}", i),
                heavenly_stem: "甲".to_string(),
                earthly_branch: String::new(),
                major_stars: Vec::new(),
                minor_stars: Vec::new(),
                adjective_stars: Vec::new(),
                decadal: None,
                extra: Map::new(),
            })
            .collect()
    }

    #[test]
    fn test_triad_of_life_palace() {
        let chart = palaces(12);
        let triad = resolve_triad(&chart, 0).unwrap();
        assert_eq!(triad.core.name, "palace-0");
        assert_eq!(triad.opposite.name, "palace-6");
        assert_eq!(triad.triad1.name, "palace-4");
        assert_eq!(triad.triad2.name, "palace-8");
    }

    #[test]
    fn test_triad_wraps_around() {
        let t = triad_indices(12, 10).unwrap();
        assert_eq!((t.core, t.opposite, t.triad1, t.triad2), (10, 4, 2, 6));
    }

    #[test]
    fn test_indices_in_range_and_distinct() {
        for target in -40i64..40 {
            let t = triad_indices(12, target).unwrap();
            let all = [t.core, t.opposite, t.triad1, t.triad2];
            assert!(all.iter().all(|&i| i < 12), "target {}", target);
            for a in 0..4 {
                for b in (a + 1)..4 {
                    assert_ne!(all[a], all[b], "target {}", target);
                }
            }
        }
    }

    #[test]
    fn test_periodicity() {
        for target in 0i64..12 {
            let base = triad_indices(12, target).unwrap();
            for k in [-3i64, -1, 1, 2, 1000] {
                assert_eq!(triad_indices(12, target + 12 * k).unwrap(), base);
            }
        }
    }

    #[test]
    fn test_extreme_targets() {
        assert!(triad_indices(12, i64::MIN).is_ok());
        assert!(triad_indices(12, i64::MAX).is_ok());
    }

    #[test]
    fn test_empty_positions_rejected() {
        let err = resolve_triad(&[], 3).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_non_standard_count_does_not_fail() {
        let chart = palaces(5);
        let triad = resolve_triad(&chart, 7).unwrap();
        assert_eq!(triad.indices.core, 2);
        assert_eq!(triad.indices.opposite, 3);
        assert_eq!(triad.indices.triad1, 1);
        assert_eq!(triad.indices.triad2, 0);
    }

    #[test]
    fn test_every_stem_has_four_ordered_transformations() {
        for stem in Stem::ALL {
            let pairs = transformations_for(stem.symbol()).unwrap();
            let kinds: Vec<_> = pairs.iter().map(|t| t.kind).collect();
            assert_eq!(kinds, TransformationKind::ALL.to_vec());
        }
    }

    #[test]
    fn test_known_rows() {
        let jia = transformations_for("甲").unwrap();
        assert_eq!(describe_transformations(&jia), "廉贞→禄, 破军→权, 武曲→科, 太阳→忌");

        let gui = transformations_for("癸").unwrap();
        assert_eq!(gui[0].star, "破军");
        assert_eq!(gui[3].star, "贪狼");
        assert_eq!(gui[3].kind, TransformationKind::Adversity);
    }

    #[test]
    fn test_unknown_stem() {
        for bad in ["", "子", "甲乙", "jia", "X"] {
            match transformations_for(bad) {
                Err(CoreError::UnknownStem(s)) => assert_eq!(s, bad),
                other => panic!("expected UnknownStem for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_stem_display_roundtrip() {
        for stem in Stem::ALL {
            assert_eq!(stem.to_string().parse::<Stem>().unwrap(), stem);
        }
    }
}
