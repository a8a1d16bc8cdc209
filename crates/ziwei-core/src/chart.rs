//! Chart data model.
//!
//! A chart is produced by an external astrology engine (iztro) and handed to
//! us as JSON. Only the fields the resolver and the prompt builders read are
//! typed; every other field is kept in a passthrough map so a chart
//! round-trips untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of palaces in every chart the engine produces.
pub const PALACE_COUNT: usize = 12;

/// A full chart: twelve palaces plus engine metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub palaces: Vec<ChartPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub five_elements_class: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chart {
    /// Parse a chart from the engine's JSON output.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// One palace of the chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPosition {
    #[serde(default)]
    pub index: usize,
    pub name: String,
    /// Heavenly stem of the palace, one of the ten canonical symbols.
    #[serde(alias = "stem")]
    pub heavenly_stem: String,
    #[serde(default)]
    pub earthly_branch: String,
    #[serde(default)]
    pub major_stars: Vec<Star>,
    #[serde(default)]
    pub minor_stars: Vec<Star>,
    #[serde(default)]
    pub adjective_stars: Vec<Star>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decadal: Option<Decadal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Star {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutagen: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Star {
    /// Brightness, treating the engine's empty string as absent.
    pub fn brightness(&self) -> Option<&str> {
        self.brightness.as_deref().filter(|b| !b.is_empty())
    }

    /// Birth-year transformation carried by the star, if any.
    pub fn mutagen(&self) -> Option<&str> {
        self.mutagen.as_deref().filter(|m| !m.is_empty())
    }
}

/// Ten-year period governed by a palace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decadal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(u32, u32)>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
