//! TOML configuration.
//!
//! ```toml
//! [index]
//! path = "data/ziwei_index.json"
//!
//! [oracle]
//! provider = "openai"
//! base_url = "https://api.deepseek.com"
//! model = "deepseek-chat"
//! api_key_env = "DEEPSEEK_API_KEY"
//! timeout_secs = 30
//! json_mode = true
//!
//! [retrieval]
//! summary_chars = 100
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ask the backend for a JSON object reply. Turn off for backends
    /// without JSON mode; replies are then parsed as free text.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            json_mode: default_json_mode(),
        }
    }
}

impl OracleConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.deepseek.com".to_string()
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_json_mode() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Summary length, in characters, in the table of contents.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            summary_chars: default_summary_chars(),
        }
    }
}

fn default_summary_chars() -> usize {
    ziwei_core::index::DEFAULT_SUMMARY_CHARS
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.summary_chars == 0 {
        anyhow::bail!("retrieval.summary_chars must be > 0");
    }

    if config.oracle.timeout_secs == 0 {
        anyhow::bail!("oracle.timeout_secs must be > 0");
    }

    match config.oracle.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown oracle provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.oracle.is_enabled() {
        if config.oracle.model.trim().is_empty() {
            anyhow::bail!("oracle.model must be specified when provider is 'openai'");
        }
        if !config.oracle.base_url.starts_with("http://")
            && !config.oracle.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "oracle.base_url must be an http(s) URL, got '{}'",
                config.oracle.base_url
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[index]\npath = \"idx.json\"\n").unwrap();
        assert_eq!(config.index.path, PathBuf::from("idx.json"));
        assert!(!config.oracle.is_enabled());
        assert_eq!(config.oracle.timeout(), Duration::from_secs(30));
        assert!(config.oracle.json_mode);
        assert_eq!(config.retrieval.summary_chars, 100);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
[index]
path = "data/ziwei_index.json"

[oracle]
provider = "openai"
base_url = "http://localhost:8000/v1"
model = "qwen"
api_key_env = "LOCAL_KEY"
timeout_secs = 5
json_mode = false

[retrieval]
summary_chars = 40
"#,
        )
        .unwrap();
        assert!(config.oracle.is_enabled());
        assert_eq!(config.oracle.base_url, "http://localhost:8000/v1");
        assert_eq!(config.oracle.api_key_env, "LOCAL_KEY");
        assert!(!config.oracle.json_mode);
        assert_eq!(config.retrieval.summary_chars, 40);
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = "[index]\npath = \"i.json\"\n";
        assert!(parse(&format!("{}[oracle]\ntimeout_secs = 0\n", base)).is_err());
        assert!(parse(&format!("{}[retrieval]\nsummary_chars = 0\n", base)).is_err());
        assert!(parse(&format!("{}[oracle]\nprovider = \"gemini\"\n", base)).is_err());
        assert!(parse(&format!(
            "{}[oracle]\nprovider = \"openai\"\nbase_url = \"api.deepseek.com\"\n",
            base
        ))
        .is_err());
    }

    #[test]
    fn test_missing_index_section() {
        assert!(parse("[oracle]\nprovider = \"disabled\"\n").is_err());
    }
}
