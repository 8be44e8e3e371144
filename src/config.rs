use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub collection: CollectionConfig,
    pub cleaning: CleaningConfig,
}

/// Search grid and pacing for the provider clients.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    pub search_terms: Vec<String>,
    pub search_locations: Vec<String>,
    /// Directory where collected batch files are written and loaded from
    pub batch_dir: String,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    /// Pause between (term, location) searches to stay under provider rate limits
    pub search_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleaningConfig {
    /// Sources removed wholesale by the finalizer (exact match)
    pub excluded_sources: Vec<String>,
    /// Spread used when a source has no record with both salary bounds
    pub default_spread: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            excluded_sources: vec!["Muse".to_string()],
            default_spread: 10_000.0,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}
