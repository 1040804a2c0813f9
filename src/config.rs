//! Report configuration loaded from an optional TOML file.

use crate::classify::Category;
use crate::data::DEFAULT_CUTOFF_YEAR;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SOURCE_URL: &str =
    "https://d396qusza40orc.cloudfront.net/repdata%2Fdata%2FStormData.csv.bz2";

const MIN_CUTOFF_YEAR: i32 = 1950;
const MAX_CUTOFF_YEAR: i32 = 2100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_cutoff_year")]
    pub cutoff_year: i32,
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
    #[serde(default = "default_download_timeout_seconds")]
    pub download_timeout_seconds: u64,
    /// Category labels called out individually in the narrative.
    #[serde(default = "default_highlight_categories")]
    pub highlight_categories: Vec<String>,
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/StormData.csv.bz2")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("report")
}

fn default_cutoff_year() -> i32 {
    DEFAULT_CUTOFF_YEAR
}

fn default_chart_width() -> u32 {
    1200
}

fn default_chart_height() -> u32 {
    700
}

fn default_download_timeout_seconds() -> u64 {
    600
}

fn default_highlight_categories() -> Vec<String> {
    vec![
        Category::Tornado.label().to_string(),
        Category::Heat.label().to_string(),
    ]
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            data_path: default_data_path(),
            output_dir: default_output_dir(),
            cutoff_year: default_cutoff_year(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
            download_timeout_seconds: default_download_timeout_seconds(),
            highlight_categories: default_highlight_categories(),
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ReportConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CUTOFF_YEAR..=MAX_CUTOFF_YEAR).contains(&self.cutoff_year) {
            return Err(ConfigError::Invalid(format!(
                "cutoff_year {} outside {MIN_CUTOFF_YEAR}..={MAX_CUTOFF_YEAR}",
                self.cutoff_year
            )));
        }
        if self.chart_width == 0 || self.chart_height == 0 {
            return Err(ConfigError::Invalid(
                "chart dimensions must be non-zero".to_string(),
            ));
        }
        if self.source_url.trim().is_empty() {
            return Err(ConfigError::Invalid("source_url is empty".to_string()));
        }
        if let Some(label) = self
            .highlight_categories
            .iter()
            .find(|label| Category::from_label(label).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "unknown highlight category {label:?}"
            )));
        }
        Ok(())
    }

    /// Highlighted categories, in configured order.
    pub fn highlights(&self) -> Vec<Category> {
        self.highlight_categories
            .iter()
            .filter_map(|label| Category::from_label(label))
            .collect()
    }
}
