use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::{PromotionCriteria, Term};

pub const DEFAULT_CONFIG_PATH: &str = "school-scoring.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolConfig {
    pub name: String,
    /// 1, 2 or 3.
    pub current_term: i16,
    pub current_year: String,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            name: "Hillside Academy".to_string(),
            current_term: 1,
            current_year: "2025/2026".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub school: SchoolConfig,
    /// Fallback when the record store has no criteria of its own.
    pub promotion: PromotionCriteria,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(raw).context("failed to parse config")?;
        config.current_term()?;
        Ok(config)
    }

    /// Reads `path`, or returns defaults when the file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn current_term(&self) -> anyhow::Result<Term> {
        Term::try_from(self.school.current_term)
    }
}
