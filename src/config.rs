use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calendar::{default_holidays, HolidayDefinition};

/// Years accepted for the sync range.
const YEAR_MIN: i32 = 1900;
const YEAR_MAX: i32 = 2100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Immich API endpoint, e.g. `https://immich.example.com/api`.
    /// A bare server URL gets `/api` appended.
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default = "default_holidays")]
    pub holidays: Vec<HolidayDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Assets requested per search page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent one.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for the backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    #[serde(default = "default_end_year")]
    pub end_year: i32,

    /// Days searched before each holiday, unless overridden per holiday.
    #[serde(default = "default_padding_days")]
    pub padding_before_days: u32,

    /// Days searched after each holiday, unless overridden per holiday.
    #[serde(default = "default_padding_days")]
    pub padding_after_days: u32,
}

fn default_start_year() -> i32 {
    2007
}

fn default_end_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

fn default_padding_days() -> u32 {
    7
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
            padding_before_days: default_padding_days(),
            padding_after_days: default_padding_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            sync: SyncConfig::default(),
            holidays: default_holidays(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("holifest")
            .join("config.toml")
    }

    /// Checks everything a run depends on: endpoint present, year range
    /// sane, every holiday rule able to produce a date.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("base_url is not configured; set it in the config file");
        }
        if self.sync.start_year > self.sync.end_year {
            bail!(
                "start_year {} is after end_year {}",
                self.sync.start_year,
                self.sync.end_year
            );
        }
        for year in [self.sync.start_year, self.sync.end_year] {
            if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
                bail!("year {year} is outside the supported range {YEAR_MIN}-{YEAR_MAX}");
            }
        }
        if self.holidays.is_empty() {
            bail!("no holidays configured");
        }
        for holiday in &self.holidays {
            holiday.validate()?;
        }
        Ok(())
    }
}
