//! Analysis configuration.

use crate::types::Currency;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Tunable constants for a single analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reporting currency code
    pub base_currency: String,
    /// Raw ledger currency labels mapped to currency codes
    pub currency_aliases: BTreeMap<String, String>,
    /// Foreign-to-base multiplier used when no rate can be resolved
    pub default_fx_rate: f64,
    /// Scalar rates per currency code, used when no history is available
    pub spot_rates: BTreeMap<String, f64>,
    /// Days of padding around the ledger span when requesting FX history
    pub fx_buffer_days: i64,
    /// Exposure below this level contributes a zero daily return
    pub exposure_noise_floor: f64,
    pub trading_days_per_year: f64,
    /// Reported in place of an infinite profit factor
    pub profit_factor_sentinel: f64,
    /// Length of the ranked opportunity views and P/L highlight lists
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let currency_aliases = [("שקל", "ILS"), ("דולר", "USD"), ("$", "USD")]
            .into_iter()
            .map(|(label, code)| (label.to_string(), code.to_string()))
            .collect();

        Self {
            base_currency: "ILS".to_string(),
            currency_aliases,
            default_fx_rate: 3.7,
            spot_rates: BTreeMap::new(),
            fx_buffer_days: 5,
            exposure_noise_floor: 100.0,
            trading_days_per_year: 252.0,
            profit_factor_sentinel: 999.0,
            top_n: 5,
        }
    }
}

impl AnalysisConfig {
    /// Get the default config file path.
    ///
    /// Default path: `~/.chenfuel/config.toml`
    /// Can be overridden with `CHENFUEL_CONFIG_FILE` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("CHENFUEL_CONFIG_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".chenfuel/config.toml"))
            .unwrap_or_else(|| PathBuf::from("chenfuel.toml"))
    }

    /// Load config from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load config from a specific path. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config.with_uppercase_codes())
    }

    /// Uppercase every currency code so lookups agree on case.
    pub fn with_uppercase_codes(mut self) -> Self {
        self.base_currency = self.base_currency.trim().to_uppercase();
        for code in self.currency_aliases.values_mut() {
            *code = code.trim().to_uppercase();
        }
        self.spot_rates = self
            .spot_rates
            .into_iter()
            .map(|(code, rate)| (code.trim().to_uppercase(), rate))
            .collect();
        self
    }

    /// Classify a raw ledger currency label.
    pub fn resolve_currency(&self, label: &str) -> Currency {
        let trimmed = label.trim();
        let code = self
            .currency_aliases
            .get(trimmed)
            .map_or(trimmed, String::as_str)
            .trim()
            .to_uppercase();

        if code.eq_ignore_ascii_case(self.base_currency.trim()) {
            Currency::Base
        } else {
            Currency::Foreign(code)
        }
    }

    /// Configured spot rate for a currency code, in any case.
    pub fn spot_rate(&self, code: &str) -> Option<f64> {
        self.spot_rates.get(code).copied().or_else(|| {
            self.spot_rates
                .iter()
                .find(|(key, _)| key.trim().eq_ignore_ascii_case(code))
                .map(|(_, rate)| *rate)
        })
    }
}
