//! # Engine Configuration
//!
//! Configuration management for the pricing and discount engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     CLUBHOUSE_LOOKBACK_MONTHS=12                                        │
//! │     CLUBHOUSE_PRICE_CACHE=off                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/booking/engine.toml (Linux)                               │
//! │     ~/Library/Application Support/ch.clubhouse.booking/engine.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     6 month lookback, price cache on, built-in rule table               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [scheduler]
//! safety_factor = 10
//!
//! [pricing]
//! cache_enabled = true
//!
//! [discounts]
//! lookback_months = 6
//! history_ttl_secs = 0   # 0 = history cached for one pass only
//! retroactive = true
//!
//! [[rules]]              # optional, replaces the built-in table
//! id = "course-3rd-plus-child"
//! product_family = "course"
//! condition = "3rd_plus_child"
//! rate_percent = 30.0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clubhouse_core::validation::{clamp_lookback_months, validate_safety_factor};
use clubhouse_core::{DiscountRule, DEFAULT_LOOKBACK_MONTHS, SCAN_SAFETY_FACTOR};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::ports::ConfiguredRuleTable;

// =============================================================================
// Scheduler Settings
// =============================================================================

/// Session scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Bounds the day scan at `occurrences needed * safety_factor` days.
    #[serde(default = "default_safety_factor")]
    pub safety_factor: u32,
}

fn default_safety_factor() -> u32 {
    SCAN_SAFETY_FACTOR
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            safety_factor: default_safety_factor(),
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

/// Pricing engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Keep computed prices per (canonical id, day).
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
        }
    }
}

// =============================================================================
// Discount Settings
// =============================================================================

/// Discount engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountSettings {
    /// Retroactive lookback window in months. Clamped to [1, 24] on use.
    #[serde(default = "default_lookback_months")]
    pub lookback_months: i64,

    /// Lifetime of cached history lookups across passes. 0 keeps them for
    /// a single pass only.
    #[serde(default)]
    pub history_ttl_secs: u64,

    /// Whether retroactive mode may query the order history at all.
    #[serde(default = "default_true")]
    pub retroactive: bool,
}

fn default_lookback_months() -> i64 {
    DEFAULT_LOOKBACK_MONTHS as i64
}

fn default_true() -> bool {
    true
}

impl Default for DiscountSettings {
    fn default() -> Self {
        Self {
            lookback_months: default_lookback_months(),
            history_ttl_secs: 0,
            retroactive: true,
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub discounts: DiscountSettings,

    /// Discount rule table. Empty means the built-in defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<DiscountRule>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Bad discount rates are not an error here: the rule table deactivates
    /// those rules and logs them.
    pub fn validate(&self) -> EngineResult<()> {
        validate_safety_factor(self.scheduler.safety_factor)?;

        if self.rules.iter().any(|r| r.id.trim().is_empty()) {
            return Err(EngineError::InvalidConfig(
                "every discount rule needs an id".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(months) = lookup("CLUBHOUSE_LOOKBACK_MONTHS") {
            match months.trim().parse::<i64>() {
                Ok(m) => {
                    debug!(months = m, "Overriding lookback window from environment");
                    self.discounts.lookback_months = m;
                }
                Err(_) => warn!(value = %months, "Ignoring non-numeric CLUBHOUSE_LOOKBACK_MONTHS"),
            }
        }

        if let Some(flag) = lookup("CLUBHOUSE_PRICE_CACHE") {
            match parse_flag(&flag) {
                Some(enabled) => self.pricing.cache_enabled = enabled,
                None => warn!(value = %flag, "Unknown CLUBHOUSE_PRICE_CACHE value"),
            }
        }

        if let Some(flag) = lookup("CLUBHOUSE_RETROACTIVE") {
            match parse_flag(&flag) {
                Some(enabled) => self.discounts.retroactive = enabled,
                None => warn!(value = %flag, "Unknown CLUBHOUSE_RETROACTIVE value"),
            }
        }

        if let Some(factor) = lookup("CLUBHOUSE_SAFETY_FACTOR") {
            if let Ok(f) = factor.trim().parse::<u32>() {
                debug!(factor = f, "Overriding scan safety factor from environment");
                self.scheduler.safety_factor = f;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("ch", "clubhouse", "booking")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Lookback window forced into its permitted range.
    pub fn lookback_months(&self) -> u32 {
        clamp_lookback_months(self.discounts.lookback_months)
    }

    /// History cache lifetime across passes, `None` for per-pass caching.
    pub fn history_ttl(&self) -> Option<Duration> {
        match self.discounts.history_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Builds the rule table: configured rules, or the built-in defaults.
    pub fn rule_table(&self) -> ConfiguredRuleTable {
        if self.rules.is_empty() {
            ConfiguredRuleTable::defaults()
        } else {
            ConfiguredRuleTable::new(self.rules.clone())
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
