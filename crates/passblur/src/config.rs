//! Configuration management for passblur.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. The
//! persisted on/off switch and category toggles are also available on their
//! own as [`Settings`], the JSON shape a settings store keeps.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionFilterSet;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name under the platform config dir.
const CONFIG_DIR_NAME: &str = "passblur";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "PASSBLUR_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PASSBLUR_`, `__` between
///    section and key, e.g. `PASSBLUR_GOVERNOR__MAX_MASKED_SPANS`)
/// 2. TOML config file at `~/.config/passblur/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// On/off switch and category toggles.
    pub protection: ProtectionConfig,
    /// Rate limit and span ceiling.
    pub governor: GovernorConfig,
    /// Mutation watcher and value poller.
    pub watcher: WatcherConfig,
    /// Presentation of masked elements.
    pub masking: MaskingConfig,
    /// Reveal-on-hover behavior.
    pub reveal: RevealConfig,
}

/// Protection switch and detection categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Whether masking is active.
    pub enabled: bool,
    /// Per-category toggles. Missing categories are enabled.
    pub filters: DetectionFilterSet,
}

/// Safety governor limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Classification operations allowed within one rolling second.
    pub max_operations_per_second: u32,
    /// Suspension after the rate limit trips, in milliseconds.
    pub overload_cooldown_ms: u64,
    /// Ceiling on live masked text spans.
    pub max_masked_spans: usize,
    /// Suspension after the span ceiling is hit, in milliseconds.
    pub span_limit_cooldown_ms: u64,
}

/// Change watcher and poller timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Poll interval during the initial window, in milliseconds.
    pub fast_interval_ms: u64,
    /// Number of fast polls before switching to the steady interval.
    pub fast_ticks: u32,
    /// Poll interval after the initial window, in milliseconds.
    pub steady_interval_ms: u64,
    /// Maximum number of fields sampled per poll.
    pub max_polled_fields: usize,
    /// Field rescan delays after a click on a button or link, in milliseconds.
    pub click_rescan_delays_ms: Vec<u64>,
}

/// Masked element presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Fields taller than this are treated as containers.
    pub container_max_height: f64,
    /// Fields wider than this are treated as containers.
    pub container_max_width: f64,
    /// Blur radius applied to masked content, in pixels.
    pub blur_radius_px: u32,
    /// How long the copy notification stays visible, in milliseconds.
    pub notification_fade_ms: u64,
    /// Delay between fading and removing the notification, in milliseconds.
    pub notification_remove_ms: u64,
}

/// Reveal controller settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Modifier key that must be held to reveal on hover.
    pub modifier: Modifier,
}

/// Keyboard modifier keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// Alt / Option.
    #[default]
    Alt,
    /// Control.
    Control,
    /// Shift.
    Shift,
    /// Meta / Command.
    Meta,
}

impl Modifier {
    /// Lowercase name of the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alt => "alt",
            Self::Control => "control",
            Self::Shift => "shift",
            Self::Meta => "meta",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modifier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alt" | "option" => Ok(Self::Alt),
            "control" | "ctrl" => Ok(Self::Control),
            "shift" => Ok(Self::Shift),
            "meta" | "command" | "cmd" => Ok(Self::Meta),
            other => Err(format!("unknown modifier: {other}")),
        }
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filters: DetectionFilterSet::all_enabled(),
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_operations_per_second: 500,
            overload_cooldown_ms: 5_000,
            max_masked_spans: 200,
            span_limit_cooldown_ms: 3_000,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 50,
            fast_ticks: 60,
            steady_interval_ms: 1_000,
            max_polled_fields: 100,
            click_rescan_delays_ms: vec![10, 50, 150, 300],
        }
    }
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            container_max_height: 200.0,
            container_max_width: 800.0,
            blur_radius_px: 6,
            notification_fade_ms: 1_500,
            notification_remove_ms: 300,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `PASSBLUR_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let governor = &self.governor;
        if governor.max_operations_per_second == 0 {
            return Err(invalid("max_operations_per_second must be greater than 0"));
        }
        if governor.max_masked_spans == 0 {
            return Err(invalid("max_masked_spans must be greater than 0"));
        }
        if governor.overload_cooldown_ms == 0 || governor.span_limit_cooldown_ms == 0 {
            return Err(invalid("governor cooldowns must be greater than 0"));
        }

        let watcher = &self.watcher;
        if watcher.fast_interval_ms == 0 {
            return Err(invalid("fast_interval_ms must be greater than 0"));
        }
        if watcher.steady_interval_ms == 0 {
            return Err(invalid("steady_interval_ms must be greater than 0"));
        }
        if watcher.max_polled_fields == 0 {
            return Err(invalid("max_polled_fields must be greater than 0"));
        }

        let masking = &self.masking;
        for (name, value) in [
            ("container_max_height", masking.container_max_height),
            ("container_max_width", masking.container_max_width),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be a positive number, got {value}")));
            }
        }

        Ok(())
    }

    /// The persisted subset of the configuration.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            enabled: self.protection.enabled,
            filters: self.protection.filters.clone(),
        }
    }

    /// Overwrite the protection section with persisted settings.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.protection.enabled = settings.enabled;
        self.protection.filters = settings.filters;
    }

    /// Get the overload cooldown as a Duration.
    #[must_use]
    pub fn overload_cooldown(&self) -> Duration {
        Duration::from_millis(self.governor.overload_cooldown_ms)
    }

    /// Get the span-limit cooldown as a Duration.
    #[must_use]
    pub fn span_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.governor.span_limit_cooldown_ms)
    }

    /// Get the fast poll interval as a Duration.
    #[must_use]
    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.fast_interval_ms)
    }

    /// Get the steady poll interval as a Duration.
    #[must_use]
    pub fn steady_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.steady_interval_ms)
    }

    /// Get the click rescan delays as Durations.
    #[must_use]
    pub fn click_rescan_delays(&self) -> Vec<Duration> {
        self.watcher
            .click_rescan_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    /// Get the notification fade delay as a Duration.
    #[must_use]
    pub fn notification_fade(&self) -> Duration {
        Duration::from_millis(self.masking.notification_fade_ms)
    }

    /// Get the notification removal delay as a Duration.
    #[must_use]
    pub fn notification_remove(&self) -> Duration {
        Duration::from_millis(self.masking.notification_remove_ms)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

/// Persisted settings: `{"enabled": bool, "filters": {category: bool}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether masking is active.
    pub enabled: bool,
    /// Per-category toggles.
    pub filters: DetectionFilterSet,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Settings {
    /// Parse settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or names an unknown category.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize settings to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
