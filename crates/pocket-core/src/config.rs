use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::domain::{RateSample, RateThresholds, US_PER_SEC};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PocketConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub breathing: BreathingConfig,
    #[serde(default)]
    pub bands: RateThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Rate shown before any tick or refresh.
    pub initial_bpm: RateSample,
    /// Decay stops at this rate.
    pub resting_floor_bpm: RateSample,
    /// Decay cadence in milliseconds.
    pub tick_interval_ms: u64,
    /// Trailing window queried on force-refresh, in seconds.
    pub refresh_window_sec: u64,
    /// Inclusive lower bound of the fallback value.
    pub fallback_min_bpm: RateSample,
    /// Exclusive upper bound of the fallback value.
    pub fallback_max_bpm: RateSample,
    /// Seed for the fallback generator. Entropy-seeded when absent.
    pub fallback_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    /// Countdown length of one session.
    pub initial_steps: u32,
    /// Delay between automatic step transitions in milliseconds.
    pub step_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            initial_bpm: 60,
            resting_floor_bpm: 60,
            tick_interval_ms: 500,
            refresh_window_sec: 60,
            fallback_min_bpm: 0,
            fallback_max_bpm: 250,
            fallback_seed: None,
        }
    }
}

impl MonitorConfig {
    pub fn tick_interval_us(&self) -> u64 {
        self.tick_interval_ms.saturating_mul(1_000)
    }

    pub fn refresh_window_us(&self) -> u64 {
        self.refresh_window_sec.saturating_mul(US_PER_SEC)
    }
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            initial_steps: 5,
            step_interval_ms: 3_000,
        }
    }
}

impl BreathingConfig {
    pub fn step_interval_us(&self) -> u64 {
        self.step_interval_ms.saturating_mul(1_000)
    }
}

impl PocketConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: PocketConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables should be prefixed with POCKET_
    /// Example: POCKET_BREATHING_INITIAL_STEPS=7
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. User config file (if exists)
    /// 3. Default config file
    /// 4. Built-in defaults (lowest priority)
    pub fn load_layered(
        default_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut layered = toml::Value::Table(toml::Table::new());

        for path in [default_path, user_path].into_iter().flatten() {
            if path.exists() {
                let layer: toml::Value = fs::read_to_string(path)?.parse()?;
                merge_toml(&mut layered, layer);
            }
        }

        let mut config: PocketConfig = layered.try_into()?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
            match std::env::var(name) {
                Ok(val) => val
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::Validation(format!("Invalid {}", name))),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        // Monitor overrides
        if let Some(v) = parse_var("POCKET_MONITOR_INITIAL_BPM")? {
            self.monitor.initial_bpm = v;
        }
        if let Some(v) = parse_var("POCKET_MONITOR_RESTING_FLOOR_BPM")? {
            self.monitor.resting_floor_bpm = v;
        }
        if let Some(v) = parse_var("POCKET_MONITOR_TICK_INTERVAL_MS")? {
            self.monitor.tick_interval_ms = v;
        }
        if let Some(v) = parse_var("POCKET_MONITOR_REFRESH_WINDOW_SEC")? {
            self.monitor.refresh_window_sec = v;
        }
        if let Some(v) = parse_var("POCKET_MONITOR_FALLBACK_MIN_BPM")? {
            self.monitor.fallback_min_bpm = v;
        }
        if let Some(v) = parse_var("POCKET_MONITOR_FALLBACK_MAX_BPM")? {
            self.monitor.fallback_max_bpm = v;
        }
        if let Some(v) = parse_var("POCKET_MONITOR_FALLBACK_SEED")? {
            self.monitor.fallback_seed = Some(v);
        }

        // Breathing overrides
        if let Some(v) = parse_var("POCKET_BREATHING_INITIAL_STEPS")? {
            self.breathing.initial_steps = v;
        }
        if let Some(v) = parse_var("POCKET_BREATHING_STEP_INTERVAL_MS")? {
            self.breathing.step_interval_ms = v;
        }

        // Band overrides
        if let Some(v) = parse_var("POCKET_BANDS_NORMAL_BELOW")? {
            self.bands.normal_below = v;
        }
        if let Some(v) = parse_var("POCKET_BANDS_HIGH_BELOW")? {
            self.bands.high_below = v;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "monitor.tick_interval_ms must be > 0".to_string(),
            ));
        }
        if self.monitor.refresh_window_sec == 0 {
            return Err(ConfigError::Validation(
                "monitor.refresh_window_sec must be > 0".to_string(),
            ));
        }
        if self.monitor.fallback_min_bpm >= self.monitor.fallback_max_bpm {
            return Err(ConfigError::Validation(
                "monitor.fallback_min_bpm must be < fallback_max_bpm".to_string(),
            ));
        }

        if self.breathing.initial_steps == 0 {
            return Err(ConfigError::Validation(
                "breathing.initial_steps must be > 0".to_string(),
            ));
        }
        if self.breathing.step_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "breathing.step_interval_ms must be > 0".to_string(),
            ));
        }

        if self.bands.normal_below >= self.bands.high_below {
            return Err(ConfigError::Validation(
                "bands.normal_below must be < high_below".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Overlay `layer` onto `base` key by key. Nested tables merge recursively;
/// any other value in `layer` replaces the one in `base`.
fn merge_toml(base: &mut toml::Value, layer: toml::Value) {
    match (base, layer) {
        (toml::Value::Table(base), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
