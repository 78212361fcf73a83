//! YAML configuration: global settings and per-project config.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vibe_core::VibeError;
use vibe_core::policy::{DEFAULT_HIBERNATION_DAYS, DEFAULT_WAITING_THRESHOLD_MINUTES};

// ─── Global settings ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hibernation_days: u32,
    pub agent_waiting_threshold_minutes: u32,
    pub watch_debounce_ms: u64,
    pub metrics_debounce_secs: u64,
    pub sweep_interval_secs: u64,
    pub redetect_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hibernation_days: DEFAULT_HIBERNATION_DAYS,
            agent_waiting_threshold_minutes: DEFAULT_WAITING_THRESHOLD_MINUTES,
            watch_debounce_ms: 200,
            metrics_debounce_secs: 10,
            sweep_interval_secs: 3600,
            redetect_concurrency: 4,
        }
    }
}

impl Settings {
    /// Load from `path`. A missing or empty file yields defaults.
    pub fn load(path: &Path) -> Result<Self, VibeError> {
        let settings: Self = load_yaml(path)?.unwrap_or_default();
        if settings.redetect_concurrency == 0 {
            return Err(VibeError::ConfigInvalid(format!(
                "{}: redetect_concurrency must be at least 1",
                path.display()
            )));
        }
        Ok(settings)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    pub fn metrics_debounce(&self) -> Duration {
        Duration::from_secs(self.metrics_debounce_secs)
    }

    /// Sweep period; never zero so the interval timer stays valid.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// ─── Per-project config ───────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_waiting_threshold_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_hibernation_days: Option<u32>,
    /// Keys this version does not know about, kept across rewrites.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, VibeError> {
        Ok(load_yaml(path)?.unwrap_or_default())
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> Result<(), VibeError> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| VibeError::storage(format!("serialize {}", path.display()), e))?;
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml)
            .map_err(|e| VibeError::io(format!("write {}", tmp.display()), e))?;
        fs::rename(&tmp, path)
            .map_err(|e| VibeError::io(format!("replace {}", path.display()), e))
    }

    /// Set a numeric key from its CLI spelling and raw string value.
    pub fn set(&mut self, key: ConfigKey, raw: &str) -> Result<(), VibeError> {
        let value = parse_non_negative(key, raw)?;
        match key {
            ConfigKey::HibernationDays => self.custom_hibernation_days = Some(value),
            ConfigKey::WaitingThreshold => self.agent_waiting_threshold_minutes = Some(value),
        }
        Ok(())
    }
}

/// CLI names of the settable per-project keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    HibernationDays,
    WaitingThreshold,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HibernationDays => "hibernation-days",
            Self::WaitingThreshold => "waiting-threshold",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hibernation-days" => Ok(Self::HibernationDays),
            "waiting-threshold" => Ok(Self::WaitingThreshold),
            _ => Err(VibeError::ConfigInvalid(format!(
                "unknown key {s:?} (expected hibernation-days or waiting-threshold)"
            ))),
        }
    }
}

fn parse_non_negative(key: ConfigKey, raw: &str) -> Result<u32, VibeError> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(v) if v < 0 => Err(VibeError::ConfigInvalid(format!(
            "{key} must be non-negative, got {v}"
        ))),
        Ok(v) => u32::try_from(v)
            .map_err(|_| VibeError::ConfigInvalid(format!("{key} is too large: {v}"))),
        Err(_) => Err(VibeError::ConfigInvalid(format!(
            "{key} must be an integer, got {raw:?}"
        ))),
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, VibeError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VibeError::io(format!("read {}", path.display()), e)),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(|e| VibeError::ConfigInvalid(format!("{}: {e}", path.display())))
}
