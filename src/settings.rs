use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::evaluator::DEFAULT_EVALUATION_TIMEOUT;

pub const API_URL_ENV: &str = "MINDSAFE_API_URL";

const MIN_CHILD_AGE: f64 = 0.0;
const MAX_CHILD_AGE: f64 = 18.0;

/// Child ages outside 0-18 are rejected by the evaluation API as well.
pub fn validate_child_age(age: f64) -> Result<f64> {
    if !age.is_finite() {
        bail!("age must be a number (e.g. 4 or 4.5)");
    }
    if !(MIN_CHILD_AGE..=MAX_CHILD_AGE).contains(&age) {
        bail!("age must be between {MIN_CHILD_AGE} and {MAX_CHILD_AGE}, got {age}");
    }
    Ok(age)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluatorSettings {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5001".into(),
            timeout_secs: DEFAULT_EVALUATION_TIMEOUT.as_secs(),
        }
    }
}

impl EvaluatorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObserverSettings {
    pub child_age: f64,
    pub location_poll_ms: u64,
    pub score_poll_ms: u64,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            child_age: 4.0,
            location_poll_ms: 1_000,
            score_poll_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    evaluator: EvaluatorSettings,
    observer: ObserverSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Evaluator settings, with `MINDSAFE_API_URL` taking precedence over the file.
    pub fn evaluator(&self) -> EvaluatorSettings {
        let mut settings = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .evaluator
            .clone();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                settings.api_url = url.trim().to_string();
            }
        }
        settings
    }

    pub fn observer(&self) -> ObserverSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .observer
            .clone()
    }

    pub fn child_age(&self) -> f64 {
        self.observer().child_age
    }

    pub fn update_child_age(&self, age: f64) -> Result<()> {
        let age = validate_child_age(age)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.observer.child_age = age;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        assert_eq!(store.child_age(), 4.0);
        assert_eq!(store.observer().score_poll_ms, 2_000);
        assert_eq!(store.observer().location_poll_ms, 1_000);
        assert_eq!(
            store.data.read().unwrap().evaluator.timeout(),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn child_age_is_validated_and_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        assert!(store.update_child_age(-1.0).is_err());
        assert!(store.update_child_age(100.0).is_err());
        assert!(store.update_child_age(f64::NAN).is_err());
        store.update_child_age(6.5).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.child_age(), 6.5);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.child_age(), 4.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "observer": { "child_age": 9 } }"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.child_age(), 9.0);
        assert_eq!(store.observer().score_poll_ms, 2_000);
    }

    #[test]
    fn age_bounds_are_inclusive() {
        assert_eq!(validate_child_age(0.0).unwrap(), 0.0);
        assert_eq!(validate_child_age(18.0).unwrap(), 18.0);
        assert!(validate_child_age(18.5).is_err());
    }
}
