//! Engine configuration snapshot.
//!
//! The host owns settings storage and UI; the engine reads one immutable
//! snapshot per session start. Backend selection is fixed for the session's
//! lifetime — mid-session settings changes affect the next session only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Cloud,
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub backend: BackendKind,
    pub language: String,
    pub has_api_key: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Native,
            language: "en".to_string(),
            has_api_key: false,
        }
    }
}

/// Read-only settings source consulted once at session start.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> EngineSettings;
}

/// Fixed settings, handy when the host has no dynamic settings store.
impl SettingsProvider for EngineSettings {
    fn snapshot(&self) -> EngineSettings {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_use_native_backend() {
        let settings = EngineSettings::default();
        assert_eq!(settings.backend, BackendKind::Native);
        assert!(!settings.has_api_key);
    }

    #[test]
    fn deserializes_partial_json() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "backend": "cloud", "has_api_key": true }"#).unwrap();
        assert_eq!(settings.backend, BackendKind::Cloud);
        assert!(settings.has_api_key);
        assert_eq!(settings.language, "en");
    }
}
