use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use murmur_foundation::AppError;
use murmur_shortcuts::{Platform, ShortcutBinding, ShortcutKind, ShortcutRegistry, ShortcutValidation};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Input device name; `None` means the system default microphone.
    pub device: Option<String>,
    /// Language hint forwarded to the transcription provider.
    pub language: Option<String>,
    /// Path to the privileged native helper binary. Without it, paste and
    /// system-audio mute are no-ops and no global shortcuts arrive.
    pub helper_path: Option<PathBuf>,
    pub silence_flush_ms: u64,
    pub max_segment_ms: u64,
    pub provider: ProviderSettings,
    pub shortcuts: Vec<ShortcutSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub endpoint: String,
    /// Environment variable holding the API key, so the key itself never
    /// lands in the settings file.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutSetting {
    pub keys: Vec<String>,
    pub kind: ShortcutKind,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8760/v1/audio/transcriptions".to_string(),
            api_key_env: "MURMUR_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            device: None,
            language: None,
            helper_path: None,
            silence_flush_ms: 3_000,
            max_segment_ms: 30_000,
            provider: ProviderSettings::default(),
            shortcuts: vec![
                ShortcutSetting {
                    keys: vec!["Ctrl".into(), "Space".into()],
                    kind: ShortcutKind::PushToTalk,
                },
                ShortcutSetting {
                    keys: vec!["Ctrl".into(), "Shift".into(), "D".into()],
                    kind: ShortcutKind::ToggleRecording,
                },
            ],
        }
    }
}

impl AppSettings {
    /// Load settings from a TOML file; a missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            info!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("read {}: {}", path.display(), e)))?;
        toml::from_str(&raw).map_err(|e| AppError::Config(format!("parse {}: {}", path.display(), e)))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.provider.api_key_env).ok()
    }

    /// Run every configured shortcut through the registry. Rejected bindings
    /// are dropped with a log line rather than failing startup; an empty
    /// result is a configuration error because the app would be uncontrollable.
    pub fn build_registry(&self, platform: Platform) -> Result<ShortcutRegistry, AppError> {
        let mut registry = ShortcutRegistry::new(platform);
        for shortcut in &self.shortcuts {
            let binding = ShortcutBinding {
                keys: shortcut.keys.clone(),
                kind: shortcut.kind,
            };
            if let ShortcutValidation::Rejected(reason) = registry.register(binding) {
                warn!(keys = ?shortcut.keys, %reason, "dropping invalid shortcut");
            }
        }
        if registry.bindings().is_empty() {
            return Err(AppError::Config(
                "no valid shortcuts configured".to_string(),
            ));
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_both_binding_kinds() {
        let settings = AppSettings::default();
        let registry = settings.build_registry(Platform::MacOs).unwrap();
        assert_eq!(registry.bindings().len(), 2);
        assert_eq!(registry.bindings()[0].kind, ShortcutKind::PushToTalk);
        assert_eq!(registry.bindings()[1].kind, ShortcutKind::ToggleRecording);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let settings: AppSettings = toml::from_str(
            r#"
            language = "en"

            [provider]
            endpoint = "https://stt.example/v1/transcribe"
            "#,
        )
        .unwrap();
        assert_eq!(settings.language.as_deref(), Some("en"));
        assert_eq!(settings.provider.endpoint, "https://stt.example/v1/transcribe");
        assert_eq!(settings.provider.timeout_secs, 30);
        assert_eq!(settings.silence_flush_ms, 3_000);
        assert_eq!(settings.shortcuts.len(), 2);
    }

    #[test]
    fn invalid_shortcuts_are_dropped_not_fatal() {
        let settings: AppSettings = toml::from_str(
            r#"
            [[shortcuts]]
            keys = ["Ctrl", "Space"]
            kind = "PushToTalk"

            [[shortcuts]]
            keys = ["A", "B"]
            kind = "ToggleRecording"
            "#,
        )
        .unwrap();
        let registry = settings.build_registry(Platform::MacOs).unwrap();
        assert_eq!(registry.bindings().len(), 1);
    }

    #[test]
    fn all_shortcuts_invalid_is_a_config_error() {
        let settings: AppSettings = toml::from_str(
            r#"
            [[shortcuts]]
            keys = ["A"]
            kind = "PushToTalk"
            "#,
        )
        .unwrap();
        assert!(settings.build_registry(Platform::MacOs).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = AppSettings::load(Some(Path::new("/nonexistent/murmur.toml"))).unwrap();
        assert_eq!(settings.max_segment_ms, 30_000);
    }
}
