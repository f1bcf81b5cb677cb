//! User settings stored as settings.json in the app data directory

use crate::constants::{APP_NAME, DEFAULT_MODEL_ID};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which pretrained weights to load (Hugging Face model id).
    pub model_id: String,

    /// Credential source for fetching weights: "none", "cache",
    /// "literal:<token>" or "env:<var>". Kept as a string so a hand-edited
    /// settings file cannot prevent startup; parsed when a request starts.
    pub token_source: String,

    /// Numeric precision requested from the backend: "auto", "bf16",
    /// "f16" or "f32".
    pub dtype: String,

    /// Offload large model components to CPU memory to relieve device
    /// memory pressure.
    pub offload: bool,

    // Paths
    pub output_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            token_source: "none".to_string(),
            dtype: "f16".to_string(),
            offload: false,
            output_dir: None,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(settings) => {
                    debug!(path = %path.display(), "Settings loaded");
                    settings
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse settings, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!("No settings file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) {
        let path = data_dir.join("settings.json");
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(error = %e, "Failed to save settings");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings"),
        }
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::picture_dir().unwrap_or_else(|| {
                    dirs::data_local_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join(APP_NAME)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_configuration() {
        let s = Settings::default();
        assert_eq!(s.model_id, DEFAULT_MODEL_ID);
        assert_eq!(s.token_source, "none");
        assert_eq!(s.dtype, "f16");
        assert!(!s.offload);
        assert!(s.output_dir.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            model_id: "stabilityai/stable-diffusion-2-1".to_string(),
            token_source: "env:HF_TOKEN".to_string(),
            dtype: "bf16".to_string(),
            offload: true,
            output_dir: Some("/tmp/renders".to_string()),
        };
        settings.save(dir.path());

        let loaded = Settings::load(dir.path());
        assert_eq!(loaded.model_id, settings.model_id);
        assert_eq!(loaded.token_source, settings.token_source);
        assert_eq!(loaded.dtype, settings.dtype);
        assert_eq!(loaded.offload, settings.offload);
        assert_eq!(loaded.output_dir, settings.output_dir);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "model_id": "CompVis/stable-diffusion-v1-4" }"#,
        )
        .unwrap();

        let loaded = Settings::load(dir.path());
        assert_eq!(loaded.model_id, "CompVis/stable-diffusion-v1-4");
        assert_eq!(loaded.dtype, "f16");
        assert_eq!(loaded.token_source, "none");
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();

        let loaded = Settings::load(dir.path());
        assert_eq!(loaded.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn explicit_output_dir_wins_over_default() {
        let settings = Settings {
            output_dir: Some("/data/images".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.output_dir_or_default(), PathBuf::from("/data/images"));
    }
}
