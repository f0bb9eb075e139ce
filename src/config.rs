use crate::error::{PanoError, Result};
use crate::scanner::MetadataBackend;
use raw_pano_common::DEFAULT_CAPTURE_KEYS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest gap in seconds between two shots of one sequence
    pub time_threshold: i64,
    pub raw_extensions: Vec<String>,
    /// Exif tags that must match for photos to be chained
    pub capture_keys: Vec<String>,
    pub metadata_backend: MetadataBackend,
    pub image_viewer: String,
    pub editor: String,
    /// Directory holding darktable `.dtstyle` files
    pub style_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub worker_idle_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_threshold: 15,
            raw_extensions: vec!["raw".into(), "nef".into()],
            capture_keys: DEFAULT_CAPTURE_KEYS.iter().map(|k| k.to_string()).collect(),
            metadata_backend: MetadataBackend::default(),
            image_viewer: "gwenview".into(),
            editor: "darktable".into(),
            style_dir: None,
            log_dir: None,
            worker_idle_timeout_ms: 1000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PanoError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("raw-pano").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture_keys.is_empty() {
            return Err(PanoError::Config("capture_keys must not be empty".into()));
        }
        if self.raw_extensions.is_empty() {
            return Err(PanoError::Config("raw_extensions must not be empty".into()));
        }
        if self.time_threshold < 0 {
            return Err(PanoError::Config("time_threshold must not be negative".into()));
        }
        Ok(())
    }

    /// Configured style directory, or darktable's default under the user config dir
    pub fn style_dir(&self) -> Option<PathBuf> {
        self.style_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("darktable").join("styles")))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("pano")))
            .unwrap_or_else(|| std::env::temp_dir().join("pano"))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_idle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.time_threshold, 15);
        assert_eq!(config.capture_keys.len(), DEFAULT_CAPTURE_KEYS.len());
        assert_eq!(config.idle_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"time_threshold": 30, "image_viewer": "feh"}"#).unwrap();
        assert_eq!(config.time_threshold, 30);
        assert_eq!(config.image_viewer, "feh");
        assert_eq!(config.editor, "darktable");
        assert_eq!(config.raw_extensions, vec!["raw", "nef"]);
    }

    #[test]
    fn test_validate_rejects_empty_keys() {
        let config = Config {
            capture_keys: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PanoError::Config(_))));
    }

    #[test]
    fn test_explicit_dirs_win() {
        let config = Config {
            style_dir: Some(PathBuf::from("/styles")),
            log_dir: Some(PathBuf::from("/logs")),
            ..Default::default()
        };
        assert_eq!(config.style_dir(), Some(PathBuf::from("/styles")));
        assert_eq!(config.log_dir(), PathBuf::from("/logs"));
    }
}
