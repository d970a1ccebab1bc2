//! Runtime configuration for model preparation and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where models come from and where assembled files land.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Expected model filenames, in order. The first entry is the default
    /// load target.
    pub models: Vec<String>,

    /// Destination root for assembled models. Defaults to the platform
    /// models directory.
    #[serde(default)]
    pub models_root: Option<PathBuf>,

    /// Directory scanned for loose part files. Defaults to the
    /// destination root.
    #[serde(default)]
    pub parts_root: Option<PathBuf>,

    /// Pack containers holding part entries. Non-empty selects pack mode.
    #[serde(default)]
    pub packs: Vec<PathBuf>,
}

impl RuntimeConfig {
    /// A configuration expecting the given model filenames, everything
    /// else defaulted.
    pub fn with_models(models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            models_root: None,
            parts_root: None,
            packs: Vec::new(),
        }
    }

    /// Load a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Effective destination root.
    pub fn destination_root(&self) -> PathBuf {
        self.models_root
            .clone()
            .unwrap_or_else(murmur_models::models_dir)
    }

    /// Effective source root for loose parts.
    pub fn source_root(&self) -> PathBuf {
        self.parts_root
            .clone()
            .unwrap_or_else(|| self.destination_root())
    }

    /// Destination path for one configured model entry.
    ///
    /// `.`-prefixed entries resolve against the platform models directory;
    /// absolute entries stand alone; bare names land under the destination
    /// root.
    pub fn destination_for(&self, model: &str) -> PathBuf {
        if model.starts_with('.') {
            murmur_models::resolve_model_path(model)
        } else if Path::new(model).is_absolute() {
            PathBuf::from(model)
        } else {
            self.destination_root().join(model)
        }
    }

    /// Pack mode is selected whenever containers are configured.
    pub fn uses_packs(&self) -> bool {
        !self.packs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_config() {
        let raw = r#"{"models": ["phi-3-mini-q4.gguf"]}"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.models, vec!["phi-3-mini-q4.gguf"]);
        assert!(config.models_root.is_none());
        assert!(!config.uses_packs());
    }

    #[test]
    fn test_full_json_config() {
        let raw = r#"{
            "models": ["a.gguf", "b.gguf"],
            "models_root": "/data/models",
            "parts_root": "/data/parts",
            "packs": ["/data/packs/base.tar"]
        }"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.destination_root(), PathBuf::from("/data/models"));
        assert_eq!(config.source_root(), PathBuf::from("/data/parts"));
        assert!(config.uses_packs());
        assert_eq!(
            config.destination_for("a.gguf"),
            PathBuf::from("/data/models/a.gguf")
        );
    }

    #[test]
    fn test_source_root_falls_back_to_destination() {
        let mut config = RuntimeConfig::with_models(["m.gguf"]);
        config.models_root = Some(PathBuf::from("/tmp/dest"));
        assert_eq!(config.source_root(), PathBuf::from("/tmp/dest"));
    }

    #[test]
    fn test_absolute_model_entry_stands_alone() {
        let config = RuntimeConfig::with_models(["/opt/m.gguf"]);
        assert_eq!(
            config.destination_for("/opt/m.gguf"),
            PathBuf::from("/opt/m.gguf")
        );
    }
}
