use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use toml::Value;
use tutorguard_core::EngineConfig;

/// Loads the engine configuration from layered TOML files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project) and validate it
    pub fn load() -> Result<EngineConfig> {
        let mut layers = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }
        layers.push(Self::project_config_path());
        Self::load_layers(&layers)
    }

    /// Merge every existing file in order; later files win
    pub fn load_layers(paths: &[PathBuf]) -> Result<EngineConfig> {
        let mut merged = Value::Table(Default::default());

        for path in paths.iter().filter(|p| p.exists()) {
            let overlay = Self::read(path)?;
            merged = Self::merge(merged, overlay);
        }

        let config: EngineConfig = merged
            .try_into()
            .context("Failed to build configuration from merged layers")?;
        config.validate()?;
        Ok(config)
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tutorguard").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TUTORGUARD_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TUTORGUARD_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".tutorguard/config.toml")
        }
    }

    fn read(path: &Path) -> Result<Value> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Merge two TOML values (overlay keys override base, tables merge recursively)
    fn merge(base: Value, overlay: Value) -> Value {
        match (base, overlay) {
            (Value::Table(mut base), Value::Table(overlay)) => {
                for (key, value) in overlay {
                    let merged = match base.remove(&key) {
                        Some(existing) => Self::merge(existing, value),
                        None => value,
                    };
                    base.insert(key, merged);
                }
                Value::Table(base)
            }
            (_, overlay) => overlay,
        }
    }
}
