use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a capture does when one display's native capture call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Leave that display's region at the default fill and keep compositing
    Skip,
    /// Fail the whole capture call
    Abort,
}

/// Capture session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Policy applied to every backend when a display capture fails mid-composite
    pub failure_policy: FailurePolicy,
    /// Try the shared-memory transfer before the inline image request (Linux)
    pub use_shared_memory: bool,
    /// RGBA fill for pixels no display covers
    pub background: [u8; 4],
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Skip,
            use_shared_memory: true,
            background: [0, 0, 0, 0],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHome,
}

impl CaptureConfig {
    /// Load configuration from the default path, creating it with defaults if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: CaptureConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!(?path, "loaded capture config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        tracing::debug!(?path, "saved capture config");
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // The default fill is either transparent or an opaque colour
        let alpha = self.background[3];
        if alpha != 0 && alpha != 255 {
            return Err(ConfigError::Invalid(format!(
                "background alpha must be 0 or 255, got {}",
                alpha
            )));
        }
        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> Result<Self, ConfigError> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHome)?;

        let mut path = PathBuf::from(home);
        path.push(".deskcap");
        path.push("config.json");
        Ok(path)
    }
}
