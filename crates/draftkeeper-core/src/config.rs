//! Editor session configuration
//!
//! Timings for autosave and status resets. Loadable from TOML; every key
//! is optional.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Autosave period in milliseconds
    pub autosave_interval_ms: u64,
    /// Whether the autosave timer runs at all
    pub autosave_enabled: bool,
    /// Delay before `saved` falls back to `idle`
    pub saved_reset_ms: u64,
    /// Delay before `error` falls back to `idle`
    pub error_reset_ms: u64,
}

impl EditorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With autosave period
    #[inline]
    #[must_use]
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval_ms = duration_ms(interval);
        self
    }

    /// With autosave switched on or off
    #[inline]
    #[must_use]
    pub fn with_autosave_enabled(mut self, enabled: bool) -> Self {
        self.autosave_enabled = enabled;
        self
    }

    /// With status reset delays
    #[inline]
    #[must_use]
    pub fn with_reset_delays(mut self, saved: Duration, error: Duration) -> Self {
        self.saved_reset_ms = duration_ms(saved);
        self.error_reset_ms = duration_ms(error);
        self
    }

    /// Autosave period
    #[inline]
    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    /// Delay before `saved` resets
    #[inline]
    #[must_use]
    pub fn saved_reset(&self) -> Duration {
        Duration::from_millis(self.saved_reset_ms)
    }

    /// Delay before `error` resets
    #[inline]
    #[must_use]
    pub fn error_reset(&self) -> Duration {
        Duration::from_millis(self.error_reset_ms)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or wrong value types
    /// - `ConfigError::Invalid` if validation fails
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `ConfigError::Invalid` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check value constraints
    ///
    /// # Errors
    /// `ConfigError::Invalid` for a zero autosave period or an error reset
    /// shorter than the saved reset
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.error_reset_ms < self.saved_reset_ms {
            return Err(ConfigError::Invalid(format!(
                "error_reset_ms ({}) must not be shorter than saved_reset_ms ({})",
                self.error_reset_ms, self.saved_reset_ms
            )));
        }
        Ok(())
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_interval_ms: 60_000,
            autosave_enabled: true,
            saved_reset_ms: 2_000,
            error_reset_ms: 3_000,
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_editor_timings() {
        let config = EditorConfig::default();
        assert_eq!(config.autosave_interval(), Duration::from_secs(60));
        assert_eq!(config.saved_reset(), Duration::from_secs(2));
        assert_eq!(config.error_reset(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EditorConfig::from_toml_str("autosave_interval_ms = 15000\n").unwrap();
        assert_eq!(config.autosave_interval_ms, 15_000);
        assert_eq!(config.saved_reset_ms, 2_000);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = EditorConfig::from_toml_str("autosave_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn error_reset_must_outlast_saved_reset() {
        let config = EditorConfig::new()
            .with_reset_delays(Duration::from_secs(5), Duration::from_secs(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "autosave_enabled = false").unwrap();

        let config = EditorConfig::load(file.path()).unwrap();
        assert!(!config.autosave_enabled);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EditorConfig::load("/nonexistent/draftkeeper.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn toml_round_trip() {
        let config = EditorConfig::new().with_autosave_interval(Duration::from_secs(30));
        let text = config.to_toml_string().unwrap();
        assert_eq!(EditorConfig::from_toml_str(&text).unwrap(), config);
    }
}
