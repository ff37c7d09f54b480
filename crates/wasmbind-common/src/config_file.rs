//! TOML settings files.
//!
//! A [`SettingsFile`] groups the engine, store and WASI settings of one
//! embedding so they can be loaded at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EngineSettings, StoreSettings, WasiSettings};

/// Top-level settings file structure.
///
/// # Example
///
/// ```toml
/// [engine]
/// consume_fuel = true
/// interruptable = true
/// opt_level = "speed_and_size"
///
/// [engine.features]
/// simd = false
///
/// [engine.pooling]
/// max_instances = 100
///
/// [store]
/// initial_fuel = 10_000_000
///
/// [wasi]
/// args = ["app.wasm", "--verbose"]
/// stdout = "inherit"
/// stderr = { file = "./app.log" }
///
/// [wasi.env]
/// RUST_LOG = "debug"
///
/// [[wasi.preopens]]
/// host = "./data"
/// guest = "/data"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsFile {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Store settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// WASI settings. Absent means no WASI context is configured.
    #[serde(default)]
    pub wasi: Option<WasiSettings>,
}

impl SettingsFile {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SettingsFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let settings = Self::from_toml(&content)?;
        debug!(path = %path.display(), "Settings file loaded");
        Ok(settings)
    }

    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, SettingsFileError> {
        toml::from_str(content).map_err(|e| SettingsFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Settings file errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsFileError {
    /// Failed to read settings file.
    #[error("Failed to read settings file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse settings file.
    #[error("Failed to parse settings file: {message}")]
    Parse { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OptLevel, StdioSetting};

    #[test]
    fn test_default_settings_file() {
        let settings = SettingsFile::default();

        assert!(!settings.engine.consume_fuel);
        assert!(settings.store.initial_fuel.is_none());
        assert!(settings.wasi.is_none());
    }

    #[test]
    fn test_parse_minimal_settings() {
        let toml = r"
            [engine]
            consume_fuel = true
        ";

        let settings = SettingsFile::from_toml(toml).unwrap();

        assert!(settings.engine.consume_fuel);
        // Defaults applied
        assert!(settings.engine.features.reference_types);
        assert!(settings.wasi.is_none());
    }

    #[test]
    fn test_parse_full_settings() {
        let toml = r#"
            [engine]
            consume_fuel = true
            interruptable = true
            opt_level = "speed_and_size"
            profiler = "perfmap"

            [engine.features]
            simd = false

            [engine.pooling]
            max_instances = 100

            [engine.cache]
            enabled = true
            config_path = "./cache.toml"

            [store]
            initial_fuel = 5_000_000

            [wasi]
            args = ["app.wasm", "--verbose"]
            stdout = "inherit"
            stderr = { file = "./app.log" }

            [wasi.env]
            RUST_LOG = "debug"

            [[wasi.preopens]]
            host = "./data"
            guest = "/data"
        "#;

        let settings = SettingsFile::from_toml(toml).unwrap();

        assert!(settings.engine.interruptable);
        assert_eq!(settings.engine.opt_level, OptLevel::SpeedAndSize);
        assert!(!settings.engine.features.simd);
        assert_eq!(settings.engine.pooling.as_ref().unwrap().max_instances, 100);
        assert_eq!(settings.engine.pooling.as_ref().unwrap().instance_memory_mb, 64);
        assert_eq!(
            settings.engine.cache.config_path.as_deref(),
            Some("./cache.toml")
        );
        assert_eq!(settings.store.initial_fuel, Some(5_000_000));

        let wasi = settings.wasi.unwrap();
        assert_eq!(wasi.args, vec!["app.wasm", "--verbose"]);
        assert_eq!(wasi.stdout, StdioSetting::Inherit);
        assert_eq!(wasi.stderr, StdioSetting::File("./app.log".into()));
        assert_eq!(wasi.stdin, StdioSetting::Null);
        assert_eq!(wasi.env.get("RUST_LOG").map(String::as_str), Some("debug"));
        assert_eq!(wasi.preopens.len(), 1);
        assert_eq!(wasi.preopens[0].guest, "/data");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = SettingsFile::from_toml(invalid);
        assert!(matches!(result, Err(SettingsFileError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = SettingsFile::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(SettingsFileError::Io { .. })));
    }
}
