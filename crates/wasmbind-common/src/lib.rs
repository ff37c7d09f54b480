//! Common types, errors, and settings for wasmbind.
//!
//! This crate provides shared functionality used across the wasmbind workspace:
//! - Error types using `thiserror` for host-side failures
//! - Serde settings structures for engines, stores and WASI environments
//! - TOML settings file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{
    CacheSettings, EngineSettings, FeatureSettings, OptLevel, PoolingSettings, PreopenSetting,
    ProfilingStrategy, StdioSetting, StoreSettings, Strategy, WasiSettings,
};
pub use config_file::{SettingsFile, SettingsFileError};
pub use error::{Error, Result, WasiError};
