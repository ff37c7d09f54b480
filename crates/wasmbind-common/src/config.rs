//! Declarative settings for engines, stores and WASI environments.
//!
//! These structures mirror the programmatic builders in `wasmbind-core`
//! so that a host can keep its configuration in a file:
//! - [`EngineSettings`]: compilation and runtime knobs for an engine
//! - [`StoreSettings`]: per-store initial state (fuel)
//! - [`WasiSettings`]: argv, environment, stdio and preopened directories

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Engine-wide settings.
///
/// Unspecified fields fall back to the engine defaults, so an empty table
/// produces the same engine as `Config::new()`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Emit DWARF debug information for compiled code.
    #[serde(default)]
    pub debug_info: bool,

    /// Enable fuel accounting.
    ///
    /// Stores created from the engine start with zero fuel and must be
    /// topped up before running wasm.
    #[serde(default)]
    pub consume_fuel: bool,

    /// Allow in-flight calls to be interrupted from another thread.
    #[serde(default)]
    pub interruptable: bool,

    /// Maximum native stack usable by wasm, in bytes.
    #[serde(default)]
    pub max_wasm_stack: Option<usize>,

    /// Address space reserved up front for each linear memory, in bytes.
    #[serde(default)]
    pub static_memory_maximum_size: Option<u64>,

    /// Guard region after reserved memories, in bytes.
    #[serde(default)]
    pub static_memory_guard_size: Option<u64>,

    /// Guard region after memories that outgrew their reservation, in bytes.
    #[serde(default)]
    pub dynamic_memory_guard_size: Option<u64>,

    /// WebAssembly proposal toggles.
    #[serde(default)]
    pub features: FeatureSettings,

    /// Code generation strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// Cranelift optimization level.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Run the Cranelift IR verifier on every function.
    #[serde(default)]
    pub cranelift_debug_verifier: bool,

    /// Profiler integration.
    #[serde(default)]
    pub profiler: ProfilingStrategy,

    /// Compiled-code cache.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Pooling instance allocator. `None` keeps on-demand allocation.
    #[serde(default)]
    pub pooling: Option<PoolingSettings>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debug_info: false,
            consume_fuel: false,
            interruptable: false,
            max_wasm_stack: None,
            static_memory_maximum_size: None,
            static_memory_guard_size: None,
            dynamic_memory_guard_size: None,
            features: FeatureSettings::default(),
            strategy: Strategy::default(),
            opt_level: OptLevel::default(),
            cranelift_debug_verifier: false,
            profiler: ProfilingStrategy::default(),
            cache: CacheSettings::default(),
            pooling: None,
        }
    }
}

/// WebAssembly proposal toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureSettings {
    /// Threads proposal.
    #[serde(default)]
    pub threads: bool,

    /// Reference types proposal (required for externref).
    #[serde(default = "defaults::enabled")]
    pub reference_types: bool,

    /// Fixed-width SIMD proposal.
    #[serde(default = "defaults::enabled")]
    pub simd: bool,

    /// Bulk memory operations proposal.
    #[serde(default = "defaults::enabled")]
    pub bulk_memory: bool,

    /// Multi-value proposal.
    #[serde(default = "defaults::enabled")]
    pub multi_value: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            threads: false,
            reference_types: defaults::enabled(),
            simd: defaults::enabled(),
            bulk_memory: defaults::enabled(),
            multi_value: defaults::enabled(),
        }
    }
}

/// Code generation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Let the engine pick.
    #[default]
    Auto,
    /// Optimizing compiler.
    Cranelift,
    /// Baseline compiler.
    Winch,
}

/// Optimization level for generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations.
    None,
    /// Optimize for speed.
    #[default]
    Speed,
    /// Optimize for speed and size.
    SpeedAndSize,
}

/// Profiler integration for generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilingStrategy {
    /// No profiler support.
    #[default]
    None,
    /// `perf` map files.
    #[serde(rename = "perfmap")]
    PerfMap,
    /// `perf` jitdump files.
    #[serde(rename = "jitdump")]
    JitDump,
    /// Intel VTune.
    #[serde(rename = "vtune")]
    VTune,
}

/// Compiled-code cache settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Enable the on-disk cache of compiled modules.
    #[serde(default)]
    pub enabled: bool,

    /// Cache configuration file. `None` loads the default location.
    #[serde(default)]
    pub config_path: Option<String>,
}

/// Pooling allocator limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolingSettings {
    /// Maximum concurrent instances in the pool.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    ///
    /// This determines the maximum linear memory each instance can use.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,
}

impl Default for PoolingSettings {
    fn default() -> Self {
        Self {
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
        }
    }
}

/// Per-store settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreSettings {
    /// Fuel added right after the store is created.
    ///
    /// Requires an engine with `consume_fuel` enabled.
    #[serde(default)]
    pub initial_fuel: Option<u64>,
}

/// WASI environment description.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WasiSettings {
    /// Pass the host process arguments through. Overrides `args`.
    #[serde(default)]
    pub inherit_args: bool,

    /// Explicit argv, including the program name.
    #[serde(default)]
    pub args: Vec<String>,

    /// Pass the host process environment through. Overrides `env`.
    #[serde(default)]
    pub inherit_env: bool,

    /// Explicit environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Standard input source.
    #[serde(default)]
    pub stdin: StdioSetting,

    /// Standard output sink.
    #[serde(default)]
    pub stdout: StdioSetting,

    /// Standard error sink.
    #[serde(default)]
    pub stderr: StdioSetting,

    /// Host directories visible to the guest.
    #[serde(default)]
    pub preopens: Vec<PreopenSetting>,
}

/// Where a standard stream is connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioSetting {
    /// Closed (reads see EOF, writes are discarded).
    #[default]
    Null,
    /// The host process stream.
    Inherit,
    /// A host file.
    File(String),
}

/// A preopened directory mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreopenSetting {
    /// Directory on the host.
    pub host: String,
    /// Path the guest sees.
    pub guest: String,
}

/// Default value functions for serde.
mod defaults {
    pub const fn enabled() -> bool {
        true
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_settings() {
        let settings = EngineSettings::default();

        assert!(!settings.consume_fuel);
        assert!(!settings.interruptable);
        assert!(settings.features.reference_types);
        assert!(settings.features.bulk_memory);
        assert!(!settings.features.threads);
        assert_eq!(settings.strategy, Strategy::Auto);
        assert_eq!(settings.opt_level, OptLevel::Speed);
        assert_eq!(settings.profiler, ProfilingStrategy::None);
        assert!(!settings.cache.enabled);
        assert!(settings.pooling.is_none());
        assert!(settings.static_memory_maximum_size.is_none());
        assert!(settings.dynamic_memory_guard_size.is_none());
    }

    #[test]
    fn test_settings_serialization() {
        let settings = EngineSettings {
            consume_fuel: true,
            pooling: Some(PoolingSettings::default()),
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let deserialized: EngineSettings = serde_json::from_str(&json).unwrap();

        assert!(deserialized.consume_fuel);
        assert_eq!(
            deserialized.pooling.map(|p| p.max_instances),
            Some(1000)
        );
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"strategy": "cranelift", "features": {"simd": false}}"#;
        let settings: EngineSettings = serde_json::from_str(json).unwrap();

        // Explicitly set values
        assert_eq!(settings.strategy, Strategy::Cranelift);
        assert!(!settings.features.simd);
        // Default values for unspecified fields
        assert!(settings.features.multi_value);
        assert_eq!(settings.opt_level, OptLevel::Speed);
    }

    #[test]
    fn test_profiler_names() {
        let p: ProfilingStrategy = serde_json::from_str(r#""perfmap""#).unwrap();
        assert_eq!(p, ProfilingStrategy::PerfMap);
        let p: ProfilingStrategy = serde_json::from_str(r#""vtune""#).unwrap();
        assert_eq!(p, ProfilingStrategy::VTune);
    }

    #[test]
    fn test_stdio_setting_forms() {
        let s: StdioSetting = serde_json::from_str(r#""inherit""#).unwrap();
        assert_eq!(s, StdioSetting::Inherit);

        let s: StdioSetting = serde_json::from_str(r#"{"file": "out.txt"}"#).unwrap();
        assert_eq!(s, StdioSetting::File("out.txt".into()));

        assert_eq!(WasiSettings::default().stdout, StdioSetting::Null);
    }
}
