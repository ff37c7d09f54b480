//! Engine configuration and creation.
//!
//! A [`Config`] is a mutable builder; [`Engine::new`] consumes it. The
//! resulting [`Engine`] is:
//! - Cheap to clone and safe to share across threads
//! - The compilation context for every [`Module`](crate::Module)
//! - The source of fuel and interruption capabilities for its stores

use std::path::Path;

use tracing::{debug, info};
use wasmtime::{InstanceAllocationStrategy, PoolingAllocationConfig};

use wasmbind_common::{
    EngineSettings, Error, OptLevel, PoolingSettings, ProfilingStrategy, Result, Strategy,
};

/// Engine configuration builder.
///
/// Starts from the engine defaults. Plain setters always succeed; the
/// [`strategy`](Self::strategy), [`profiler`](Self::profiler) and cache
/// loading setters validate their argument and leave the builder unchanged
/// when they fail.
///
/// # Example
///
/// ```ignore
/// let mut config = Config::new();
/// config.consume_fuel(true).interruptable(true);
/// config.strategy(Strategy::Cranelift)?;
/// let engine = Engine::new(config)?;
/// ```
pub struct Config {
    inner: wasmtime::Config,
    consume_fuel: bool,
    interruptable: bool,
    static_guard: Option<u64>,
    dynamic_guard: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            inner: wasmtime::Config::new(),
            consume_fuel: false,
            interruptable: false,
            static_guard: None,
            dynamic_guard: None,
        }
    }

    /// Build a configuration from declarative settings.
    ///
    /// # Errors
    ///
    /// Fails on the same inputs the validated setters reject.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        let mut config = Self::new();

        config
            .debug_info(settings.debug_info)
            .consume_fuel(settings.consume_fuel)
            .interruptable(settings.interruptable)
            .wasm_threads(settings.features.threads)
            .wasm_reference_types(settings.features.reference_types)
            .wasm_simd(settings.features.simd)
            .wasm_bulk_memory(settings.features.bulk_memory)
            .wasm_multi_value(settings.features.multi_value)
            .cranelift_debug_verifier(settings.cranelift_debug_verifier)
            .cranelift_opt_level(settings.opt_level)
            .pooling_allocator(settings.pooling.as_ref());

        if let Some(size) = settings.max_wasm_stack {
            config.max_wasm_stack(size);
        }
        if let Some(bytes) = settings.static_memory_maximum_size {
            config.static_memory_maximum_size(bytes);
        }
        if let Some(bytes) = settings.static_memory_guard_size {
            config.static_memory_guard_size(bytes);
        }
        if let Some(bytes) = settings.dynamic_memory_guard_size {
            config.dynamic_memory_guard_size(bytes);
        }

        config.strategy(settings.strategy)?;
        config.profiler(settings.profiler)?;

        if settings.cache.enabled {
            match &settings.cache.config_path {
                Some(path) => config.cache_load(path)?,
                None => config.cache_load_default()?,
            };
        }

        Ok(config)
    }

    /// Emit DWARF debug information for compiled code.
    pub fn debug_info(&mut self, enable: bool) -> &mut Self {
        self.inner.debug_info(enable);
        self
    }

    /// Allow running wasm to be interrupted through an
    /// [`InterruptHandle`](crate::InterruptHandle).
    pub fn interruptable(&mut self, enable: bool) -> &mut Self {
        self.inner.epoch_interruption(enable);
        self.interruptable = enable;
        self
    }

    /// Enable fuel accounting.
    pub fn consume_fuel(&mut self, enable: bool) -> &mut Self {
        self.inner.consume_fuel(enable);
        self.consume_fuel = enable;
        self
    }

    /// Maximum native stack usable by wasm, in bytes.
    pub fn max_wasm_stack(&mut self, size: usize) -> &mut Self {
        self.inner.max_wasm_stack(size);
        self
    }

    /// Virtual address space reserved up front for each linear memory.
    ///
    /// Memories that fit are never moved by `grow`.
    pub fn static_memory_maximum_size(&mut self, bytes: u64) -> &mut Self {
        self.inner.memory_reservation(bytes);
        self
    }

    /// Guard region after memories that fit their reservation.
    ///
    /// The engine has a single guard size; the larger of this and
    /// [`dynamic_memory_guard_size`](Self::dynamic_memory_guard_size) is used.
    pub fn static_memory_guard_size(&mut self, bytes: u64) -> &mut Self {
        self.static_guard = Some(bytes);
        self.apply_guard_size();
        self
    }

    /// Guard region after memories that outgrow their reservation.
    pub fn dynamic_memory_guard_size(&mut self, bytes: u64) -> &mut Self {
        self.dynamic_guard = Some(bytes);
        self.apply_guard_size();
        self
    }

    fn apply_guard_size(&mut self) {
        if let Some(bytes) = self.static_guard.max(self.dynamic_guard) {
            self.inner.memory_guard_size(bytes);
        }
    }

    pub fn wasm_threads(&mut self, enable: bool) -> &mut Self {
        self.inner.wasm_threads(enable);
        self
    }

    pub fn wasm_reference_types(&mut self, enable: bool) -> &mut Self {
        self.inner.wasm_reference_types(enable);
        self
    }

    pub fn wasm_simd(&mut self, enable: bool) -> &mut Self {
        self.inner.wasm_simd(enable);
        self
    }

    pub fn wasm_bulk_memory(&mut self, enable: bool) -> &mut Self {
        self.inner.wasm_bulk_memory(enable);
        self
    }

    pub fn wasm_multi_value(&mut self, enable: bool) -> &mut Self {
        self.inner.wasm_multi_value(enable);
        self
    }

    /// Select the code generator.
    ///
    /// # Errors
    ///
    /// Only the optimizing compiler is built in; [`Strategy::Winch`] fails.
    pub fn strategy(&mut self, strategy: Strategy) -> Result<&mut Self> {
        let strategy = match strategy {
            Strategy::Auto => wasmtime::Strategy::Auto,
            Strategy::Cranelift => wasmtime::Strategy::Cranelift,
            Strategy::Winch => {
                return Err(Error::invalid_config(
                    "the winch compilation strategy is not available in this build",
                ));
            }
        };
        self.inner.strategy(strategy);
        Ok(self)
    }

    pub fn cranelift_debug_verifier(&mut self, enable: bool) -> &mut Self {
        self.inner.cranelift_debug_verifier(enable);
        self
    }

    pub fn cranelift_opt_level(&mut self, level: OptLevel) -> &mut Self {
        self.inner.cranelift_opt_level(match level {
            OptLevel::None => wasmtime::OptLevel::None,
            OptLevel::Speed => wasmtime::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });
        self
    }

    /// Select a profiler integration.
    ///
    /// # Errors
    ///
    /// `JitDump` and `VTune` are not built in; `PerfMap` is Linux-only.
    pub fn profiler(&mut self, profiler: ProfilingStrategy) -> Result<&mut Self> {
        let profiler = match profiler {
            ProfilingStrategy::None => wasmtime::ProfilingStrategy::None,
            ProfilingStrategy::PerfMap if cfg!(target_os = "linux") => {
                wasmtime::ProfilingStrategy::PerfMap
            }
            other => {
                return Err(Error::invalid_config(format!(
                    "profiler {other:?} is not supported on this platform"
                )));
            }
        };
        self.inner.profiler(profiler);
        Ok(self)
    }

    /// Enable the compiled-code cache using the default cache config file.
    pub fn cache_load_default(&mut self) -> Result<&mut Self> {
        self.inner.cache_config_load_default().map_err(|e| {
            Error::invalid_config(format!("failed to load default cache config: {e:#}"))
        })?;
        Ok(self)
    }

    /// Enable the compiled-code cache using the cache config file at `path`.
    pub fn cache_load(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        self.inner.cache_config_load(path).map_err(|e| {
            Error::invalid_config(format!(
                "failed to load cache config from {}: {e:#}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), "Module cache configured");
        Ok(self)
    }

    /// Switch to the pooling instance allocator, or back to on-demand
    /// allocation with `None`.
    pub fn pooling_allocator(&mut self, settings: Option<&PoolingSettings>) -> &mut Self {
        let strategy = match settings {
            Some(settings) => {
                InstanceAllocationStrategy::Pooling(create_pooling_config(settings))
            }
            None => InstanceAllocationStrategy::OnDemand,
        };
        self.inner.allocation_strategy(strategy);
        self
    }
}

/// Create pooling allocation configuration.
fn create_pooling_config(settings: &PoolingSettings) -> PoolingAllocationConfig {
    let mut pooling = PoolingAllocationConfig::default();

    pooling.total_component_instances(settings.max_instances);
    pooling.total_core_instances(settings.max_instances);
    pooling.total_memories(settings.max_instances);
    pooling.total_tables(settings.max_instances);

    // Maximum size of a single memory in bytes
    let max_memory_bytes = (settings.instance_memory_mb as usize) * 1024 * 1024;
    pooling.max_memory_size(max_memory_bytes);

    pooling
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("consume_fuel", &self.consume_fuel)
            .field("interruptable", &self.interruptable)
            .field("static_guard", &self.static_guard)
            .field("dynamic_guard", &self.dynamic_guard)
            .finish_non_exhaustive()
    }
}

/// Shared compilation and runtime environment.
///
/// Clones share the same underlying engine and compiled-code cache.
#[derive(Clone)]
pub struct Engine {
    inner: wasmtime::Engine,
    consume_fuel: bool,
    interruptable: bool,
}

impl Engine {
    /// Create an engine, consuming the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the option combination is rejected by the engine.
    pub fn new(config: Config) -> Result<Self> {
        let inner = wasmtime::Engine::new(&config.inner)
            .map_err(|e| Error::invalid_config(format!("Failed to create engine: {e:#}")))?;

        info!(
            consume_fuel = config.consume_fuel,
            interruptable = config.interruptable,
            "Engine initialized"
        );

        Ok(Self {
            inner,
            consume_fuel: config.consume_fuel,
            interruptable: config.interruptable,
        })
    }

    /// Create an engine from declarative settings.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        Self::new(Config::from_settings(settings)?)
    }

    /// Returns `true` if stores of this engine account fuel.
    pub fn is_fuel_enabled(&self) -> bool {
        self.consume_fuel
    }

    /// Returns `true` if stores of this engine hand out interrupt handles.
    pub fn is_interruptable(&self) -> bool {
        self.interruptable
    }

    /// Returns `true` if both handles refer to the same engine.
    pub fn same(a: &Self, b: &Self) -> bool {
        wasmtime::Engine::same(&a.inner, &b.inner)
    }

    pub(crate) fn inner(&self) -> &wasmtime::Engine {
        &self.inner
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            inner: wasmtime::Engine::default(),
            consume_fuel: false,
            interruptable: false,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("consume_fuel", &self.consume_fuel)
            .field("interruptable", &self.interruptable)
            .finish_non_exhaustive()
    }
}
