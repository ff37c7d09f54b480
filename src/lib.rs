//! Embedding API for compiling, linking and running WebAssembly modules.
//!
//! This crate is a facade over the workspace members:
//! - `wasmbind-common`: errors and declarative settings
//! - `wasmbind-core`: engine, store and object model
//!
//! # Example
//!
//! ```ignore
//! wasmbind::init_tracing("info");
//!
//! let settings = wasmbind::SettingsFile::from_file("wasmbind.toml")?;
//! let engine = wasmbind::Engine::from_settings(&settings.engine)?;
//! let mut store = wasmbind::Store::from_settings(&engine, &settings.store)?;
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use wasmbind_common::{
    CacheSettings, EngineSettings, Error, FeatureSettings, OptLevel, PoolingSettings,
    PreopenSetting, ProfilingStrategy, Result, SettingsFile, SettingsFileError, StdioSetting,
    StoreSettings, Strategy, WasiError, WasiSettings,
};
pub use wasmbind_core::{
    AsContext, AsContextMut, Caller, Config, Engine, ExportType, Extern, ExternRef, ExternType,
    FrameInfo, Func, FuncType, Global, GlobalType, ImportType, Instance, InstanceType,
    InterruptHandle, Limits, Linker, Memory, MemoryType, Module, ModuleType, Mutability, Store,
    StoreContext, StoreContextMut, Table, TableType, Trap, TrapError, TrapResult, Val, ValType,
    WasiConfig, wat2wasm,
};

/// Install a global `tracing` subscriber writing formatted events to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`. Does nothing if a
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing("debug");
        init_tracing("info");
        tracing::info!("tracing initialized");
    }

    #[test]
    fn test_facade_runs_a_module() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            r#"(module (func (export "answer") (result i32) i32.const 42))"#,
        )
        .unwrap();
        let mut store = Store::new(&engine);
        let instance = Linker::new(&engine)
            .instantiate(&mut store, &module)
            .unwrap();
        let answer = instance
            .get(&mut store, "answer")
            .and_then(Extern::into_func)
            .unwrap();
        assert_eq!(answer.call(&mut store, &[]).unwrap()[0].unwrap_i32(), 42);
    }
}
