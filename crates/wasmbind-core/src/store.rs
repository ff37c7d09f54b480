//! Stores, store contexts and per-store runtime state.
//!
//! A [`Store`] owns every wasm object created in it. Handles such as
//! [`Func`](crate::Func) or [`Memory`](crate::Memory) are plain tokens; each
//! operation on them takes a context:
//! - [`StoreContext`] for read-only access
//! - [`StoreContextMut`] for anything that may run code or allocate
//!
//! The [`AsContext`] and [`AsContextMut`] traits let a `Store`, a context or
//! a [`Caller`](crate::Caller) be passed wherever a context is expected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use wasmtime::{AsContext as _, AsContextMut as _};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use wasmbind_common::{Error, Result, StoreSettings};

use crate::{Engine, WasiConfig};

/// Host state attached to every store.
pub struct StoreData {
    wasi: WasiP1Ctx,
    wasi_configured: bool,
    fuel_enabled: bool,
    fuel_added: u64,
    interrupt: Option<Arc<AtomicBool>>,
}

impl StoreData {
    pub(crate) fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }
}

/// Owner of all wasm objects created within it.
///
/// Not thread-safe; move it between threads but do not share it. Use an
/// [`InterruptHandle`] to stop running code from another thread.
pub struct Store {
    inner: wasmtime::Store<StoreData>,
    engine: Engine,
}

impl Store {
    pub fn new(engine: &Engine) -> Self {
        let data = StoreData {
            wasi: WasiCtxBuilder::new().build_p1(),
            wasi_configured: false,
            fuel_enabled: engine.is_fuel_enabled(),
            fuel_added: 0,
            interrupt: None,
        };
        let mut inner = wasmtime::Store::new(engine.inner(), data);

        if engine.is_interruptable() {
            let flag = Arc::new(AtomicBool::new(false));
            let pending = Arc::clone(&flag);

            // Every epoch tick reaches this callback; only a pending request traps.
            inner.set_epoch_deadline(1);
            inner.epoch_deadline_callback(move |_| {
                if pending.swap(false, Ordering::SeqCst) {
                    Err(wasmtime::Trap::Interrupt.into())
                } else {
                    Ok(wasmtime::UpdateDeadline::Continue(1))
                }
            });
            inner.data_mut().interrupt = Some(flag);
        }

        Self {
            inner,
            engine: engine.clone(),
        }
    }

    /// Create a store and apply declarative settings.
    ///
    /// # Errors
    ///
    /// Fails if `initial_fuel` is set but the engine does not consume fuel.
    pub fn from_settings(engine: &Engine, settings: &StoreSettings) -> Result<Self> {
        let mut store = Self::new(engine);
        if let Some(fuel) = settings.initial_fuel {
            store.context().add_fuel(fuel)?;
        }
        Ok(store)
    }

    pub fn context(&mut self) -> StoreContextMut<'_> {
        StoreContextMut(self.inner.as_context_mut())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Shared borrow of a store.
pub struct StoreContext<'a>(pub(crate) wasmtime::StoreContext<'a, StoreData>);

/// Exclusive borrow of a store.
pub struct StoreContextMut<'a>(pub(crate) wasmtime::StoreContextMut<'a, StoreData>);

impl StoreContextMut<'_> {
    /// Run a garbage collection pass, releasing unreachable `externref`s.
    pub fn gc(&mut self) {
        debug!("Running store garbage collection");
        self.0.gc();
    }

    /// Add fuel to the store.
    ///
    /// # Errors
    ///
    /// Fails if the engine was not configured to consume fuel.
    pub fn add_fuel(&mut self, fuel: u64) -> Result<()> {
        if !self.0.data().fuel_enabled {
            return Err(Error::invalid_config(
                "fuel consumption is not enabled in the engine configuration",
            ));
        }

        let remaining = self
            .0
            .get_fuel()
            .map_err(|e| Error::invalid_config(format!("{e:#}")))?;
        self.0
            .set_fuel(remaining.saturating_add(fuel))
            .map_err(|e| Error::invalid_config(format!("{e:#}")))?;

        let data = self.0.data_mut();
        data.fuel_added = data.fuel_added.saturating_add(fuel);
        debug!(added = fuel, total = data.fuel_added, "Fuel added");
        Ok(())
    }

    /// Fuel consumed since the store was created, or `None` if fuel
    /// consumption is disabled.
    pub fn fuel_consumed(&self) -> Option<u64> {
        if !self.0.data().fuel_enabled {
            return None;
        }
        let remaining = self.0.get_fuel().ok()?;
        Some(self.0.data().fuel_added.saturating_sub(remaining))
    }

    /// Install a WASI configuration, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot be turned into a WASI context.
    pub fn set_wasi(&mut self, config: WasiConfig) -> Result<()> {
        let wasi = config.build()?;
        let data = self.0.data_mut();
        if data.wasi_configured {
            debug!("Replacing previously configured WASI context");
        }
        data.wasi = wasi;
        data.wasi_configured = true;
        Ok(())
    }

    /// A handle that can interrupt code running in this store from any
    /// thread, or `None` if the engine is not interruptable.
    pub fn interrupt_handle(&self) -> Option<InterruptHandle> {
        let flag = self.0.data().interrupt.clone()?;
        Some(InterruptHandle {
            engine: self.0.engine().clone(),
            flag,
        })
    }
}

/// Thread-safe handle requesting that wasm running in a store trap.
#[derive(Clone)]
pub struct InterruptHandle {
    engine: wasmtime::Engine,
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Request an interrupt.
    ///
    /// Code currently running traps at its next checkpoint; if nothing is
    /// running, the next call into wasm traps instead.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.engine.increment_epoch();
        debug!("Interrupt requested");
    }
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("pending", &self.flag.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Types that can lend out a shared store context.
pub trait AsContext {
    fn as_context(&self) -> StoreContext<'_>;
}

/// Types that can lend out an exclusive store context.
pub trait AsContextMut: AsContext {
    fn as_context_mut(&mut self) -> StoreContextMut<'_>;
}

impl AsContext for Store {
    fn as_context(&self) -> StoreContext<'_> {
        StoreContext(self.inner.as_context())
    }
}

impl AsContextMut for Store {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        StoreContextMut(self.inner.as_context_mut())
    }
}

impl AsContext for StoreContext<'_> {
    fn as_context(&self) -> StoreContext<'_> {
        StoreContext(self.0.as_context())
    }
}

impl AsContext for StoreContextMut<'_> {
    fn as_context(&self) -> StoreContext<'_> {
        StoreContext(self.0.as_context())
    }
}

impl AsContextMut for StoreContextMut<'_> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        StoreContextMut(self.0.as_context_mut())
    }
}

impl<T: AsContext + ?Sized> AsContext for &T {
    fn as_context(&self) -> StoreContext<'_> {
        T::as_context(*self)
    }
}

impl<T: AsContext + ?Sized> AsContext for &mut T {
    fn as_context(&self) -> StoreContext<'_> {
        T::as_context(*self)
    }
}

impl<T: AsContextMut + ?Sized> AsContextMut for &mut T {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        T::as_context_mut(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn fuel_engine() -> Engine {
        let mut config = Config::new();
        config.consume_fuel(true);
        Engine::new(config).unwrap()
    }

    #[test]
    fn test_defaults_without_fuel_or_interrupts() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let mut cx = store.context();

        assert!(cx.fuel_consumed().is_none());
        assert!(cx.interrupt_handle().is_none());
        assert!(cx.add_fuel(10).unwrap_err().is_config());
        cx.gc();
    }

    #[test]
    fn test_fuel_accounting() {
        let engine = fuel_engine();
        let mut store = Store::new(&engine);
        let mut cx = store.context();

        assert_eq!(cx.fuel_consumed(), Some(0));
        cx.add_fuel(100).unwrap();
        cx.add_fuel(50).unwrap();
        assert_eq!(cx.fuel_consumed(), Some(0));
    }

    #[test]
    fn test_from_settings_applies_initial_fuel() {
        let engine = fuel_engine();
        let settings = StoreSettings {
            initial_fuel: Some(1_000),
        };
        let mut store = Store::from_settings(&engine, &settings).unwrap();
        assert_eq!(store.context().fuel_consumed(), Some(0));

        let err = Store::from_settings(&Engine::default(), &settings).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_interrupt_handle_is_shareable() {
        let mut config = Config::new();
        config.interruptable(true);
        let engine = Engine::new(config).unwrap();
        let mut store = Store::new(&engine);

        let handle = store.context().interrupt_handle().unwrap();
        let cloned = handle.clone();
        std::thread::spawn(move || cloned.interrupt()).join().unwrap();
        assert!(format!("{handle:?}").contains("pending: true"));
    }

    #[test]
    fn test_set_wasi_replaces() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let mut cx = store.context();

        let mut first = WasiConfig::new();
        first.argv(&["first"]);
        cx.set_wasi(first).unwrap();

        let mut second = WasiConfig::new();
        second.inherit_env();
        cx.set_wasi(second).unwrap();
    }

    #[test]
    fn test_store_keeps_engine() {
        let engine = Engine::default();
        let store = Store::new(&engine);
        assert!(Engine::same(store.engine(), &engine));
    }
}
