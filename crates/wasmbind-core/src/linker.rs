//! Name-based import resolution.
//!
//! A [`Linker`] maps `(module, name)` pairs to items and instantiates modules
//! by looking their imports up by name. Host functions registered with
//! [`Linker::func_new`] belong to no store and can be reused by every store
//! of the linker's engine.

use tracing::{debug, instrument};

use wasmbind_common::{Error, Result};

use crate::func::host_trampoline;
use crate::store::StoreData;
use crate::{
    AsContext, AsContextMut, Caller, Engine, Extern, Func, FuncType, Instance, Module, Trap,
    TrapError, TrapResult, Val,
};

/// Registry of named items used to satisfy module imports.
pub struct Linker {
    inner: wasmtime::Linker<StoreData>,
}

impl Linker {
    pub fn new(engine: &Engine) -> Self {
        Self {
            inner: wasmtime::Linker::new(engine.inner()),
        }
    }

    /// Allow later definitions to replace earlier ones with the same name.
    /// Off by default, in which case redefinition is an error.
    pub fn allow_shadowing(&mut self, allow: bool) -> &mut Self {
        self.inner.allow_shadowing(allow);
        self
    }

    /// Define `module::name` as a store-owned item.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name (unless shadowing is allowed), or when the
    /// item is an instance or module, which cannot be defined by name.
    pub fn define(
        &mut self,
        ctx: impl AsContext,
        module: &str,
        name: &str,
        item: impl Into<Extern>,
    ) -> Result<()> {
        let item = item.into();
        let Some(ext) = item.to_wasmtime() else {
            return Err(Error::link(format!(
                "cannot define a {} as `{module}::{name}`",
                item.kind_name()
            )));
        };

        let cx = ctx.as_context();
        self.inner
            .define(&cx.0, module, name, ext)
            .map_err(|e| Error::link(format!("{e:#}")))?;
        Ok(())
    }

    /// Define `module::name` as a host function usable from any store.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name unless shadowing is allowed.
    pub fn func_new<F>(&mut self, module: &str, name: &str, ty: FuncType, callback: F) -> Result<()>
    where
        F: Fn(&mut Caller<'_>, &[Val], &mut [Val]) -> Result<(), Trap> + Send + Sync + 'static,
    {
        let wasm_ty = ty.to_wasmtime(self.inner.engine());
        self.inner
            .func_new(module, name, wasm_ty, host_trampoline(ty, callback))
            .map_err(|e| Error::link(format!("{e:#}")))?;
        Ok(())
    }

    /// Define the WASI preview1 imports.
    ///
    /// Each store supplies its own configuration through
    /// [`StoreContextMut::set_wasi`](crate::StoreContextMut::set_wasi); stores
    /// without one get a context with no arguments, environment or stdio.
    ///
    /// # Errors
    ///
    /// Fails if WASI names are already defined and shadowing is off.
    pub fn define_wasi(&mut self) -> Result<()> {
        wasmtime_wasi::preview1::add_to_linker_sync(&mut self.inner, StoreData::wasi_mut)
            .map_err(|e| Error::link(format!("Failed to define WASI imports: {e:#}")))?;
        debug!("WASI preview1 imports defined");
        Ok(())
    }

    /// Define every export of `instance` under the module name `name`.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name unless shadowing is allowed.
    pub fn define_instance(
        &mut self,
        mut ctx: impl AsContextMut,
        name: &str,
        instance: &Instance,
    ) -> Result<()> {
        let mut cx = ctx.as_context_mut();
        self.inner
            .instance(&mut cx.0, name, instance.0)
            .map_err(|e| Error::link(format!("{e:#}")))?;
        Ok(())
    }

    /// Instantiate `module`, resolving each import by name.
    ///
    /// # Errors
    ///
    /// A missing or mistyped import is an [`Error`]; a trap in the start
    /// function is a [`Trap`].
    #[instrument(skip_all, fields(module = module.name().unwrap_or("<anonymous>")))]
    pub fn instantiate(&self, mut ctx: impl AsContextMut, module: &Module) -> TrapResult<Instance> {
        let mut cx = ctx.as_context_mut();
        let instance = self
            .inner
            .instantiate(&mut cx.0, module.inner())
            .map_err(|e| TrapError::from_engine_error(e, Error::link))?;
        debug!("Module instantiated through linker");
        Ok(Instance(instance))
    }

    /// Define the exports of `module` under `name`.
    ///
    /// Reactors are instantiated once (running `_initialize` if present).
    /// For commands, each exported function call starts a fresh instance.
    ///
    /// # Errors
    ///
    /// As for [`instantiate`](Self::instantiate), plus duplicate names.
    pub fn module(&mut self, mut ctx: impl AsContextMut, name: &str, module: &Module) -> TrapResult<()> {
        let mut cx = ctx.as_context_mut();
        self.inner
            .module(&mut cx.0, name, module.inner())
            .map_err(|e| TrapError::from_engine_error(e, Error::link))?;
        Ok(())
    }

    /// Look up a defined item.
    pub fn get(&self, mut ctx: impl AsContextMut, module: &str, name: &str) -> Option<Extern> {
        let mut cx = ctx.as_context_mut();
        self.inner
            .get(&mut cx.0, module, name)
            .and_then(Extern::from_wasmtime)
    }

    /// The default export of module `name`: its `""` export, then `_start`,
    /// then a function that does nothing.
    ///
    /// # Errors
    ///
    /// Fails if the default export is not a function.
    pub fn get_default(&self, mut ctx: impl AsContextMut, name: &str) -> Result<Func> {
        let mut cx = ctx.as_context_mut();
        self.inner
            .get_default(&mut cx.0, name)
            .map(Func)
            .map_err(|e| Error::link(format!("{e:#}")))
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Global, GlobalType, Mutability, Store, ValType};

    const IMPORTS_GLOBAL: &str = r#"
        (module
          (import "env" "base" (global $base i32))
          (func (export "read") (result i32) global.get $base))
    "#;

    fn const_global(store: &mut Store, value: i32) -> Global {
        Global::new(
            store,
            GlobalType::new(ValType::I32, Mutability::Const),
            Val::I32(value),
        )
        .unwrap()
    }

    fn call_read(linker: &Linker, store: &mut Store, module: &Module) -> i32 {
        let instance = linker.instantiate(&mut *store, module).unwrap();
        let read = instance
            .get(&mut *store, "read")
            .and_then(Extern::into_func)
            .unwrap();
        read.call(&mut *store, &[]).unwrap()[0].unwrap_i32()
    }

    #[test]
    fn test_define_and_instantiate() {
        let engine = Engine::default();
        let module = Module::new(&engine, IMPORTS_GLOBAL).unwrap();
        let mut store = Store::new(&engine);
        let mut linker = Linker::new(&engine);

        let base = const_global(&mut store, 5);
        linker.define(&store, "env", "base", base).unwrap();
        assert_eq!(call_read(&linker, &mut store, &module), 5);
        assert!(linker.get(&mut store, "env", "base").is_some());
        assert!(linker.get(&mut store, "env", "other").is_none());
    }

    #[test]
    fn test_duplicate_definition_needs_shadowing() {
        let engine = Engine::default();
        let module = Module::new(&engine, IMPORTS_GLOBAL).unwrap();
        let mut store = Store::new(&engine);
        let mut linker = Linker::new(&engine);

        let first = const_global(&mut store, 1);
        let second = const_global(&mut store, 2);
        linker.define(&store, "env", "base", first).unwrap();
        assert!(linker.define(&store, "env", "base", second).unwrap_err().is_link());

        linker.allow_shadowing(true);
        linker.define(&store, "env", "base", second).unwrap();
        assert_eq!(call_read(&linker, &mut store, &module), 2);
    }

    #[test]
    fn test_missing_import_is_link_error() {
        let engine = Engine::default();
        let module = Module::new(&engine, IMPORTS_GLOBAL).unwrap();
        let mut store = Store::new(&engine);
        let linker = Linker::new(&engine);

        let err = linker.instantiate(&mut store, &module).unwrap_err();
        assert!(!err.is_trap());
        assert!(err.error().unwrap().is_link());
    }

    #[test]
    fn test_host_func_shared_across_stores() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            r#"(module
                 (import "host" "seven" (func $seven (result i32)))
                 (func (export "run") (result i32) call $seven))"#,
        )
        .unwrap();
        let mut linker = Linker::new(&engine);
        linker
            .func_new(
                "host",
                "seven",
                FuncType::new([], [ValType::I32]),
                |_caller, _params, results| {
                    results[0] = Val::I32(7);
                    Ok(())
                },
            )
            .unwrap();

        for _ in 0..2 {
            let mut store = Store::new(&engine);
            let instance = linker.instantiate(&mut store, &module).unwrap();
            let run = instance
                .get(&mut store, "run")
                .and_then(Extern::into_func)
                .unwrap();
            assert_eq!(run.call(&mut store, &[]).unwrap()[0].unwrap_i32(), 7);
        }
    }

    #[test]
    fn test_define_rejects_modules() {
        let engine = Engine::default();
        let module = Module::new(&engine, "(module)").unwrap();
        let store = Store::new(&engine);
        let mut linker = Linker::new(&engine);

        let err = linker.define(&store, "env", "m", module).unwrap_err();
        assert!(err.is_link());
    }

    #[test]
    fn test_get_default() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            r#"(module (func (export "_start")))"#,
        )
        .unwrap();
        let mut store = Store::new(&engine);
        let mut linker = Linker::new(&engine);

        linker.module(&mut store, "app", &module).unwrap();
        let start = linker.get_default(&mut store, "app").unwrap();
        assert!(start.call(&mut store, &[]).unwrap().is_empty());

        let noop = linker.get_default(&mut store, "missing").unwrap();
        assert!(noop.ty(&store).params().is_empty());
        assert!(noop.call(&mut store, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_define_wasi_twice_needs_shadowing() {
        let engine = Engine::default();
        let mut linker = Linker::new(&engine);
        linker.define_wasi().unwrap();
        assert!(linker.define_wasi().unwrap_err().is_link());
    }
}
