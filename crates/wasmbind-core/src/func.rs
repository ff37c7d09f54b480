//! Functions: host-defined callbacks and wasm exports behind one handle.

use wasmbind_common::Error;

use crate::store::{StoreContext, StoreContextMut, StoreData};
use crate::{AsContext, AsContextMut, Extern, FuncType, Trap, TrapError, TrapResult, Val};

/// A function owned by a [`Store`](crate::Store).
///
/// The handle is a plain copyable token: it does not keep the function alive
/// and must only be used with the store that created it.
#[derive(Debug, Clone, Copy)]
pub struct Func(pub(crate) wasmtime::Func);

impl Func {
    /// Define a host function in the given store.
    ///
    /// `callback` receives the arguments and a result slice pre-filled with
    /// zero values of the declared result kinds. Returning a [`Trap`] faults
    /// the calling wasm code.
    pub fn new<F>(mut ctx: impl AsContextMut, ty: FuncType, callback: F) -> Self
    where
        F: Fn(&mut Caller<'_>, &[Val], &mut [Val]) -> Result<(), Trap> + Send + Sync + 'static,
    {
        let mut cx = ctx.as_context_mut();
        let wasm_ty = ty.to_wasmtime(cx.0.engine());
        Self(wasmtime::Func::new(
            &mut cx.0,
            wasm_ty,
            host_trampoline(ty, callback),
        ))
    }

    pub fn ty(&self, ctx: impl AsContext) -> FuncType {
        let cx = ctx.as_context();
        FuncType::from_wasmtime(&self.0.ty(&cx.0))
    }

    /// Invoke the function.
    ///
    /// # Errors
    ///
    /// A type mismatch between `params` and the signature is an [`Error`];
    /// a fault while running is a [`Trap`].
    pub fn call(&self, mut ctx: impl AsContextMut, params: &[Val]) -> TrapResult<Vec<Val>> {
        let mut cx = ctx.as_context_mut();
        let mut scope = wasmtime::RootScope::new(&mut cx.0);

        let ty = self.0.ty(&scope);
        let args = params
            .iter()
            .map(|p| p.to_wasmtime(&mut scope))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| Error::type_mismatch(format!("Invalid call argument: {e:#}")))?;
        let mut results: Vec<wasmtime::Val> =
            ty.results().map(|_| wasmtime::Val::I32(0)).collect();

        self.0
            .call(&mut scope, &args, &mut results)
            .map_err(|e| TrapError::from_engine_error(e, Error::type_mismatch))?;

        Ok(results
            .iter()
            .map(|r| Val::from_wasmtime(&scope, r))
            .collect())
    }
}

/// Context handed to host callbacks.
///
/// Gives access to the calling instance's exports and to the store the call
/// runs in.
pub struct Caller<'a> {
    pub(crate) inner: wasmtime::Caller<'a, StoreData>,
}

impl Caller<'_> {
    /// Look up an export of the calling instance.
    ///
    /// Returns `None` when the caller is not a wasm instance (for example a
    /// direct host call) or has no export with this name.
    pub fn get_export(&mut self, name: &str) -> Option<Extern> {
        self.inner.get_export(name).and_then(Extern::from_wasmtime)
    }
}

impl AsContext for Caller<'_> {
    fn as_context(&self) -> StoreContext<'_> {
        StoreContext(wasmtime::AsContext::as_context(&self.inner))
    }
}

impl AsContextMut for Caller<'_> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_> {
        StoreContextMut(wasmtime::AsContextMut::as_context_mut(&mut self.inner))
    }
}

/// Adapt a host callback to the engine's untyped calling convention.
pub(crate) fn host_trampoline<F>(
    ty: FuncType,
    callback: F,
) -> impl Fn(
    wasmtime::Caller<'_, StoreData>,
    &[wasmtime::Val],
    &mut [wasmtime::Val],
) -> anyhow::Result<()>
+ Send
+ Sync
+ 'static
where
    F: Fn(&mut Caller<'_>, &[Val], &mut [Val]) -> Result<(), Trap> + Send + Sync + 'static,
{
    move |caller: wasmtime::Caller<'_, StoreData>,
          params: &[wasmtime::Val],
          results: &mut [wasmtime::Val]|
          -> anyhow::Result<()> {
        let mut caller = Caller { inner: caller };
        let args: Vec<Val> = params
            .iter()
            .map(|p| Val::from_wasmtime(&caller.inner, p))
            .collect();
        let mut outs: Vec<Val> = ty.results().iter().map(|t| Val::default_for(*t)).collect();

        callback(&mut caller, &args, &mut outs)?;

        for ((slot, out), expected) in results.iter_mut().zip(&outs).zip(ty.results()) {
            if out.ty() != *expected {
                return Err(Trap::new(format!(
                    "host function returned {} where {expected} was declared",
                    out.ty()
                ))
                .into());
            }
            *slot = out.to_wasmtime(&mut caller.inner)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Store, ValType};

    fn add_func(store: &mut Store) -> Func {
        Func::new(
            store,
            FuncType::new([ValType::I32, ValType::I32], [ValType::I32]),
            |_caller, params, results| {
                results[0] = Val::I32(params[0].unwrap_i32() + params[1].unwrap_i32());
                Ok(())
            },
        )
    }

    #[test]
    fn test_host_func_call() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let add = add_func(&mut store);

        let results = add.call(&mut store, &[Val::I32(2), Val::I32(40)]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].unwrap_i32(), 42);
    }

    #[test]
    fn test_host_func_type() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let add = add_func(&mut store);

        let ty = add.ty(&store);
        assert_eq!(ty.params(), &[ValType::I32, ValType::I32]);
        assert_eq!(ty.results(), &[ValType::I32]);
    }

    #[test]
    fn test_call_with_wrong_arguments_is_error() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let add = add_func(&mut store);

        let err = add.call(&mut store, &[Val::I32(1)]).unwrap_err();
        assert!(!err.is_trap());
        assert!(err.error().unwrap().is_type());

        let err = add
            .call(&mut store, &[Val::I64(1), Val::I32(2)])
            .unwrap_err();
        assert!(err.error().unwrap().is_type());
    }

    #[test]
    fn test_host_trap_propagates() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let fail = Func::new(
            &mut store,
            FuncType::new([], []),
            |_caller, _params, _results| Err(Trap::new("host said no")),
        );

        let err = fail.call(&mut store, &[]).unwrap_err();
        let trap = err.trap().unwrap();
        assert!(trap.message().contains("host said no"));
    }

    #[test]
    fn test_wrong_result_kind_traps() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let bad = Func::new(
            &mut store,
            FuncType::new([], [ValType::I32]),
            |_caller, _params, results| {
                results[0] = Val::I64(1);
                Ok(())
            },
        );

        let err = bad.call(&mut store, &[]).unwrap_err();
        assert!(err.is_trap());
    }

    #[test]
    fn test_caller_without_instance_has_no_exports() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);
        let probe = Func::new(
            &mut store,
            FuncType::new([], [ValType::I32]),
            |caller, _params, results| {
                results[0] = Val::I32(i32::from(caller.get_export("memory").is_some()));
                Ok(())
            },
        );

        let results = probe.call(&mut store, &[]).unwrap();
        assert_eq!(results[0].unwrap_i32(), 0);
    }
}
