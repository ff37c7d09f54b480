//! Instantiated modules.
//!
//! Instantiation resolves imports positionally: the `n`th import of the
//! module is satisfied by the `n`th [`Extern`]. Use a
//! [`Linker`](crate::Linker) for name-based resolution.

use tracing::{debug, instrument};

use wasmbind_common::Error;

use crate::{
    AsContextMut, ExportType, Extern, InstanceType, Module, TrapError, TrapResult,
};

/// An instantiated module, owned by a store.
#[derive(Debug, Clone, Copy)]
pub struct Instance(pub(crate) wasmtime::Instance);

impl Instance {
    /// Instantiate `module` with imports given in declaration order.
    ///
    /// # Errors
    ///
    /// A wrong import count or kind, or any other link failure, is an
    /// [`Error`]; a trap raised by the start function is a
    /// [`Trap`](crate::Trap).
    #[instrument(skip_all, fields(imports = imports.len()))]
    pub fn new(mut ctx: impl AsContextMut, module: &Module, imports: &[Extern]) -> TrapResult<Self> {
        let ty = module.ty();
        let expected = ty.imports();
        if expected.len() != imports.len() {
            return Err(Error::link(format!(
                "expected {} imports, found {}",
                expected.len(),
                imports.len()
            ))
            .into());
        }

        let mut resolved = Vec::with_capacity(imports.len());
        for (import, item) in expected.iter().zip(imports) {
            let wanted = import.ty().kind_name();
            match item.to_wasmtime() {
                Some(ext) if item.kind_name() == wanted => resolved.push(ext),
                _ => {
                    return Err(Error::link(format!(
                        "import `{}::{}` expects a {wanted}, found a {}",
                        import.module(),
                        import.name(),
                        item.kind_name()
                    ))
                    .into());
                }
            }
        }

        let mut cx = ctx.as_context_mut();
        let instance = wasmtime::Instance::new(&mut cx.0, module.inner(), &resolved)
            .map_err(|e| TrapError::from_engine_error(e, Error::link))?;

        debug!("Module instantiated");
        Ok(Self(instance))
    }

    /// Export named `name`, if any.
    pub fn get(&self, mut ctx: impl AsContextMut, name: &str) -> Option<Extern> {
        let mut cx = ctx.as_context_mut();
        self.0.get_export(&mut cx.0, name).and_then(Extern::from_wasmtime)
    }

    /// The `index`th export and its name, in declaration order.
    ///
    /// Indices count only exports with an [`Extern`] counterpart, the same
    /// ones listed by [`ty`](Self::ty); shared memories and tags are skipped.
    pub fn get_nth(&self, mut ctx: impl AsContextMut, index: usize) -> Option<(String, Extern)> {
        self.exports(&mut ctx).into_iter().nth(index)
    }

    pub fn ty(&self, mut ctx: impl AsContextMut) -> InstanceType {
        let exports = self
            .exports(&mut ctx)
            .into_iter()
            .map(|(name, ext)| {
                let ty = ext.ty(&mut ctx);
                ExportType::new(name, ty)
            })
            .collect();
        InstanceType::new(exports)
    }

    fn exports(&self, ctx: &mut impl AsContextMut) -> Vec<(String, Extern)> {
        let mut cx = ctx.as_context_mut();
        self.0
            .exports(&mut cx.0)
            .filter_map(|export| {
                let name = export.name().to_owned();
                Extern::from_wasmtime(export.into_extern()).map(|ext| (name, ext))
            })
            .collect()
    }
}
