//! Globals, tables, memories and the `Extern` union of importable items.

use wasmbind_common::{Error, Result};

use crate::types::narrow;
use crate::{
    AsContext, AsContextMut, ExternType, Func, GlobalType, Instance, MemoryType, Module,
    TableType, Val, ValType,
};

/// Anything that can be imported into or exported from an instance.
#[derive(Debug, Clone)]
pub enum Extern {
    Func(Func),
    Global(Global),
    Memory(Memory),
    Table(Table),
    Instance(Instance),
    Module(Module),
}

impl Extern {
    /// Type of the item. Instances are inspected through the store, hence
    /// the mutable context.
    pub fn ty(&self, mut ctx: impl AsContextMut) -> ExternType {
        match self {
            Self::Func(f) => ExternType::Func(f.ty(&ctx)),
            Self::Global(g) => ExternType::Global(g.ty(&ctx)),
            Self::Memory(m) => ExternType::Memory(m.ty(&ctx)),
            Self::Table(t) => ExternType::Table(t.ty(&ctx)),
            Self::Instance(i) => ExternType::Instance(i.ty(ctx.as_context_mut())),
            Self::Module(m) => ExternType::Module(m.ty()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Func(_) => "func",
            Self::Global(_) => "global",
            Self::Memory(_) => "memory",
            Self::Table(_) => "table",
            Self::Instance(_) => "instance",
            Self::Module(_) => "module",
        }
    }

    pub fn as_func(&self) -> Option<&Func> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<&Global> {
        match self {
            Self::Global(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&Memory> {
        match self {
            Self::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_func(self) -> Option<Func> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_global(self) -> Option<Global> {
        match self {
            Self::Global(g) => Some(g),
            _ => None,
        }
    }

    pub fn into_memory(self) -> Option<Memory> {
        match self {
            Self::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_instance(self) -> Option<Instance> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn into_module(self) -> Option<Module> {
        match self {
            Self::Module(m) => Some(m),
            _ => None,
        }
    }

    /// `None` for instances and modules, which the engine cannot import
    /// directly.
    pub(crate) fn to_wasmtime(&self) -> Option<wasmtime::Extern> {
        match self {
            Self::Func(f) => Some(f.0.into()),
            Self::Global(g) => Some(g.0.into()),
            Self::Memory(m) => Some(m.0.into()),
            Self::Table(t) => Some(t.0.into()),
            Self::Instance(_) | Self::Module(_) => None,
        }
    }

    pub(crate) fn from_wasmtime(ext: wasmtime::Extern) -> Option<Self> {
        match ext {
            wasmtime::Extern::Func(f) => Some(Self::Func(Func(f))),
            wasmtime::Extern::Global(g) => Some(Self::Global(Global(g))),
            wasmtime::Extern::Memory(m) => Some(Self::Memory(Memory(m))),
            wasmtime::Extern::Table(t) => Some(Self::Table(Table(t))),
            _ => None,
        }
    }
}

impl From<Func> for Extern {
    fn from(f: Func) -> Self {
        Self::Func(f)
    }
}

impl From<Global> for Extern {
    fn from(g: Global) -> Self {
        Self::Global(g)
    }
}

impl From<Memory> for Extern {
    fn from(m: Memory) -> Self {
        Self::Memory(m)
    }
}

impl From<Table> for Extern {
    fn from(t: Table) -> Self {
        Self::Table(t)
    }
}

impl From<Instance> for Extern {
    fn from(i: Instance) -> Self {
        Self::Instance(i)
    }
}

impl From<Module> for Extern {
    fn from(m: Module) -> Self {
        Self::Module(m)
    }
}

/// A global variable owned by a store.
#[derive(Debug, Clone, Copy)]
pub struct Global(pub(crate) wasmtime::Global);

impl Global {
    /// # Errors
    ///
    /// Fails if `init` does not match the content type.
    pub fn new(mut ctx: impl AsContextMut, ty: GlobalType, init: Val) -> Result<Self> {
        check_kind(ty.content, &init, "global")?;

        let mut cx = ctx.as_context_mut();
        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let init = init
            .to_wasmtime(&mut scope)
            .map_err(|e| Error::type_mismatch(format!("{e:#}")))?;
        wasmtime::Global::new(&mut scope, ty.to_wasmtime(), init)
            .map(Self)
            .map_err(|e| Error::type_mismatch(format!("Failed to create global: {e:#}")))
    }

    pub fn ty(&self, ctx: impl AsContext) -> GlobalType {
        let cx = ctx.as_context();
        GlobalType::from_wasmtime(&self.0.ty(&cx.0))
    }

    pub fn get(&self, mut ctx: impl AsContextMut) -> Val {
        let mut cx = ctx.as_context_mut();
        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let val = self.0.get(&mut scope);
        Val::from_wasmtime(&scope, &val)
    }

    /// # Errors
    ///
    /// Fails if the global is immutable or `val` has the wrong kind.
    pub fn set(&self, mut ctx: impl AsContextMut, val: Val) -> Result<()> {
        let mut cx = ctx.as_context_mut();
        let ty = GlobalType::from_wasmtime(&self.0.ty(&cx.0));
        if !ty.is_mutable() {
            return Err(Error::ImmutableGlobal);
        }
        check_kind(ty.content, &val, "global")?;

        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let val = val
            .to_wasmtime(&mut scope)
            .map_err(|e| Error::type_mismatch(format!("{e:#}")))?;
        self.0
            .set(&mut scope, val)
            .map_err(|e| Error::type_mismatch(format!("{e:#}")))
    }
}

/// A table of references owned by a store.
#[derive(Debug, Clone, Copy)]
pub struct Table(pub(crate) wasmtime::Table);

impl Table {
    /// Create a table with every slot set to `init`.
    ///
    /// # Errors
    ///
    /// Fails if the element type is not a reference type, `init` has a
    /// different kind, or the store refuses the allocation.
    pub fn new(mut ctx: impl AsContextMut, ty: TableType, init: Val) -> Result<Self> {
        let wasm_ty = ty.to_wasmtime().ok_or_else(|| {
            Error::type_mismatch(format!(
                "table element type must be a reference type, found {}",
                ty.element
            ))
        })?;

        let mut cx = ctx.as_context_mut();
        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let init = table_ref(&mut scope, ty.element, &init)?;
        wasmtime::Table::new(&mut scope, wasm_ty, init)
            .map(Self)
            .map_err(|e| Error::resource_limit(format!("Failed to create table: {e:#}")))
    }

    pub fn ty(&self, ctx: impl AsContext) -> TableType {
        let cx = ctx.as_context();
        TableType::from_wasmtime(&self.0.ty(&cx.0))
    }

    /// Element at `index`, or `None` when out of bounds.
    pub fn get(&self, mut ctx: impl AsContextMut, index: u32) -> Option<Val> {
        let mut cx = ctx.as_context_mut();
        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let r = self.0.get(&mut scope, u64::from(index))?;
        Some(Val::from_ref(&scope, &r))
    }

    /// # Errors
    ///
    /// Fails if `index` is out of bounds or `val` has the wrong kind.
    pub fn set(&self, mut ctx: impl AsContextMut, index: u32, val: Val) -> Result<()> {
        let mut cx = ctx.as_context_mut();
        let size = narrow(self.0.size(&cx.0));
        if index >= size {
            return Err(Error::OutOfBounds { index, size });
        }
        let element = ValType::from_ref_type(self.0.ty(&cx.0).element());

        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let val = table_ref(&mut scope, element, &val)?;
        self.0
            .set(&mut scope, u64::from(index), val)
            .map_err(|e| Error::type_mismatch(format!("{e:#}")))
    }

    /// Current number of elements, clamped to `u32::MAX`.
    pub fn size(&self, ctx: impl AsContext) -> u32 {
        let cx = ctx.as_context();
        narrow(self.0.size(&cx.0))
    }

    /// Grow by `delta` elements set to `init`, returning the previous size.
    ///
    /// # Errors
    ///
    /// Fails if growth would exceed the maximum, or `init` has the wrong
    /// kind. The table is unchanged on failure.
    pub fn grow(&self, mut ctx: impl AsContextMut, delta: u32, init: Val) -> Result<u32> {
        let mut cx = ctx.as_context_mut();
        let element = ValType::from_ref_type(self.0.ty(&cx.0).element());

        let mut scope = wasmtime::RootScope::new(&mut cx.0);
        let init = table_ref(&mut scope, element, &init)?;
        self.0
            .grow(&mut scope, u64::from(delta), init)
            .map(narrow)
            .map_err(|e| Error::resource_limit(format!("Failed to grow table: {e:#}")))
    }
}

/// A linear memory owned by a store.
#[derive(Debug, Clone, Copy)]
pub struct Memory(pub(crate) wasmtime::Memory);

impl Memory {
    /// # Errors
    ///
    /// Fails if the store refuses the allocation.
    pub fn new(mut ctx: impl AsContextMut, ty: MemoryType) -> Result<Self> {
        let mut cx = ctx.as_context_mut();
        wasmtime::Memory::new(&mut cx.0, ty.to_wasmtime())
            .map(Self)
            .map_err(|e| Error::resource_limit(format!("Failed to create memory: {e:#}")))
    }

    pub fn ty(&self, ctx: impl AsContext) -> MemoryType {
        let cx = ctx.as_context();
        MemoryType::from_wasmtime(&self.0.ty(&cx.0))
    }

    /// Contents of the memory.
    ///
    /// The view borrows the context, so it cannot outlive a later `grow`.
    pub fn data<'a, C: AsContext + ?Sized>(&self, ctx: &'a C) -> &'a [u8] {
        self.0.data(ctx.as_context().0)
    }

    pub fn data_mut<'a, C: AsContextMut + ?Sized>(&self, ctx: &'a mut C) -> &'a mut [u8] {
        self.0.data_mut(ctx.as_context_mut().0)
    }

    /// Size in bytes.
    pub fn data_size(&self, ctx: impl AsContext) -> usize {
        let cx = ctx.as_context();
        self.0.data_size(&cx.0)
    }

    /// Size in 64KiB pages, clamped to `u32::MAX`.
    pub fn size(&self, ctx: impl AsContext) -> u32 {
        let cx = ctx.as_context();
        narrow(self.0.size(&cx.0))
    }

    /// Grow by `delta` pages, returning the previous size in pages.
    ///
    /// # Errors
    ///
    /// Fails if growth would exceed the maximum. The memory is unchanged on
    /// failure.
    pub fn grow(&self, mut ctx: impl AsContextMut, delta: u32) -> Result<u32> {
        let mut cx = ctx.as_context_mut();
        self.0
            .grow(&mut cx.0, u64::from(delta))
            .map(narrow)
            .map_err(|e| Error::resource_limit(format!("Failed to grow memory: {e:#}")))
    }
}

fn check_kind(expected: ValType, val: &Val, what: &str) -> Result<()> {
    if val.ty() == expected {
        Ok(())
    } else {
        Err(Error::type_mismatch(format!(
            "{what} of type {expected} cannot hold a {} value",
            val.ty()
        )))
    }
}

fn table_ref(
    store: impl wasmtime::AsContextMut,
    element: ValType,
    val: &Val,
) -> Result<wasmtime::Ref> {
    check_kind(element, val, "table")?;
    match val.to_ref(store) {
        Some(r) => r.map_err(|e| Error::type_mismatch(format!("{e:#}"))),
        None => Err(Error::type_mismatch(format!(
            "{} is not a reference value",
            val.ty()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Limits, Mutability, Store};

    #[test]
    fn test_global_get_set() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let g = Global::new(
            &mut store,
            GlobalType::new(ValType::I64, Mutability::Var),
            Val::I64(7),
        )
        .unwrap();
        assert_eq!(g.get(&mut store).unwrap_i64(), 7);

        g.set(&mut store, Val::I64(9)).unwrap();
        assert_eq!(g.get(&mut store).unwrap_i64(), 9);

        let err = g.set(&mut store, Val::I32(1)).unwrap_err();
        assert!(err.is_type());
        assert_eq!(g.ty(&store).content, ValType::I64);
    }

    #[test]
    fn test_immutable_global_rejects_set() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let g = Global::new(
            &mut store,
            GlobalType::new(ValType::F32, Mutability::Const),
            Val::F32(1.0),
        )
        .unwrap();
        let err = g.set(&mut store, Val::F32(2.0)).unwrap_err();
        assert!(matches!(err, Error::ImmutableGlobal));
        assert_eq!(g.get(&mut store).unwrap_f32(), 1.0);
    }

    #[test]
    fn test_global_init_kind_checked() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let err = Global::new(
            &mut store,
            GlobalType::new(ValType::I32, Mutability::Const),
            Val::F64(0.0),
        )
        .unwrap_err();
        assert!(err.is_type());
    }

    #[test]
    fn test_table_bounds_and_growth() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = TableType::new(ValType::FuncRef, Limits::new(2, Some(4)));
        let table = Table::new(&mut store, ty, Val::FuncRef(None)).unwrap();
        assert_eq!(table.size(&store), 2);
        assert!(table.get(&mut store, 1).unwrap().unwrap_funcref().is_none());
        assert!(table.get(&mut store, 2).is_none());

        let err = table.set(&mut store, 2, Val::FuncRef(None)).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { index: 2, size: 2 }));

        assert_eq!(table.grow(&mut store, 2, Val::FuncRef(None)).unwrap(), 2);
        assert_eq!(table.size(&store), 4);
        assert!(table.grow(&mut store, 1, Val::FuncRef(None)).is_err());
        assert_eq!(table.size(&store), 4);
    }

    #[test]
    fn test_table_rejects_numeric_elements() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let ty = TableType::new(ValType::I32, Limits::at_least(1));
        assert!(Table::new(&mut store, ty, Val::I32(0)).unwrap_err().is_type());

        let ty = TableType::new(ValType::FuncRef, Limits::at_least(1));
        let err = Table::new(&mut store, ty, Val::ExternRef(None)).unwrap_err();
        assert!(err.is_type());
    }

    #[test]
    fn test_memory_growth() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let memory = Memory::new(&mut store, MemoryType::new(Limits::new(1, Some(2)))).unwrap();
        assert_eq!(memory.size(&store), 1);
        assert_eq!(memory.data_size(&store), 65_536);

        memory.data_mut(&mut store)[10] = 42;
        assert_eq!(memory.data(&store)[10], 42);

        assert_eq!(memory.grow(&mut store, 1).unwrap(), 1);
        assert!(memory.grow(&mut store, 1).unwrap_err().is_resource_limit());
        assert_eq!(memory.size(&store), 2);
        assert_eq!(memory.data(&store)[10], 42);
    }

    #[test]
    fn test_extern_kinds() {
        let engine = Engine::default();
        let mut store = Store::new(&engine);

        let memory = Memory::new(&mut store, MemoryType::new(Limits::at_least(1))).unwrap();
        let ext = Extern::from(memory);
        assert_eq!(ext.kind_name(), "memory");
        assert!(ext.as_memory().is_some());
        assert!(ext.as_func().is_none());
        assert_eq!(
            ext.ty(&mut store),
            ExternType::Memory(MemoryType::new(Limits::at_least(1)))
        );
        assert!(ext.into_memory().is_some());
    }
}
