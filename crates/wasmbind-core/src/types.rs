//! Static type descriptors.
//!
//! Descriptors are plain owned values, independent of any store. Borrowed
//! views (`&[ValType]`, `&[ImportType]`, `&ExternType`) are handed out by
//! the owning descriptor and cannot outlive it.

use std::fmt;

/// Kind of a WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    V128,
    ExternRef,
    FuncRef,
}

impl ValType {
    /// Returns `true` for the numeric and vector kinds.
    pub fn is_num(self) -> bool {
        !self.is_ref()
    }

    /// Returns `true` for `externref` and `funcref`.
    pub fn is_ref(self) -> bool {
        matches!(self, Self::ExternRef | Self::FuncRef)
    }

    pub(crate) fn to_wasmtime(self) -> wasmtime::ValType {
        match self {
            Self::I32 => wasmtime::ValType::I32,
            Self::I64 => wasmtime::ValType::I64,
            Self::F32 => wasmtime::ValType::F32,
            Self::F64 => wasmtime::ValType::F64,
            Self::V128 => wasmtime::ValType::V128,
            Self::ExternRef => wasmtime::ValType::EXTERNREF,
            Self::FuncRef => wasmtime::ValType::FUNCREF,
        }
    }

    pub(crate) fn from_wasmtime(ty: &wasmtime::ValType) -> Self {
        match ty {
            wasmtime::ValType::I32 => Self::I32,
            wasmtime::ValType::I64 => Self::I64,
            wasmtime::ValType::F32 => Self::F32,
            wasmtime::ValType::F64 => Self::F64,
            wasmtime::ValType::V128 => Self::V128,
            wasmtime::ValType::Ref(r) => Self::from_ref_type(r),
        }
    }

    // Without the GC proposal only the func and extern hierarchies exist.
    pub(crate) fn from_ref_type(ty: &wasmtime::RefType) -> Self {
        match ty.heap_type() {
            wasmtime::HeapType::Func
            | wasmtime::HeapType::ConcreteFunc(_)
            | wasmtime::HeapType::NoFunc => Self::FuncRef,
            _ => Self::ExternRef,
        }
    }

    pub(crate) fn to_ref_type(self) -> Option<wasmtime::RefType> {
        match self {
            Self::ExternRef => Some(wasmtime::RefType::EXTERNREF),
            Self::FuncRef => Some(wasmtime::RefType::FUNCREF),
            _ => None,
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::V128 => "v128",
            Self::ExternRef => "externref",
            Self::FuncRef => "funcref",
        };
        f.write_str(name)
    }
}

/// Size limits of a memory (in pages) or table (in elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Limits with a minimum and no maximum.
    pub fn at_least(min: u32) -> Self {
        Self { min, max: None }
    }
}

/// Convert an engine size into the 32-bit range used by this API.
///
/// Sizes are clamped: anything above `u32::MAX` (only reachable by 64-bit
/// tables and memories) is reported as `u32::MAX`.
pub(crate) fn narrow<T: TryInto<u32>>(value: T) -> u32 {
    value.try_into().unwrap_or(u32::MAX)
}

/// Signature of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    params: Box<[ValType]>,
    results: Box<[ValType]>,
}

impl FuncType {
    pub fn new(
        params: impl IntoIterator<Item = ValType>,
        results: impl IntoIterator<Item = ValType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    pub fn params(&self) -> &[ValType] {
        &self.params
    }

    pub fn results(&self) -> &[ValType] {
        &self.results
    }

    pub(crate) fn to_wasmtime(&self, engine: &wasmtime::Engine) -> wasmtime::FuncType {
        wasmtime::FuncType::new(
            engine,
            self.params.iter().map(|t| t.to_wasmtime()),
            self.results.iter().map(|t| t.to_wasmtime()),
        )
    }

    pub(crate) fn from_wasmtime(ty: &wasmtime::FuncType) -> Self {
        Self {
            params: ty.params().map(|t| ValType::from_wasmtime(&t)).collect(),
            results: ty.results().map(|t| ValType::from_wasmtime(&t)).collect(),
        }
    }
}

/// Whether a global can be written after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    Const,
    Var,
}

/// Type of a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    pub content: ValType,
    pub mutability: Mutability,
}

impl GlobalType {
    pub fn new(content: ValType, mutability: Mutability) -> Self {
        Self {
            content,
            mutability,
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::Var
    }

    pub(crate) fn to_wasmtime(self) -> wasmtime::GlobalType {
        let mutability = match self.mutability {
            Mutability::Const => wasmtime::Mutability::Const,
            Mutability::Var => wasmtime::Mutability::Var,
        };
        wasmtime::GlobalType::new(self.content.to_wasmtime(), mutability)
    }

    pub(crate) fn from_wasmtime(ty: &wasmtime::GlobalType) -> Self {
        let mutability = match ty.mutability() {
            wasmtime::Mutability::Const => Mutability::Const,
            wasmtime::Mutability::Var => Mutability::Var,
        };
        Self::new(ValType::from_wasmtime(ty.content()), mutability)
    }
}

/// Type of a table: a reference element type plus limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    pub element: ValType,
    pub limits: Limits,
}

impl TableType {
    pub fn new(element: ValType, limits: Limits) -> Self {
        Self { element, limits }
    }

    /// `None` when the element type is not a reference type.
    pub(crate) fn to_wasmtime(self) -> Option<wasmtime::TableType> {
        let element = self.element.to_ref_type()?;
        Some(wasmtime::TableType::new(
            element,
            self.limits.min,
            self.limits.max,
        ))
    }

    pub(crate) fn from_wasmtime(ty: &wasmtime::TableType) -> Self {
        Self {
            element: ValType::from_ref_type(ty.element()),
            limits: Limits::new(narrow(ty.minimum()), ty.maximum().map(narrow)),
        }
    }
}

/// Type of a linear memory, in 64KiB pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType {
    pub limits: Limits,
}

impl MemoryType {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub(crate) fn to_wasmtime(self) -> wasmtime::MemoryType {
        wasmtime::MemoryType::new(self.limits.min, self.limits.max)
    }

    pub(crate) fn from_wasmtime(ty: &wasmtime::MemoryType) -> Self {
        Self {
            limits: Limits::new(narrow(ty.minimum()), ty.maximum().map(narrow)),
        }
    }
}

/// Type of anything that can be imported or exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternType {
    Func(FuncType),
    Global(GlobalType),
    Table(TableType),
    Memory(MemoryType),
    Instance(InstanceType),
    Module(ModuleType),
}

impl ExternType {
    /// Short name of the kind, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Func(_) => "func",
            Self::Global(_) => "global",
            Self::Table(_) => "table",
            Self::Memory(_) => "memory",
            Self::Instance(_) => "instance",
            Self::Module(_) => "module",
        }
    }

    pub fn func(&self) -> Option<&FuncType> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn global(&self) -> Option<&GlobalType> {
        match self {
            Self::Global(g) => Some(g),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&TableType> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn memory(&self) -> Option<&MemoryType> {
        match self {
            Self::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// `None` for kinds with no counterpart here (e.g. exception tags).
    pub(crate) fn from_wasmtime(ty: &wasmtime::ExternType) -> Option<Self> {
        match ty {
            wasmtime::ExternType::Func(f) => Some(Self::Func(FuncType::from_wasmtime(f))),
            wasmtime::ExternType::Global(g) => Some(Self::Global(GlobalType::from_wasmtime(g))),
            wasmtime::ExternType::Table(t) => Some(Self::Table(TableType::from_wasmtime(t))),
            wasmtime::ExternType::Memory(m) => Some(Self::Memory(MemoryType::from_wasmtime(m))),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// A module import: two-level name plus type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportType {
    module: String,
    name: String,
    ty: ExternType,
}

impl ImportType {
    pub fn new(module: impl Into<String>, name: impl Into<String>, ty: ExternType) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            ty,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ExternType {
        &self.ty
    }
}

/// A named export plus its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportType {
    name: String,
    ty: ExternType,
}

impl ExportType {
    pub fn new(name: impl Into<String>, ty: ExternType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ExternType {
        &self.ty
    }
}

/// Import and export signature of a compiled module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleType {
    imports: Vec<ImportType>,
    exports: Vec<ExportType>,
}

impl ModuleType {
    pub fn new(imports: Vec<ImportType>, exports: Vec<ExportType>) -> Self {
        Self { imports, exports }
    }

    pub fn imports(&self) -> &[ImportType] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportType] {
        &self.exports
    }

    pub(crate) fn from_wasmtime(module: &wasmtime::Module) -> Self {
        let imports = module
            .imports()
            .filter_map(|i| {
                ExternType::from_wasmtime(&i.ty())
                    .map(|ty| ImportType::new(i.module(), i.name(), ty))
            })
            .collect();
        let exports = module
            .exports()
            .filter_map(|e| ExternType::from_wasmtime(&e.ty()).map(|ty| ExportType::new(e.name(), ty)))
            .collect();
        Self { imports, exports }
    }
}

/// Export signature of a linked instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceType {
    exports: Vec<ExportType>,
}

impl InstanceType {
    pub fn new(exports: Vec<ExportType>) -> Self {
        Self { exports }
    }

    pub fn exports(&self) -> &[ExportType] {
        &self.exports
    }
}
