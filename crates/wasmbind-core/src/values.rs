//! Values crossing the host/wasm boundary.

use crate::{ExternRef, Func, ValType};

/// A single WebAssembly value.
///
/// The variant fixes the kind. Accessors return `None` on a kind mismatch;
/// the `unwrap_*` forms panic instead, for callers that already know the
/// kind from the function signature.
#[derive(Debug, Clone)]
pub enum Val {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128([u8; 16]),
    ExternRef(Option<ExternRef>),
    FuncRef(Option<Func>),
}

macro_rules! accessors {
    ($(($variant:ident($ty:ty) $get:ident $unwrap:ident))*) => ($(
        pub fn $get(&self) -> Option<$ty> {
            match self {
                Self::$variant(v) => Some(v.clone()),
                _ => None,
            }
        }

        /// # Panics
        ///
        /// Panics if the value has a different kind.
        pub fn $unwrap(&self) -> $ty {
            match self.$get() {
                Some(v) => v,
                None => panic!(
                    "expected {} value, found {}",
                    stringify!($variant),
                    self.ty()
                ),
            }
        }
    )*)
}

impl Val {
    accessors! {
        (I32(i32) i32 unwrap_i32)
        (I64(i64) i64 unwrap_i64)
        (F32(f32) f32 unwrap_f32)
        (F64(f64) f64 unwrap_f64)
        (V128([u8; 16]) v128 unwrap_v128)
        (ExternRef(Option<ExternRef>) externref unwrap_externref)
        (FuncRef(Option<Func>) funcref unwrap_funcref)
    }

    pub fn ty(&self) -> ValType {
        match self {
            Self::I32(_) => ValType::I32,
            Self::I64(_) => ValType::I64,
            Self::F32(_) => ValType::F32,
            Self::F64(_) => ValType::F64,
            Self::V128(_) => ValType::V128,
            Self::ExternRef(_) => ValType::ExternRef,
            Self::FuncRef(_) => ValType::FuncRef,
        }
    }

    /// Zero (or null) value of a kind.
    pub fn default_for(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Self::I32(0),
            ValType::I64 => Self::I64(0),
            ValType::F32 => Self::F32(0.0),
            ValType::F64 => Self::F64(0.0),
            ValType::V128 => Self::V128([0; 16]),
            ValType::ExternRef => Self::ExternRef(None),
            ValType::FuncRef => Self::FuncRef(None),
        }
    }

    pub(crate) fn to_wasmtime(
        &self,
        mut store: impl wasmtime::AsContextMut,
    ) -> anyhow::Result<wasmtime::Val> {
        Ok(match self {
            Self::I32(v) => wasmtime::Val::I32(*v),
            Self::I64(v) => wasmtime::Val::I64(*v),
            Self::F32(v) => wasmtime::Val::F32(v.to_bits()),
            Self::F64(v) => wasmtime::Val::F64(v.to_bits()),
            Self::V128(bytes) => wasmtime::Val::V128(u128::from_le_bytes(*bytes).into()),
            Self::ExternRef(None) => wasmtime::Val::ExternRef(None),
            Self::ExternRef(Some(r)) => wasmtime::Val::ExternRef(Some(r.to_wasmtime(&mut store)?)),
            Self::FuncRef(f) => wasmtime::Val::FuncRef(f.map(|f| f.0)),
        })
    }

    pub(crate) fn from_wasmtime(store: &impl wasmtime::AsContext, val: &wasmtime::Val) -> Self {
        match val {
            wasmtime::Val::I32(v) => Self::I32(*v),
            wasmtime::Val::I64(v) => Self::I64(*v),
            wasmtime::Val::F32(bits) => Self::F32(f32::from_bits(*bits)),
            wasmtime::Val::F64(bits) => Self::F64(f64::from_bits(*bits)),
            wasmtime::Val::V128(v) => Self::V128(v.as_u128().to_le_bytes()),
            wasmtime::Val::FuncRef(f) => Self::FuncRef(f.map(Func)),
            wasmtime::Val::ExternRef(r) => {
                Self::ExternRef(r.as_ref().and_then(|r| ExternRef::from_wasmtime(store, r)))
            }
            // GC-proposal references have no host representation.
            _ => Self::ExternRef(None),
        }
    }

    /// `None` if the value is not a reference.
    pub(crate) fn to_ref(
        &self,
        mut store: impl wasmtime::AsContextMut,
    ) -> Option<anyhow::Result<wasmtime::Ref>> {
        match self {
            Self::FuncRef(f) => Some(Ok(wasmtime::Ref::Func(f.map(|f| f.0)))),
            Self::ExternRef(None) => Some(Ok(wasmtime::Ref::Extern(None))),
            Self::ExternRef(Some(r)) => {
                Some(r.to_wasmtime(&mut store).map(|r| wasmtime::Ref::Extern(Some(r))))
            }
            _ => None,
        }
    }

    pub(crate) fn from_ref(store: &impl wasmtime::AsContext, r: &wasmtime::Ref) -> Self {
        match r {
            wasmtime::Ref::Func(f) => Self::FuncRef(f.map(Func)),
            wasmtime::Ref::Extern(r) => {
                Self::ExternRef(r.as_ref().and_then(|r| ExternRef::from_wasmtime(store, r)))
            }
            _ => Self::ExternRef(None),
        }
    }
}

impl From<i32> for Val {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Val {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<[u8; 16]> for Val {
    fn from(v: [u8; 16]) -> Self {
        Self::V128(v)
    }
}

impl From<ExternRef> for Val {
    fn from(v: ExternRef) -> Self {
        Self::ExternRef(Some(v))
    }
}

impl From<Option<ExternRef>> for Val {
    fn from(v: Option<ExternRef>) -> Self {
        Self::ExternRef(v)
    }
}

impl From<Func> for Val {
    fn from(v: Func) -> Self {
        Self::FuncRef(Some(v))
    }
}

impl From<Option<Func>> for Val {
    fn from(v: Option<Func>) -> Self {
        Self::FuncRef(v)
    }
}
