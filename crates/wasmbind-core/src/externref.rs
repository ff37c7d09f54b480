//! Reference-counted host values passable into wasm as `externref`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A shared handle to an arbitrary host value.
///
/// Cloning shares the value. The value is dropped (its finalizer runs) once
/// the last host clone is gone and no store still holds it.
///
/// A reference cleared from a global is released by the next
/// [`StoreContextMut::gc`](crate::StoreContextMut::gc). A reference that was
/// stored in a table stays alive until the store itself is dropped, even
/// after the slot is overwritten and `gc` has run.
#[derive(Clone)]
pub struct ExternRef {
    inner: Arc<dyn Any + Send + Sync>,
}

impl ExternRef {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn data(&self) -> &(dyn Any + Send + Sync) {
        &*self.inner
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns `true` if both handles share the same host value.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Number of live handles, including copies rooted by stores.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn to_wasmtime(
        &self,
        store: impl wasmtime::AsContextMut,
    ) -> anyhow::Result<wasmtime::Rooted<wasmtime::ExternRef>> {
        wasmtime::ExternRef::new(store, self.clone())
    }

    /// `None` when the reference carries no payload created by this crate.
    pub(crate) fn from_wasmtime(
        store: &impl wasmtime::AsContext,
        rooted: &wasmtime::Rooted<wasmtime::ExternRef>,
    ) -> Option<Self> {
        let data = rooted.data(store.as_context()).ok()?.host_data()?;
        data.downcast_ref::<Self>().cloned()
    }
}

impl fmt::Debug for ExternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternRef")
            .field("strong_count", &self.strong_count())
            .finish_non_exhaustive()
    }
}

// Externrefs converted from `anyref` carry no host payload; accept both the
// plain and the optional payload shapes.
trait HostData<'a> {
    fn host_data(self) -> Option<&'a (dyn Any + Send + Sync)>;
}

impl<'a> HostData<'a> for &'a (dyn Any + Send + Sync) {
    fn host_data(self) -> Option<&'a (dyn Any + Send + Sync)> {
        Some(self)
    }
}

impl<'a> HostData<'a> for Option<&'a (dyn Any + Send + Sync)> {
    fn host_data(self) -> Option<&'a (dyn Any + Send + Sync)> {
        self
    }
}
