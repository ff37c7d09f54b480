//! Store-scoped WebAssembly object model over Wasmtime.
//!
//! This crate provides the embedding API:
//! - [`Config`] and [`Engine`]: compilation settings and the shared engine
//! - [`Store`] and its contexts: ownership of every runtime object
//! - [`Module`]: compiled code, with its [`ModuleType`]
//! - [`Func`], [`Global`], [`Table`], [`Memory`]: store-owned handles
//! - [`Instance`] and [`Linker`]: positional and name-based instantiation
//! - [`Val`] and [`ExternRef`]: values crossing the host/wasm boundary
//! - [`Trap`] and [`TrapError`]: guest faults versus host errors
//! - [`WasiConfig`]: per-store WASI environment
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Engine                           │
//! │  (Cloneable, thread-safe)                               │
//! │  - Compiler and feature settings                        │
//! │  - Fuel / interruption capabilities                     │
//! └─────────────────────────────────────────────────────────┘
//!             │                              │
//!             ▼                              ▼
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │          Module           │  │          Linker          │
//! │  (Compiled once, shared)  │  │  (Named definitions,     │
//! │  - Import/export types    │  │   host functions, WASI)  │
//! └───────────────────────────┘  └──────────────────────────┘
//!             │                              │
//!             ▼                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Store                            │
//! │  (Owns everything below, single-threaded)               │
//! │  - Instances, funcs, globals, tables, memories          │
//! │  - Fuel, interrupt flag, WASI context                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let engine = Engine::default();
//! let module = Module::new(&engine, r#"(module (func (export "answer") (result i32) i32.const 42))"#)?;
//! let mut store = Store::new(&engine);
//! let instance = Linker::new(&engine).instantiate(&mut store, &module)?;
//! let answer = instance.get(&mut store, "answer").and_then(Extern::into_func).unwrap();
//! assert_eq!(answer.call(&mut store, &[])?[0].unwrap_i32(), 42);
//! ```

pub mod engine;
pub mod externals;
pub mod externref;
pub mod func;
pub mod instance;
pub mod linker;
pub mod module;
pub mod store;
pub mod trap;
pub mod types;
pub mod values;
pub mod wasi;

pub use engine::{Config, Engine};
pub use externals::{Extern, Global, Memory, Table};
pub use externref::ExternRef;
pub use func::{Caller, Func};
pub use instance::Instance;
pub use linker::Linker;
pub use module::{Module, wat2wasm};
pub use store::{AsContext, AsContextMut, InterruptHandle, Store, StoreContext, StoreContextMut};
pub use trap::{FrameInfo, Trap, TrapError, TrapResult};
pub use types::{
    ExportType, ExternType, FuncType, GlobalType, ImportType, InstanceType, Limits, MemoryType,
    ModuleType, Mutability, TableType, ValType,
};
pub use values::Val;
pub use wasi::WasiConfig;

pub use wasmbind_common::{Error, Result};
