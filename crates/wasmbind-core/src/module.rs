//! WebAssembly module compilation and serialization.
//!
//! A [`Module`] is compiled once per [`Engine`] and can be instantiated any
//! number of times, in any store of that engine.
//!
//! # Input formats
//!
//! - **Binary**: starts with the `\0asm` magic
//! - **Text**: anything else, converted with [`wat2wasm`] first
//! - **Precompiled**: output of [`Module::serialize`], loaded with the unsafe
//!   [`Module::deserialize`]

use std::time::Instant;

use tracing::{debug, info, instrument};

use wasmbind_common::{Error, Result};

use crate::{Engine, ModuleType};

const WASM_MAGIC: &[u8] = b"\0asm";

/// A compiled WebAssembly module.
///
/// Cloning is cheap and shares the compiled code. Modules are thread-safe.
#[derive(Clone)]
pub struct Module {
    inner: wasmtime::Module,
}

impl Module {
    /// Compile a module from binary or text input.
    ///
    /// Empty input is treated as binary, so it fails to compile rather than
    /// parsing as an empty text module.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed text and a compilation error for
    /// invalid binaries.
    pub fn new(engine: &Engine, bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() || bytes.starts_with(WASM_MAGIC) {
            return Self::from_binary(engine, bytes);
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::parse(format!("Module text is not valid UTF-8: {e}")))?;
        Self::from_wat(engine, text)
    }

    /// Compile a module from its binary encoding.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn from_binary(engine: &Engine, bytes: &[u8]) -> Result<Self> {
        let start = Instant::now();

        let inner = wasmtime::Module::from_binary(engine.inner(), bytes)
            .map_err(|e| Error::compilation_failed(format!("Module compilation failed: {e:#}")))?;

        info!(
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self { inner })
    }

    /// Compile a module from the text format.
    pub fn from_wat(engine: &Engine, text: &str) -> Result<Self> {
        let bytes = wat2wasm(text)?;
        Self::from_binary(engine, &bytes)
    }

    /// Check that `bytes` is a valid module for `engine` without compiling it.
    ///
    /// # Errors
    ///
    /// Returns a compilation error describing the first validation failure.
    pub fn validate(engine: &Engine, bytes: &[u8]) -> Result<()> {
        wasmtime::Module::validate(engine.inner(), bytes)
            .map_err(|e| Error::compilation_failed(format!("Module validation failed: {e:#}")))
    }

    /// Serialize the compiled code for a later [`deserialize`](Self::deserialize).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.inner
            .serialize()
            .map_err(|e| Error::serialization(format!("Module serialization failed: {e:#}")))
    }

    /// Load a module produced by [`serialize`](Self::serialize).
    ///
    /// # Safety
    ///
    /// `bytes` is trusted to be machine code produced by a compatible engine.
    /// Loading arbitrary or tampered bytes is undefined behaviour.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact was produced by an incompatible
    /// engine configuration or version.
    #[allow(unsafe_code)]
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub unsafe fn deserialize(engine: &Engine, bytes: &[u8]) -> Result<Self> {
        let start = Instant::now();

        // SAFETY: the caller vouches for the artifact.
        let inner = unsafe { wasmtime::Module::deserialize(engine.inner(), bytes) }
            .map_err(|e| Error::deserialization(format!("Module deserialization failed: {e:#}")))?;

        debug!(
            duration_us = start.elapsed().as_micros(),
            "Precompiled module loaded"
        );

        Ok(Self { inner })
    }

    /// Imports and exports of the module.
    pub fn ty(&self) -> ModuleType {
        ModuleType::from_wasmtime(&self.inner)
    }

    /// Name from the module's `name` section, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    pub(crate) fn inner(&self) -> &wasmtime::Module {
        &self.inner
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Convert the WebAssembly text format to its binary encoding.
///
/// # Errors
///
/// Returns a parse error with the location of the first syntax error.
pub fn wat2wasm(text: &str) -> Result<Vec<u8>> {
    wat::parse_str(text).map_err(|e| Error::parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExternType;

    // Empty module: magic plus version 1.
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    #[test]
    fn test_compile_binary() {
        let engine = Engine::default();
        let module = Module::new(&engine, MINIMAL_WASM).unwrap();
        assert!(module.ty().imports().is_empty());
        assert!(module.ty().exports().is_empty());
        assert!(module.name().is_none());
    }

    #[test]
    fn test_compile_text() {
        let engine = Engine::default();
        let module = Module::new(&engine, "(module $named (func (export \"run\")))").unwrap();
        assert_eq!(module.name(), Some("named"));

        let ty = module.ty();
        assert_eq!(ty.exports().len(), 1);
        assert_eq!(ty.exports()[0].name(), "run");
        assert!(matches!(ty.exports()[0].ty(), ExternType::Func(_)));
    }

    #[test]
    fn test_empty_input_fails() {
        let engine = Engine::default();
        assert!(Module::new(&engine, b"").unwrap_err().is_compile());
        assert!(Module::validate(&engine, b"").is_err());
        assert!(Module::validate(&engine, MINIMAL_WASM).is_ok());
    }

    #[test]
    fn test_malformed_text_is_parse_error() {
        let engine = Engine::default();
        let err = Module::new(&engine, "(module (func").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_wat2wasm() {
        let bytes = wat2wasm("(module)").unwrap();
        assert_eq!(bytes, MINIMAL_WASM);
        assert!(wat2wasm("(nope)").is_err());
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_serialize_round_trip() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            "(module (memory (export \"m\") 1) (global (export \"g\") i32 (i32.const 1)))",
        )
        .unwrap();

        let bytes = module.serialize().unwrap();
        let loaded = unsafe { Module::deserialize(&engine, &bytes) }.unwrap();
        assert_eq!(loaded.ty(), module.ty());
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_deserialize_garbage_fails() {
        let engine = Engine::default();
        let err = unsafe { Module::deserialize(&engine, b"not a module") }.unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }
}
