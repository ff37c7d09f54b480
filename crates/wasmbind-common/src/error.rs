//! Error types for wasmbind.
//!
//! This module defines the host-side error taxonomy using `thiserror`:
//! - [`Error`]: failures reported to the immediate caller before or outside
//!   of wasm execution (configuration, compilation, linking, bad arguments)
//! - [`WasiError`]: WASI environment setup failures
//!
//! Guest faults are not represented here; they live next to the engine
//! bindings as `Trap`.

use thiserror::Error;

/// Convenience alias for results carrying an [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Host/API errors.
///
/// Each variant only carries text (plus a few numbers for bounds errors);
/// the variant itself classifies which family of failure occurred.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// WebAssembly text could not be translated to the binary format.
    #[error("Failed to parse WebAssembly text: {reason}")]
    Parse {
        /// Parser diagnostic.
        reason: String,
    },

    /// WebAssembly compilation or validation failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// A compiled module could not be serialized.
    #[error("Serialization failed: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },

    /// Serialized bytes were rejected by the engine.
    #[error("Deserialization failed: {reason}")]
    Deserialization {
        /// Description of the failure.
        reason: String,
    },

    /// Imports could not be resolved or did not match the module.
    #[error("Link error: {reason}")]
    Link {
        /// Description of the linking failure.
        reason: String,
    },

    /// A value did not match the expected type.
    #[error("Type mismatch: {reason}")]
    TypeMismatch {
        /// Description of the mismatch.
        reason: String,
    },

    /// `set` was attempted on an immutable global.
    #[error("Cannot set an immutable global")]
    ImmutableGlobal,

    /// A table index was outside the current table size.
    #[error("Index {index} out of bounds for table of size {size}")]
    OutOfBounds {
        /// The rejected index.
        index: u32,
        /// Table size at the time of access.
        size: u32,
    },

    /// Growing a memory or table exceeded its limits.
    #[error("Resource limit exceeded: {reason}")]
    ResourceLimit {
        /// Description of the limit that was hit.
        reason: String,
    },

    /// WASI operation failed.
    #[error("WASI error: {0}")]
    Wasi(#[from] WasiError),
}

/// WASI-related errors.
///
/// These errors occur while turning a WASI description into a live context.
#[derive(Error, Debug)]
pub enum WasiError {
    /// Failed to initialize WASI context.
    #[error("WASI initialization failed: {reason}")]
    InitializationFailed {
        /// Description of the initialization failure.
        reason: String,
    },

    /// A file or directory named by the configuration could not be opened.
    #[error("WASI filesystem error: cannot open '{path}' for {operation}")]
    FilesystemError {
        /// The path that was rejected.
        path: String,
        /// What the path was going to be used for.
        operation: String,
    },
}

impl Error {
    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a new `Parse` error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `Serialization` error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Create a new `Deserialization` error.
    pub fn deserialization(reason: impl Into<String>) -> Self {
        Self::Deserialization {
            reason: reason.into(),
        }
    }

    /// Create a new `Link` error.
    pub fn link(reason: impl Into<String>) -> Self {
        Self::Link {
            reason: reason.into(),
        }
    }

    /// Create a new `TypeMismatch` error.
    pub fn type_mismatch(reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            reason: reason.into(),
        }
    }

    /// Create a new `ResourceLimit` error.
    pub fn resource_limit(reason: impl Into<String>) -> Self {
        Self::ResourceLimit {
            reason: reason.into(),
        }
    }

    /// The rendered error message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns `true` for configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Returns `true` if the error came from text parsing or compilation.
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::CompilationFailed { .. })
    }

    /// Returns `true` for linking errors.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link { .. })
    }

    /// Returns `true` for value/type mismatches, including writes to
    /// immutable globals.
    pub fn is_type(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::ImmutableGlobal)
    }

    /// Returns `true` if this error indicates a bounds or resource limit.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. } | Self::ResourceLimit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::link("unknown import: `env::f`");
        assert_eq!(err.to_string(), "Link error: unknown import: `env::f`");

        let err = Error::ImmutableGlobal;
        assert_eq!(err.message(), "Cannot set an immutable global");

        let err = Error::OutOfBounds { index: 4, size: 2 };
        assert_eq!(err.to_string(), "Index 4 out of bounds for table of size 2");
    }

    #[test]
    fn test_error_from_wasi() {
        let wasi_err = WasiError::FilesystemError {
            path: "/nope".into(),
            operation: "stdin".into(),
        };
        let err: Error = wasi_err.into();

        assert!(matches!(err, Error::Wasi(_)));
        assert!(err.message().contains("/nope"));
    }

    #[test]
    fn test_is_resource_limit() {
        assert!(Error::resource_limit("memory").is_resource_limit());
        assert!(Error::OutOfBounds { index: 1, size: 0 }.is_resource_limit());
        assert!(!Error::link("x").is_resource_limit());
    }

    #[test]
    fn test_classification_predicates() {
        assert!(Error::invalid_config("bad").is_config());
        assert!(Error::parse("bad").is_compile());
        assert!(Error::compilation_failed("bad").is_compile());
        assert!(Error::link("bad").is_link());
        assert!(Error::ImmutableGlobal.is_type());
        assert!(Error::type_mismatch("i32 vs i64").is_type());
        assert!(!Error::serialization("x").is_type());
    }

    #[test]
    fn test_every_variant_has_a_family() {
        fn family(err: &Error) -> &'static str {
            match err {
                Error::InvalidConfig { .. } => "config",
                Error::Parse { .. } | Error::CompilationFailed { .. } => "compile",
                Error::Serialization { .. } | Error::Deserialization { .. } => "artifact",
                Error::Link { .. } => "link",
                Error::TypeMismatch { .. } | Error::ImmutableGlobal => "type",
                Error::OutOfBounds { .. } | Error::ResourceLimit { .. } => "limit",
                Error::Wasi(_) => "wasi",
            }
        }

        let wasi: Error = WasiError::InitializationFailed {
            reason: "no ctx".into(),
        }
        .into();
        assert_eq!(family(&wasi), "wasi");
        assert_eq!(family(&Error::deserialization("stale")), "artifact");
        assert!(!wasi.is_config() && !wasi.is_link() && !wasi.is_resource_limit());
    }
}
