//! Guest faults and the combined trap-or-error result.
//!
//! Two failure domains are kept apart:
//! - [`Error`] (from `wasmbind-common`): the operation could not even start
//! - [`Trap`]: wasm code was running and faulted
//!
//! Operations that may fail either way return [`TrapResult`].

use tracing::debug;
use wasmbind_common::Error;

/// Result of an operation that can fail before or during wasm execution.
pub type TrapResult<T> = Result<T, TrapError>;

/// One frame of a trap's call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    func_index: u32,
    func_name: Option<String>,
    module_name: Option<String>,
    func_offset: Option<usize>,
    module_offset: Option<usize>,
}

impl FrameInfo {
    /// Index of the function within its module's function index space.
    pub fn func_index(&self) -> u32 {
        self.func_index
    }

    /// Function name from the `name` section, if present.
    pub fn func_name(&self) -> Option<&str> {
        self.func_name.as_deref()
    }

    /// Module name from the `name` section, if present.
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Byte offset of the faulting instruction from the start of the function body.
    pub fn func_offset(&self) -> Option<usize> {
        self.func_offset
    }

    /// Byte offset of the faulting instruction within the module binary.
    pub fn module_offset(&self) -> Option<usize> {
        self.module_offset
    }

    fn from_wasmtime(frame: &wasmtime::FrameInfo) -> Self {
        Self {
            func_index: frame.func_index(),
            func_name: frame.func_name().map(str::to_owned),
            module_name: frame.module().name().map(str::to_owned),
            func_offset: frame.func_offset(),
            module_offset: frame.module_offset(),
        }
    }
}

/// A guest-originated execution fault.
///
/// Host functions return a `Trap` to fault the calling wasm code; the engine
/// produces one for instruction faults, fuel exhaustion, interrupts and
/// WASI `proc_exit`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Trap {
    message: String,
    exit_code: Option<i32>,
    code: Option<wasmtime::Trap>,
    trace: Vec<FrameInfo>,
}

impl Trap {
    /// Create a trap with a message and no trace.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: None,
            code: None,
            trace: Vec::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Exit status when the guest requested process exit rather than faulting.
    pub fn i32_exit(&self) -> Option<i32> {
        self.exit_code
    }

    /// Call stack at the time of the trap, innermost frame first.
    pub fn trace(&self) -> &[FrameInfo] {
        &self.trace
    }

    /// Returns `true` if the trap was caused by running out of fuel.
    pub fn is_out_of_fuel(&self) -> bool {
        self.code == Some(wasmtime::Trap::OutOfFuel)
    }

    /// Returns `true` if the trap was delivered through an interrupt handle.
    pub fn is_interrupt(&self) -> bool {
        self.code == Some(wasmtime::Trap::Interrupt)
    }

    /// Extract a trap from an engine error, if the error is one.
    ///
    /// Engine trap codes, traps raised by host callbacks, WASI exits and any
    /// failure raised while wasm frames were on the stack all count.
    pub(crate) fn from_engine_error(err: &anyhow::Error) -> Option<Self> {
        let trace: Vec<FrameInfo> = err
            .downcast_ref::<wasmtime::WasmBacktrace>()
            .map(|bt| bt.frames().iter().map(FrameInfo::from_wasmtime).collect())
            .unwrap_or_default();

        if let Some(exit) = err.downcast_ref::<wasmtime_wasi::I32Exit>() {
            return Some(Self {
                message: format!("Exited with i32 exit status {}", exit.0),
                exit_code: Some(exit.0),
                code: None,
                trace,
            });
        }

        if let Some(code) = err.downcast_ref::<wasmtime::Trap>() {
            return Some(Self {
                message: code.to_string(),
                exit_code: None,
                code: Some(*code),
                trace,
            });
        }

        if let Some(host) = err.downcast_ref::<Trap>() {
            return Some(Self {
                message: host.message.clone(),
                exit_code: host.exit_code,
                code: host.code,
                trace,
            });
        }

        if trace.is_empty() {
            None
        } else {
            Some(Self {
                message: root_message(err),
                exit_code: None,
                code: None,
                trace,
            })
        }
    }
}

/// Either a host error or a guest trap.
#[derive(Debug, thiserror::Error)]
pub enum TrapError {
    #[error(transparent)]
    Error(#[from] Error),

    #[error("wasm trap: {0}")]
    Trap(#[from] Trap),
}

impl TrapError {
    /// Classify an engine error, using `otherwise` for non-trap failures.
    pub(crate) fn from_engine_error(err: anyhow::Error, otherwise: fn(String) -> Error) -> Self {
        match Trap::from_engine_error(&err) {
            Some(trap) => {
                debug!(
                    message = %trap.message,
                    frames = trap.trace.len(),
                    "Wasm execution trapped"
                );
                Self::Trap(trap)
            }
            None => Self::Error(otherwise(format!("{err:#}"))),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Error(e) => e.message(),
            Self::Trap(t) => t.message.clone(),
        }
    }

    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trap(_))
    }

    pub fn trap(&self) -> Option<&Trap> {
        match self {
            Self::Trap(t) => Some(t),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            Self::Trap(_) => None,
        }
    }
}

fn root_message(err: &anyhow::Error) -> String {
    err.root_cause().to_string()
}
