//! Boundary surface of the native compute engine.
//!
//! Everything the binding layer may ask of an engine is a method on
//! [`Engine`]: allocate from wire bytes, read back, query shape and dtype
//! ordinal, release, copy, and run an operation from the [`OpCode`] catalog.
//! Identifiers cross the boundary as [`RawHandle`] (owned, move-only) or
//! [`HandleId`] (borrowed).
//!
//! Engines speak one of two [`CallConvention`]s. Under
//! [`CallConvention::Rebinding`] every operation returns one identifier per
//! operand, in operand order, followed by the result identifiers; the caller
//! must re-point its operands at the returned identifiers. Under
//! [`CallConvention::NonMutating`] only result identifiers are returned.
//!
//! With the `host` feature, `HostEngine` implements the surface over host
//! memory. It is the engine used by tests and by hosts that have no native
//! library available.

mod backend;
mod engine;
mod handle;
#[cfg(feature = "host")]
pub mod host;
mod op;

pub use backend::{Backend, BackendSet};
pub use engine::Engine;
pub use handle::{HandleId, RawHandle};
#[cfg(feature = "host")]
pub use host::HostEngine;
pub use op::{CallConvention, OpCode};

// ============================================================================
// Error types
// ============================================================================

/// Failure reported by the engine itself.
///
/// The message is engine-specific and passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    code: Option<i32>,
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// The engine's numeric status, when it reports one.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
