//! Typed, ownership-checked arrays living inside an opaque compute engine.
//!
//! The engine stores every array on its side of a boundary and hands out
//! integer identifiers. This crate wraps those identifiers so that each one
//! has exactly one owner, is released exactly once, and is never used after
//! release.
//!
//! # Core Types
//!
//! - [`EngineContext`]: the engine plus its backend/device configuration
//! - [`Array`]: owner of one engine-side array, with cached [`Dtype`] and [`Shape4`]
//! - [`Shape4`]: rank-4 dimension vector, right-padded with 1s
//! - [`CallOutcome`]: the identifiers returned by one engine call, split
//!   into operand rebinds and results
//!
//! # Example
//!
//! ```rust
//! use engine_array::{Array, EngineContext};
//! use engine_sys::HostEngine;
//!
//! let ctx = EngineContext::new(HostEngine::new()).unwrap();
//! let a = Array::from_slice(&ctx, &[1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
//! let b = a.add(&a).unwrap();
//!
//! assert_eq!(b.shape().unwrap().dims(), [2, 2, 1, 1]);
//! assert_eq!(b.to_vec::<f64>().unwrap(), vec![2.0, 4.0, 6.0, 8.0]);
//! ```
//!
//! # Call conventions
//!
//! Engines that relocate operand storage ([`CallConvention::Rebinding`])
//! return fresh operand identifiers with every call. [`call`] applies those
//! rebinds before any result is constructed, so operations on `&Array` look
//! non-mutating to callers under either convention.

mod array;
mod context;
pub mod normalization;
mod ops;
mod rebind;
mod shape;

pub use array::{Array, ArrayBuilder};
pub use context::{EngineConfig, EngineContext};
pub use rebind::{call, CallOutcome, Stranded};
pub use shape::Shape4;

pub use engine_dtype::{Complex32, Complex64, Dtype, DtypeError, Element, HostBuffer};
pub use engine_sys::{
    Backend, BackendSet, CallConvention, Engine, EngineError, HandleId, OpCode, RawHandle,
};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised by the binding layer.
///
/// `NullInput`, `InvalidShape` and `ShapeMismatch` are detected before any
/// engine call. `Protocol` and `UseAfterRelease` are bugs in this layer or
/// its caller.
#[derive(Debug, thiserror::Error)]
pub enum ArrayError {
    /// A required buffer was absent.
    #[error("required input is absent")]
    NullInput,

    #[error("invalid shape {dims:?}: {reason}")]
    InvalidShape { dims: Vec<u64>, reason: &'static str },

    /// Buffer length differs from the element count of the shape.
    #[error("shape mismatch: {expected} elements expected, {found} supplied")]
    ShapeMismatch { expected: u64, found: usize },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("array {id} used after release")]
    UseAfterRelease { id: HandleId },

    /// The engine reported a failure; its message is passed through.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("dtype mismatch: array is {found}, requested {expected}")]
    DtypeMismatch { expected: Dtype, found: Dtype },

    /// Backend or device change attempted while arrays are live.
    #[error("{count} live array(s) in this context; release them before changing backend or device")]
    LiveHandles { count: usize },

    #[error("arrays belong to different engine contexts")]
    ContextMismatch,

    #[error("configuration error: {0}")]
    Config(String),
}

/// The engine broke the boundary contract.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Dtype(#[from] DtypeError),

    #[error("{op} returned {found} identifiers, expected {expected}")]
    IdentifierCount {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("engine returned the null identifier")]
    NullHandle,

    #[error("engine reported invalid shape {0:?}")]
    InvalidEngineShape([u64; 4]),

    #[error("engine returned {found} elements for shape {shape}, expected {expected}")]
    ElementCount {
        shape: Shape4,
        expected: u64,
        found: usize,
    },
}

impl From<DtypeError> for ArrayError {
    fn from(err: DtypeError) -> Self {
        ArrayError::Protocol(ProtocolError::Dtype(err))
    }
}

/// Result type for binding-layer operations.
pub type Result<T> = std::result::Result<T, ArrayError>;
