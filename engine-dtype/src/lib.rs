//! Dtype model and wire codecs shared by the engine-array crates.
//!
//! The native engine identifies element types by integer ordinal and moves
//! data across the boundary as flat, column-major element records. This crate
//! owns both halves of that contract:
//!
//! - [`Dtype`]: the closed set of 12 element types, ordinal-stable
//! - [`Element`]: sealed trait binding each host element type to its [`Dtype`]
//! - [`HostBuffer`]: a typed host buffer, one variant per dtype
//! - [`Codec`]: the registered encode/decode pair for each dtype
//!
//! # Example
//!
//! ```rust
//! use engine_dtype::{Codec, Dtype, HostBuffer};
//!
//! let buffer = HostBuffer::from(vec![1.0f32, 2.0, 3.0]);
//! let codec = Codec::for_dtype(buffer.dtype());
//! let wire = codec.encode(&buffer).unwrap();
//! assert_eq!(wire.len(), 3 * Dtype::F32.element_size());
//! assert_eq!(codec.decode(&wire).unwrap(), buffer);
//! ```

mod codec;
mod dtype;
mod element;

pub use codec::{verify_registry, Codec, DecodeFn, EncodeFn};
pub use dtype::Dtype;
pub use element::{Element, HostBuffer};

pub use num_complex::{Complex32, Complex64};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while decoding dtype ordinals or wire buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DtypeError {
    /// The engine reported an ordinal outside the declared enumeration.
    #[error("unknown dtype ordinal {0}")]
    UnknownOrdinal(i32),

    /// A codec was handed a buffer of another dtype.
    #[error("buffer dtype mismatch: codec for {expected}, buffer is {found}")]
    BufferMismatch { expected: Dtype, found: Dtype },

    /// Wire bytes cannot be interpreted as records of the given dtype.
    #[error("malformed {dtype} wire buffer of {len} bytes: {detail}")]
    MalformedWire {
        dtype: Dtype,
        len: usize,
        detail: &'static str,
    },

    /// A registry slot holds the codec of a different dtype.
    #[error("codec registry slot {slot} holds {found}")]
    RegistryOrder { slot: usize, found: Dtype },
}

/// Result type for dtype and codec operations.
pub type Result<T> = std::result::Result<T, DtypeError>;
