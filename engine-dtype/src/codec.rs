//! Per-dtype encode/decode pairs between [`HostBuffer`] and engine wire bytes.
//!
//! Wire format: contiguous native-endian records, `Dtype::element_size()`
//! bytes each. `b8` is one byte holding 0 or 1. Complex elements are
//! interleaved `[re, im]` pairs of the component type.
//!
//! Unsigned integers share the reader of the signed type with the same
//! width: the engine stores both identically, so decoding reads signed words
//! and reinterprets the bits.

use bytemuck::Pod;
use num_complex::Complex;

use crate::{Dtype, DtypeError, Element, HostBuffer, Result};

/// Serializes a host buffer into the engine's wire form.
pub type EncodeFn = fn(&HostBuffer) -> Result<Vec<u8>>;

/// Reconstructs a host buffer from engine wire bytes.
pub type DecodeFn = fn(&[u8]) -> Result<HostBuffer>;

/// A registered encode/decode pair for one dtype.
#[derive(Clone, Copy)]
pub struct Codec {
    dtype: Dtype,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("dtype", &self.dtype).finish()
    }
}

/// Codec table in ordinal order. Every dtype has an explicit entry.
static REGISTRY: [Codec; Dtype::COUNT] = [
    Codec::new(Dtype::F32, encode_pod::<f32>, decode_f32),
    Codec::new(Dtype::C32, encode_complex::<f32>, decode_c32),
    Codec::new(Dtype::F64, encode_pod::<f64>, decode_f64),
    Codec::new(Dtype::C64, encode_complex::<f64>, decode_c64),
    Codec::new(Dtype::B8, encode_b8, decode_b8),
    Codec::new(Dtype::S32, encode_pod::<i32>, decode_s32),
    Codec::new(Dtype::U32, encode_pod::<u32>, decode_u32),
    Codec::new(Dtype::U8, encode_pod::<u8>, decode_u8),
    Codec::new(Dtype::S64, encode_pod::<i64>, decode_s64),
    Codec::new(Dtype::U64, encode_pod::<u64>, decode_u64),
    Codec::new(Dtype::S16, encode_pod::<i16>, decode_s16),
    Codec::new(Dtype::U16, encode_pod::<u16>, decode_u16),
];

impl Codec {
    const fn new(dtype: Dtype, encode: EncodeFn, decode: DecodeFn) -> Self {
        Self {
            dtype,
            encode,
            decode,
        }
    }

    /// The registered codec for `dtype`.
    #[inline]
    pub fn for_dtype(dtype: Dtype) -> &'static Codec {
        &REGISTRY[dtype.ordinal() as usize]
    }

    #[inline]
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    #[inline]
    pub fn encoder(&self) -> EncodeFn {
        self.encode
    }

    #[inline]
    pub fn decoder(&self) -> DecodeFn {
        self.decode
    }

    /// Encode `buffer`, which must hold this codec's dtype.
    pub fn encode(&self, buffer: &HostBuffer) -> Result<Vec<u8>> {
        if buffer.dtype() != self.dtype {
            return Err(DtypeError::BufferMismatch {
                expected: self.dtype,
                found: buffer.dtype(),
            });
        }
        (self.encode)(buffer)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<HostBuffer> {
        (self.decode)(bytes)
    }
}

/// Check that every registry slot holds the codec for its ordinal.
///
/// Run once when an engine context starts; a failure means this build of the
/// crate is inconsistent and nothing should be sent to the engine.
pub fn verify_registry() -> Result<()> {
    for (slot, codec) in REGISTRY.iter().enumerate() {
        if codec.dtype.ordinal() as usize != slot {
            return Err(DtypeError::RegistryOrder {
                slot,
                found: codec.dtype,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Encoders
// ============================================================================

fn slice_of<T: Element>(buffer: &HostBuffer) -> Result<&[T]> {
    T::as_slice(buffer).ok_or(DtypeError::BufferMismatch {
        expected: T::DTYPE,
        found: buffer.dtype(),
    })
}

fn encode_pod<T: Element + Pod>(buffer: &HostBuffer) -> Result<Vec<u8>> {
    Ok(bytemuck::cast_slice::<T, u8>(slice_of::<T>(buffer)?).to_vec())
}

fn encode_complex<T>(buffer: &HostBuffer) -> Result<Vec<u8>>
where
    T: Pod,
    Complex<T>: Element,
{
    let pairs: Vec<[T; 2]> = slice_of::<Complex<T>>(buffer)?
        .iter()
        .map(|c| [c.re, c.im])
        .collect();
    Ok(bytemuck::cast_slice(&pairs).to_vec())
}

fn encode_b8(buffer: &HostBuffer) -> Result<Vec<u8>> {
    Ok(slice_of::<bool>(buffer)?
        .iter()
        .map(|&b| u8::from(b))
        .collect())
}

// ============================================================================
// Decoders
// ============================================================================

/// Read `bytes` as records of `W`, the wire word for `dtype`.
fn read_words<W: Pod>(dtype: Dtype, bytes: &[u8]) -> Result<Vec<W>> {
    let size = std::mem::size_of::<W>();
    debug_assert_eq!(size, dtype.element_size());
    if bytes.len() % size != 0 {
        return Err(DtypeError::MalformedWire {
            dtype,
            len: bytes.len(),
            detail: "length is not a multiple of the element size",
        });
    }
    // Wire buffers carry no alignment guarantee.
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned::<W>)
        .collect())
}

fn decode_f32(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::F32(read_words::<f32>(Dtype::F32, bytes)?))
}

fn decode_f64(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::F64(read_words::<f64>(Dtype::F64, bytes)?))
}

fn read_complex<T: Pod>(dtype: Dtype, bytes: &[u8]) -> Result<Vec<Complex<T>>> {
    Ok(read_words::<[T; 2]>(dtype, bytes)?
        .into_iter()
        .map(|[re, im]| Complex::new(re, im))
        .collect())
}

fn decode_c32(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::C32(read_complex(Dtype::C32, bytes)?))
}

fn decode_c64(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::C64(read_complex(Dtype::C64, bytes)?))
}

fn decode_b8(bytes: &[u8]) -> Result<HostBuffer> {
    bytes
        .iter()
        .map(|&b| match b {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DtypeError::MalformedWire {
                dtype: Dtype::B8,
                len: bytes.len(),
                detail: "b8 byte other than 0 or 1",
            }),
        })
        .collect::<Result<Vec<bool>>>()
        .map(HostBuffer::B8)
}

fn decode_u8(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::U8(bytes.to_vec()))
}

fn decode_s16(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::S16(read_words::<i16>(Dtype::S16, bytes)?))
}

fn decode_u16(bytes: &[u8]) -> Result<HostBuffer> {
    let words = read_words::<i16>(Dtype::U16, bytes)?;
    Ok(HostBuffer::U16(words.into_iter().map(|w| w as u16).collect()))
}

fn decode_s32(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::S32(read_words::<i32>(Dtype::S32, bytes)?))
}

fn decode_u32(bytes: &[u8]) -> Result<HostBuffer> {
    let words = read_words::<i32>(Dtype::U32, bytes)?;
    Ok(HostBuffer::U32(words.into_iter().map(|w| w as u32).collect()))
}

fn decode_s64(bytes: &[u8]) -> Result<HostBuffer> {
    Ok(HostBuffer::S64(read_words::<i64>(Dtype::S64, bytes)?))
}

fn decode_u64(bytes: &[u8]) -> Result<HostBuffer> {
    let words = read_words::<i64>(Dtype::U64, bytes)?;
    Ok(HostBuffer::U64(words.into_iter().map(|w| w as u64).collect()))
}
