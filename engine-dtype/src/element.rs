use num_complex::{Complex32, Complex64};

use crate::Dtype;

/// A typed host buffer, one variant per [`Dtype`].
///
/// This is the host-native side of marshaling: arrays are uploaded from and
/// read back into a `HostBuffer`. Elements are in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostBuffer {
    F32(Vec<f32>),
    C32(Vec<Complex32>),
    F64(Vec<f64>),
    C64(Vec<Complex64>),
    B8(Vec<bool>),
    S32(Vec<i32>),
    U32(Vec<u32>),
    U8(Vec<u8>),
    S64(Vec<i64>),
    U64(Vec<u64>),
    S16(Vec<i16>),
    U16(Vec<u16>),
}

impl HostBuffer {
    pub fn dtype(&self) -> Dtype {
        match self {
            HostBuffer::F32(_) => Dtype::F32,
            HostBuffer::C32(_) => Dtype::C32,
            HostBuffer::F64(_) => Dtype::F64,
            HostBuffer::C64(_) => Dtype::C64,
            HostBuffer::B8(_) => Dtype::B8,
            HostBuffer::S32(_) => Dtype::S32,
            HostBuffer::U32(_) => Dtype::U32,
            HostBuffer::U8(_) => Dtype::U8,
            HostBuffer::S64(_) => Dtype::S64,
            HostBuffer::U64(_) => Dtype::U64,
            HostBuffer::S16(_) => Dtype::S16,
            HostBuffer::U16(_) => Dtype::U16,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            HostBuffer::F32(v) => v.len(),
            HostBuffer::C32(v) => v.len(),
            HostBuffer::F64(v) => v.len(),
            HostBuffer::C64(v) => v.len(),
            HostBuffer::B8(v) => v.len(),
            HostBuffer::S32(v) => v.len(),
            HostBuffer::U32(v) => v.len(),
            HostBuffer::U8(v) => v.len(),
            HostBuffer::S64(v) => v.len(),
            HostBuffer::U64(v) => v.len(),
            HostBuffer::S16(v) => v.len(),
            HostBuffer::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the elements as `T`, or `None` if the dtype differs.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::as_slice(self)
    }

    /// Take the elements as `Vec<T>`, handing the buffer back on a dtype mismatch.
    pub fn into_vec<T: Element>(self) -> std::result::Result<Vec<T>, HostBuffer> {
        T::from_buffer(self)
    }
}

mod private {
    pub trait Sealed {}
}

/// Host element types that have a matching [`Dtype`].
///
/// Sealed: implemented exactly once per dtype, for `f32`, `Complex32`, `f64`,
/// `Complex64`, `bool`, `i32`, `u32`, `u8`, `i64`, `u64`, `i16` and `u16`.
pub trait Element: private::Sealed + Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// The dtype this element type uploads as.
    const DTYPE: Dtype;

    /// Wrap a vector into its [`HostBuffer`] variant.
    fn into_buffer(data: Vec<Self>) -> HostBuffer;

    /// Unwrap the matching variant, or return the buffer unchanged.
    fn from_buffer(buffer: HostBuffer) -> std::result::Result<Vec<Self>, HostBuffer>;

    /// Borrow the matching variant.
    fn as_slice(buffer: &HostBuffer) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl private::Sealed for $t {}

            impl Element for $t {
                const DTYPE: Dtype = Dtype::$variant;

                #[inline]
                fn into_buffer(data: Vec<Self>) -> HostBuffer {
                    HostBuffer::$variant(data)
                }

                #[inline]
                fn from_buffer(buffer: HostBuffer) -> std::result::Result<Vec<Self>, HostBuffer> {
                    match buffer {
                        HostBuffer::$variant(data) => Ok(data),
                        other => Err(other),
                    }
                }

                #[inline]
                fn as_slice(buffer: &HostBuffer) -> Option<&[Self]> {
                    match buffer {
                        HostBuffer::$variant(data) => Some(data),
                        _ => None,
                    }
                }
            }

            impl From<Vec<$t>> for HostBuffer {
                fn from(data: Vec<$t>) -> Self {
                    HostBuffer::$variant(data)
                }
            }
        )*
    };
}

impl_element!(
    f32 => F32,
    Complex32 => C32,
    f64 => F64,
    Complex64 => C64,
    bool => B8,
    i32 => S32,
    u32 => U32,
    u8 => U8,
    i64 => S64,
    u64 => U64,
    i16 => S16,
    u16 => U16,
);
