use std::fmt;

use crate::{DtypeError, Result};

/// Element type of an engine array.
///
/// Declaration order is the wire contract: the engine reports dtypes by
/// ordinal and `Dtype::ALL[ordinal]` must name the same type. Reordering or
/// inserting variants breaks every engine build this crate talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// 32-bit float.
    F32,
    /// Complex of two 32-bit floats.
    C32,
    /// 64-bit float.
    F64,
    /// Complex of two 64-bit floats.
    C64,
    /// Boolean, one byte per element.
    B8,
    /// Signed 32-bit integer.
    S32,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 64-bit integer.
    S64,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 16-bit integer.
    S16,
    /// Unsigned 16-bit integer.
    U16,
}

impl Dtype {
    /// Number of declared dtypes.
    pub const COUNT: usize = 12;

    /// Every dtype, indexed by ordinal.
    pub const ALL: [Dtype; Dtype::COUNT] = [
        Dtype::F32,
        Dtype::C32,
        Dtype::F64,
        Dtype::C64,
        Dtype::B8,
        Dtype::S32,
        Dtype::U32,
        Dtype::U8,
        Dtype::S64,
        Dtype::U64,
        Dtype::S16,
        Dtype::U16,
    ];

    /// Decode an engine-reported ordinal.
    ///
    /// Unknown ordinals are an error; there is no fallback dtype.
    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(DtypeError::UnknownOrdinal(ordinal))
    }

    /// Ordinal reported to and by the engine.
    #[inline]
    pub const fn ordinal(self) -> i32 {
        self as i32
    }

    /// Bytes per element record on the wire.
    pub const fn element_size(self) -> usize {
        match self {
            Dtype::B8 | Dtype::U8 => 1,
            Dtype::S16 | Dtype::U16 => 2,
            Dtype::F32 | Dtype::S32 | Dtype::U32 => 4,
            Dtype::F64 | Dtype::C32 | Dtype::S64 | Dtype::U64 => 8,
            Dtype::C64 => 16,
        }
    }

    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Dtype::C32 | Dtype::C64)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Dtype::F32 | Dtype::F64)
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Dtype::S16
                | Dtype::S32
                | Dtype::S64
                | Dtype::U8
                | Dtype::U16
                | Dtype::U32
                | Dtype::U64
        )
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Dtype::S16 | Dtype::S32 | Dtype::S64 | Dtype::F32 | Dtype::F64
        ) || self.is_complex()
    }

    /// Short lowercase name, e.g. `"c32"`.
    pub const fn name(self) -> &'static str {
        match self {
            Dtype::F32 => "f32",
            Dtype::C32 => "c32",
            Dtype::F64 => "f64",
            Dtype::C64 => "c64",
            Dtype::B8 => "b8",
            Dtype::S32 => "s32",
            Dtype::U32 => "u32",
            Dtype::U8 => "u8",
            Dtype::S64 => "s64",
            Dtype::U64 => "u64",
            Dtype::S16 => "s16",
            Dtype::U16 => "u16",
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
