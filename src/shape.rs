use std::fmt;

use crate::{ArrayError, ProtocolError, Result};

/// Rank-4 dimension vector. Unused trailing dimensions are 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Shape4([u64; 4]);

impl Shape4 {
    /// Right-pad `dims` with 1s to rank 4.
    ///
    /// An empty `dims` is a scalar, `[1, 1, 1, 1]`. Fails with
    /// [`ArrayError::InvalidShape`] for rank above 4, a zero dimension, or
    /// an element count that does not fit in `u64`.
    pub fn normalize(dims: &[u64]) -> Result<Self> {
        if dims.len() > 4 {
            return Err(ArrayError::InvalidShape {
                dims: dims.to_vec(),
                reason: "rank exceeds 4",
            });
        }
        if dims.contains(&0) {
            return Err(ArrayError::InvalidShape {
                dims: dims.to_vec(),
                reason: "dimensions must be at least 1",
            });
        }
        if checked_elements(dims).is_none() {
            return Err(ArrayError::InvalidShape {
                dims: dims.to_vec(),
                reason: "element count overflows",
            });
        }
        let mut out = [1u64; 4];
        out[..dims.len()].copy_from_slice(dims);
        Ok(Self(out))
    }

    /// Shape as reported by the engine; already rank 4.
    pub(crate) fn from_engine(dims: [u64; 4]) -> std::result::Result<Self, ProtocolError> {
        if dims.contains(&0) || checked_elements(&dims).is_none() {
            return Err(ProtocolError::InvalidEngineShape(dims));
        }
        Ok(Self(dims))
    }

    #[inline]
    pub const fn dims(&self) -> [u64; 4] {
        self.0
    }

    /// Number of elements, the product of all four dimensions.
    ///
    /// Never overflows: construction rejects such shapes.
    #[inline]
    pub fn elements(&self) -> u64 {
        self.0.iter().product()
    }

    /// Rank ignoring trailing unit dimensions.
    pub fn rank(&self) -> usize {
        self.0.iter().rposition(|&d| d != 1).map_or(0, |i| i + 1)
    }

    /// Require `len` to equal [`elements`](Self::elements) exactly.
    pub fn validate_len(&self, len: usize) -> Result<()> {
        let expected = self.elements();
        if u64::try_from(len).map_or(true, |len| len != expected) {
            return Err(ArrayError::ShapeMismatch {
                expected,
                found: len,
            });
        }
        Ok(())
    }
}

fn checked_elements(dims: &[u64]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

impl From<Shape4> for [u64; 4] {
    fn from(shape: Shape4) -> Self {
        shape.0
    }
}

impl fmt::Display for Shape4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}x{b}x{c}x{d}")
    }
}
