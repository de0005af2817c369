//! Operation surface of [`Array`].
//!
//! Every operation goes through [`call`] and returns new arrays; operands
//! stay valid under either call convention.

use engine_dtype::Dtype;
use engine_sys::OpCode;

use crate::{call, Array, ProtocolError, Result};

/// Take the single result of a one-result operation.
fn single(op: &OpCode, mut results: Vec<Array>) -> Result<Array> {
    match results.len() {
        1 => Ok(results.remove(0)),
        found => Err(ProtocolError::IdentifierCount {
            op: op.name(),
            expected: 1,
            found,
        }
        .into()),
    }
}

fn unary(op: OpCode, a: &Array) -> Result<Array> {
    let results = call(op.clone(), &[a])?;
    single(&op, results)
}

fn binary(op: OpCode, a: &Array, b: &Array) -> Result<Array> {
    let results = call(op.clone(), &[a, b])?;
    single(&op, results)
}

macro_rules! binary_ops {
    ($($(#[$doc:meta])* $name:ident => $op:ident;)*) => {
        #[allow(clippy::should_implement_trait)]
        impl Array {
            $(
                $(#[$doc])*
                pub fn $name(&self, rhs: &Array) -> Result<Array> {
                    binary(OpCode::$op, self, rhs)
                }
            )*
        }
    };
}

binary_ops! {
    /// Element-wise sum. Operands must share dtype and shape.
    add => Add;
    sub => Sub;
    mul => Mul;
    /// Element-wise quotient. Integer division by zero is an engine failure.
    div => Div;
    rem => Rem;
    pow => Pow;
    /// Element-wise comparisons produce `b8` arrays.
    eq => Eq;
    ne => Ne;
    lt => Lt;
    gt => Gt;
    le => Le;
    ge => Ge;
    /// Bitwise operations accept integer and `b8` arrays.
    bit_and => BitAnd;
    bit_or => BitOr;
    bit_xor => BitXor;
    /// Matrix product of two 2-D arrays.
    matmul => MatMul;
}

#[allow(clippy::should_implement_trait)]
impl Array {
    pub fn shift_left(&self, bits: u32) -> Result<Array> {
        unary(OpCode::ShiftLeft(bits), self)
    }

    pub fn shift_right(&self, bits: u32) -> Result<Array> {
        unary(OpCode::ShiftRight(bits), self)
    }

    /// `b8` array, true where the element is zero (or false).
    pub fn not(&self) -> Result<Array> {
        unary(OpCode::Not, self)
    }

    /// Swap the first two dimensions, conjugating complex elements if asked.
    pub fn transpose(&self, conjugate: bool) -> Result<Array> {
        unary(OpCode::Transpose { conjugate }, self)
    }

    pub fn col(&self, index: u64) -> Result<Array> {
        unary(OpCode::Col(index), self)
    }

    /// Columns `first..=last`.
    pub fn cols(&self, first: u64, last: u64) -> Result<Array> {
        unary(OpCode::Cols { first, last }, self)
    }

    pub fn row(&self, index: u64) -> Result<Array> {
        unary(OpCode::Row(index), self)
    }

    /// Rows `first..=last`.
    pub fn rows(&self, first: u64, last: u64) -> Result<Array> {
        unary(OpCode::Rows { first, last }, self)
    }

    /// Concatenate along zero-based dimension `dim`. All other dimensions
    /// must agree.
    pub fn join(dim: u32, first: &Array, second: &Array) -> Result<Array> {
        binary(OpCode::Join { dim }, first, second)
    }

    /// Convert every element to `dtype`.
    pub fn cast(&self, dtype: Dtype) -> Result<Array> {
        unary(OpCode::Cast(dtype), self)
    }
}
