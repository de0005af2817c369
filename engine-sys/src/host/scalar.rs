//! Per-element semantics of the host engine.

use engine_dtype::{Complex32, Complex64, Element};
use num_complex::Complex;

/// Common representation used for dtype casts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Wide {
    Int(i128),
    Float(f64),
    Complex(Complex64),
    Bool(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Compare {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Bitwise {
    And,
    Or,
    Xor,
}

/// Element result; the message becomes the engine error.
pub(crate) type Kernel<T> = Result<T, &'static str>;

pub(crate) trait HostScalar: Element {
    fn zero() -> Self;
    fn arith(op: Arith, a: Self, b: Self) -> Kernel<Self>;
    fn compare(op: Compare, a: Self, b: Self) -> Kernel<bool>;
    fn bitwise(op: Bitwise, a: Self, b: Self) -> Kernel<Self>;
    fn shift(self, left: bool, n: u32) -> Kernel<Self>;
    fn to_wide(self) -> Wide;
    fn from_wide(w: Wide) -> Self;

    #[inline]
    fn conj(self) -> Self {
        self
    }
}

#[inline]
fn ordered<T: PartialOrd>(op: Compare, a: T, b: T) -> bool {
    match op {
        Compare::Eq => a == b,
        Compare::Ne => a != b,
        Compare::Lt => a < b,
        Compare::Gt => a > b,
        Compare::Le => a <= b,
        Compare::Ge => a >= b,
    }
}

macro_rules! impl_host_int {
    ($($t:ty),*) => {
        $(impl HostScalar for $t {
            #[inline]
            fn zero() -> Self {
                0
            }

            fn arith(op: Arith, a: Self, b: Self) -> Kernel<Self> {
                match op {
                    Arith::Add => Ok(a.wrapping_add(b)),
                    Arith::Sub => Ok(a.wrapping_sub(b)),
                    Arith::Mul => Ok(a.wrapping_mul(b)),
                    Arith::Div => a.checked_div(b).ok_or("integer division by zero"),
                    Arith::Rem => a.checked_rem(b).ok_or("integer remainder by zero"),
                    Arith::Pow => u32::try_from(b)
                        .map(|e| a.wrapping_pow(e))
                        .map_err(|_| "integer exponent out of range"),
                }
            }

            #[inline]
            fn compare(op: Compare, a: Self, b: Self) -> Kernel<bool> {
                Ok(ordered(op, a, b))
            }

            #[inline]
            fn bitwise(op: Bitwise, a: Self, b: Self) -> Kernel<Self> {
                Ok(match op {
                    Bitwise::And => a & b,
                    Bitwise::Or => a | b,
                    Bitwise::Xor => a ^ b,
                })
            }

            #[inline]
            fn shift(self, left: bool, n: u32) -> Kernel<Self> {
                Ok(if left { self.wrapping_shl(n) } else { self.wrapping_shr(n) })
            }

            #[inline]
            fn to_wide(self) -> Wide {
                Wide::Int(self as i128)
            }

            #[inline]
            fn from_wide(w: Wide) -> Self {
                match w {
                    Wide::Int(i) => i as $t,
                    Wide::Float(f) => f as $t,
                    Wide::Complex(c) => c.re as $t,
                    Wide::Bool(b) => b as $t,
                }
            }
        })*
    };
}

impl_host_int!(i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_host_float {
    ($($t:ty),*) => {
        $(impl HostScalar for $t {
            #[inline]
            fn zero() -> Self {
                0.0
            }

            fn arith(op: Arith, a: Self, b: Self) -> Kernel<Self> {
                Ok(match op {
                    Arith::Add => a + b,
                    Arith::Sub => a - b,
                    Arith::Mul => a * b,
                    Arith::Div => a / b,
                    Arith::Rem => a % b,
                    Arith::Pow => a.powf(b),
                })
            }

            #[inline]
            fn compare(op: Compare, a: Self, b: Self) -> Kernel<bool> {
                Ok(ordered(op, a, b))
            }

            fn bitwise(_: Bitwise, _: Self, _: Self) -> Kernel<Self> {
                Err("bitwise operation on a floating-point array")
            }

            fn shift(self, _: bool, _: u32) -> Kernel<Self> {
                Err("shift on a floating-point array")
            }

            #[inline]
            fn to_wide(self) -> Wide {
                Wide::Float(self as f64)
            }

            #[inline]
            fn from_wide(w: Wide) -> Self {
                match w {
                    Wide::Int(i) => i as $t,
                    Wide::Float(f) => f as $t,
                    Wide::Complex(c) => c.re as $t,
                    Wide::Bool(b) => if b { 1.0 } else { 0.0 },
                }
            }
        })*
    };
}

impl_host_float!(f32, f64);

macro_rules! impl_host_complex {
    ($($t:ty => $f:ty),*) => {
        $(impl HostScalar for $t {
            #[inline]
            fn zero() -> Self {
                Complex::new(0.0, 0.0)
            }

            fn arith(op: Arith, a: Self, b: Self) -> Kernel<Self> {
                match op {
                    Arith::Add => Ok(a + b),
                    Arith::Sub => Ok(a - b),
                    Arith::Mul => Ok(a * b),
                    Arith::Div => Ok(a / b),
                    Arith::Rem => Err("remainder on a complex array"),
                    Arith::Pow => Ok(a.powc(b)),
                }
            }

            fn compare(op: Compare, a: Self, b: Self) -> Kernel<bool> {
                match op {
                    Compare::Eq => Ok(a == b),
                    Compare::Ne => Ok(a != b),
                    _ => Err("ordering comparison on a complex array"),
                }
            }

            fn bitwise(_: Bitwise, _: Self, _: Self) -> Kernel<Self> {
                Err("bitwise operation on a complex array")
            }

            fn shift(self, _: bool, _: u32) -> Kernel<Self> {
                Err("shift on a complex array")
            }

            #[inline]
            fn to_wide(self) -> Wide {
                Wide::Complex(Complex64::new(self.re as f64, self.im as f64))
            }

            #[inline]
            fn from_wide(w: Wide) -> Self {
                match w {
                    Wide::Int(i) => Complex::new(i as $f, 0.0),
                    Wide::Float(f) => Complex::new(f as $f, 0.0),
                    Wide::Complex(c) => Complex::new(c.re as $f, c.im as $f),
                    Wide::Bool(b) => Complex::new(if b { 1.0 } else { 0.0 }, 0.0),
                }
            }

            #[inline]
            fn conj(self) -> Self {
                Complex::conj(&self)
            }
        })*
    };
}

impl_host_complex!(Complex32 => f32, Complex64 => f64);

impl HostScalar for bool {
    #[inline]
    fn zero() -> Self {
        false
    }

    fn arith(_: Arith, _: Self, _: Self) -> Kernel<Self> {
        Err("arithmetic on a b8 array")
    }

    #[inline]
    fn compare(op: Compare, a: Self, b: Self) -> Kernel<bool> {
        Ok(ordered(op, a, b))
    }

    #[inline]
    fn bitwise(op: Bitwise, a: Self, b: Self) -> Kernel<Self> {
        Ok(match op {
            Bitwise::And => a & b,
            Bitwise::Or => a | b,
            Bitwise::Xor => a ^ b,
        })
    }

    fn shift(self, _: bool, _: u32) -> Kernel<Self> {
        Err("shift on a b8 array")
    }

    #[inline]
    fn to_wide(self) -> Wide {
        Wide::Bool(self)
    }

    #[inline]
    fn from_wide(w: Wide) -> Self {
        match w {
            Wide::Int(i) => i != 0,
            Wide::Float(f) => f != 0.0,
            Wide::Complex(c) => c.re != 0.0 || c.im != 0.0,
            Wide::Bool(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arith_wraps() {
        assert_eq!(u8::arith(Arith::Add, 250, 10), Ok(4));
        assert_eq!(i16::arith(Arith::Mul, i16::MAX, 2), Ok(-2));
        assert_eq!(i32::arith(Arith::Pow, 3, 4), Ok(81));
        assert!(i32::arith(Arith::Pow, 3, -1).is_err());
        assert!(u64::arith(Arith::Div, 1, 0).is_err());
    }

    #[test]
    fn test_complex_rules() {
        let a = Complex64::new(1.0, 2.0);
        assert_eq!(Complex64::arith(Arith::Mul, a, a), Ok(Complex64::new(-3.0, 4.0)));
        assert!(Complex64::compare(Compare::Lt, a, a).is_err());
        assert_eq!(Complex64::compare(Compare::Eq, a, a), Ok(true));
        assert_eq!(a.conj(), Complex64::new(1.0, -2.0));
    }

    #[test]
    fn test_casts_through_wide() {
        assert_eq!(u8::from_wide((-1i32).to_wide()), 255);
        assert_eq!(i32::from_wide(2.9f64.to_wide()), 2);
        assert!(bool::from_wide(0.5f32.to_wide()));
        assert_eq!(f64::from_wide(true.to_wide()), 1.0);
        assert_eq!(
            Complex32::from_wide(7u16.to_wide()),
            Complex32::new(7.0, 0.0)
        );
        assert_eq!(f32::from_wide(Complex64::new(1.5, 9.0).to_wide()), 1.5);
    }

    #[test]
    fn test_bool_rejects_arithmetic() {
        assert!(bool::arith(Arith::Add, true, true).is_err());
        assert_eq!(bool::bitwise(Bitwise::Xor, true, true), Ok(false));
    }
}
