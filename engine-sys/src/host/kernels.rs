//! Reference kernels of the host engine.
//!
//! Storage is rank 4, column-major. Element-wise kernels require equal
//! shapes and equal dtypes; there is no broadcasting or type promotion.

use engine_dtype::{Dtype, HostBuffer};
use num_traits::Float;

use super::scalar::{Arith, Bitwise, Compare, HostScalar, Wide};
use super::HostTensor;
use crate::{EngineError, EngineResult, OpCode};

macro_rules! dispatch {
    ($buf:expr, $data:ident => $body:expr) => {
        match $buf {
            HostBuffer::F32($data) => $body,
            HostBuffer::C32($data) => $body,
            HostBuffer::F64($data) => $body,
            HostBuffer::C64($data) => $body,
            HostBuffer::B8($data) => $body,
            HostBuffer::S32($data) => $body,
            HostBuffer::U32($data) => $body,
            HostBuffer::U8($data) => $body,
            HostBuffer::S64($data) => $body,
            HostBuffer::U64($data) => $body,
            HostBuffer::S16($data) => $body,
            HostBuffer::U16($data) => $body,
        }
    };
}

macro_rules! dispatch_pair {
    ($a:expr, $b:expr, ($x:ident, $y:ident) => $body:expr) => {
        match ($a, $b) {
            (HostBuffer::F32($x), HostBuffer::F32($y)) => $body,
            (HostBuffer::C32($x), HostBuffer::C32($y)) => $body,
            (HostBuffer::F64($x), HostBuffer::F64($y)) => $body,
            (HostBuffer::C64($x), HostBuffer::C64($y)) => $body,
            (HostBuffer::B8($x), HostBuffer::B8($y)) => $body,
            (HostBuffer::S32($x), HostBuffer::S32($y)) => $body,
            (HostBuffer::U32($x), HostBuffer::U32($y)) => $body,
            (HostBuffer::U8($x), HostBuffer::U8($y)) => $body,
            (HostBuffer::S64($x), HostBuffer::S64($y)) => $body,
            (HostBuffer::U64($x), HostBuffer::U64($y)) => $body,
            (HostBuffer::S16($x), HostBuffer::S16($y)) => $body,
            (HostBuffer::U16($x), HostBuffer::U16($y)) => $body,
            (a, b) => Err(EngineError::new(format!(
                "dtype mismatch: {} vs {}",
                a.dtype(),
                b.dtype()
            ))),
        }
    };
}

/// Run `op`. Operand count has been checked by the caller.
///
/// For operations that write their operand, the single returned tensor is
/// the operand's new contents.
pub(crate) fn execute(op: &OpCode, inputs: &[&HostTensor]) -> EngineResult<Vec<HostTensor>> {
    let out = match op {
        OpCode::Add => arith(Arith::Add, inputs[0], inputs[1])?,
        OpCode::Sub => arith(Arith::Sub, inputs[0], inputs[1])?,
        OpCode::Mul => arith(Arith::Mul, inputs[0], inputs[1])?,
        OpCode::Div => arith(Arith::Div, inputs[0], inputs[1])?,
        OpCode::Rem => arith(Arith::Rem, inputs[0], inputs[1])?,
        OpCode::Pow => arith(Arith::Pow, inputs[0], inputs[1])?,
        OpCode::Eq => compare(Compare::Eq, inputs[0], inputs[1])?,
        OpCode::Ne => compare(Compare::Ne, inputs[0], inputs[1])?,
        OpCode::Lt => compare(Compare::Lt, inputs[0], inputs[1])?,
        OpCode::Gt => compare(Compare::Gt, inputs[0], inputs[1])?,
        OpCode::Le => compare(Compare::Le, inputs[0], inputs[1])?,
        OpCode::Ge => compare(Compare::Ge, inputs[0], inputs[1])?,
        OpCode::BitAnd => bitwise(Bitwise::And, inputs[0], inputs[1])?,
        OpCode::BitOr => bitwise(Bitwise::Or, inputs[0], inputs[1])?,
        OpCode::BitXor => bitwise(Bitwise::Xor, inputs[0], inputs[1])?,
        OpCode::ShiftLeft(n) => shift(inputs[0], true, *n)?,
        OpCode::ShiftRight(n) => shift(inputs[0], false, *n)?,
        OpCode::Not => HostTensor {
            dims: inputs[0].dims,
            data: dispatch!(&inputs[0].data, x => not(x)),
        },
        OpCode::Transpose { conjugate } => transpose(inputs[0], *conjugate),
        OpCode::Col(i) => slice_axis(inputs[0], 1, *i, *i)?,
        OpCode::Cols { first, last } => slice_axis(inputs[0], 1, *first, *last)?,
        OpCode::Row(i) => slice_axis(inputs[0], 0, *i, *i)?,
        OpCode::Rows { first, last } => slice_axis(inputs[0], 0, *first, *last)?,
        OpCode::Join { dim } => join(*dim, inputs[0], inputs[1])?,
        OpCode::MatMul => matmul(inputs[0], inputs[1])?,
        OpCode::Cast(dtype) => HostTensor {
            dims: inputs[0].dims,
            data: narrow(*dtype, &dispatch!(&inputs[0].data, x => widen(x))),
        },
        OpCode::ZNorm { epsilon } | OpCode::ZNormInPlace { epsilon } => {
            znorm(inputs[0], *epsilon)?
        }
        OpCode::MeanStdev => return mean_stdev(inputs[0]),
    };
    Ok(vec![out])
}

#[inline]
fn udims(dims: [u64; 4]) -> [usize; 4] {
    dims.map(|d| d as usize)
}

fn same_dims(a: &HostTensor, b: &HostTensor) -> EngineResult<()> {
    if a.dims != b.dims {
        return Err(EngineError::new(format!(
            "dimension mismatch: {:?} vs {:?}",
            a.dims, b.dims
        )));
    }
    Ok(())
}

// ============================================================================
// Element-wise
// ============================================================================

fn zip_arith<T: HostScalar>(op: Arith, x: &[T], y: &[T]) -> EngineResult<HostBuffer> {
    x.iter()
        .zip(y)
        .map(|(&a, &b)| T::arith(op, a, b))
        .collect::<Result<Vec<T>, _>>()
        .map(T::into_buffer)
        .map_err(EngineError::new)
}

fn zip_compare<T: HostScalar>(op: Compare, x: &[T], y: &[T]) -> EngineResult<HostBuffer> {
    x.iter()
        .zip(y)
        .map(|(&a, &b)| T::compare(op, a, b))
        .collect::<Result<Vec<bool>, _>>()
        .map(HostBuffer::B8)
        .map_err(EngineError::new)
}

fn zip_bitwise<T: HostScalar>(op: Bitwise, x: &[T], y: &[T]) -> EngineResult<HostBuffer> {
    x.iter()
        .zip(y)
        .map(|(&a, &b)| T::bitwise(op, a, b))
        .collect::<Result<Vec<T>, _>>()
        .map(T::into_buffer)
        .map_err(EngineError::new)
}

fn arith(op: Arith, a: &HostTensor, b: &HostTensor) -> EngineResult<HostTensor> {
    same_dims(a, b)?;
    let data = dispatch_pair!(&a.data, &b.data, (x, y) => zip_arith(op, x, y))?;
    Ok(HostTensor { dims: a.dims, data })
}

fn compare(op: Compare, a: &HostTensor, b: &HostTensor) -> EngineResult<HostTensor> {
    same_dims(a, b)?;
    let data = dispatch_pair!(&a.data, &b.data, (x, y) => zip_compare(op, x, y))?;
    Ok(HostTensor { dims: a.dims, data })
}

fn bitwise(op: Bitwise, a: &HostTensor, b: &HostTensor) -> EngineResult<HostTensor> {
    same_dims(a, b)?;
    let data = dispatch_pair!(&a.data, &b.data, (x, y) => zip_bitwise(op, x, y))?;
    Ok(HostTensor { dims: a.dims, data })
}

fn shift_values<T: HostScalar>(x: &[T], left: bool, n: u32) -> EngineResult<HostBuffer> {
    x.iter()
        .map(|&v| v.shift(left, n))
        .collect::<Result<Vec<T>, _>>()
        .map(T::into_buffer)
        .map_err(EngineError::new)
}

fn shift(a: &HostTensor, left: bool, n: u32) -> EngineResult<HostTensor> {
    let data = dispatch!(&a.data, x => shift_values(x, left, n))?;
    Ok(HostTensor { dims: a.dims, data })
}

fn not<T: HostScalar>(x: &[T]) -> HostBuffer {
    HostBuffer::B8(x.iter().map(|&v| v == T::zero()).collect())
}

// ============================================================================
// Layout
// ============================================================================

fn transpose_values<T: HostScalar>(x: &[T], dims: [usize; 4], conjugate: bool) -> HostBuffer {
    let [d0, d1, d2, d3] = dims;
    let plane = d0 * d1;
    let mut out = Vec::with_capacity(x.len());
    for b in 0..d2 * d3 {
        for i in 0..d0 {
            for j in 0..d1 {
                let v = x[b * plane + i + d0 * j];
                out.push(if conjugate { T::conj(v) } else { v });
            }
        }
    }
    T::into_buffer(out)
}

fn transpose(a: &HostTensor, conjugate: bool) -> HostTensor {
    let dims = udims(a.dims);
    HostTensor {
        dims: [a.dims[1], a.dims[0], a.dims[2], a.dims[3]],
        data: dispatch!(&a.data, x => transpose_values(x, dims, conjugate)),
    }
}

/// Split `dims` around `axis` into (inner, extent, outer) element counts.
fn around(dims: [usize; 4], axis: usize) -> (usize, usize, usize) {
    let inner = dims[..axis].iter().product();
    let outer = dims[axis + 1..].iter().product();
    (inner, dims[axis], outer)
}

fn slice_values<T: HostScalar>(
    x: &[T],
    dims: [usize; 4],
    axis: usize,
    first: usize,
    last: usize,
) -> HostBuffer {
    let (inner, extent, outer) = around(dims, axis);
    let mut out = Vec::with_capacity(inner * (last - first + 1) * outer);
    for o in 0..outer {
        let base = o * extent * inner;
        out.extend_from_slice(&x[base + first * inner..base + (last + 1) * inner]);
    }
    T::into_buffer(out)
}

fn slice_axis(a: &HostTensor, axis: usize, first: u64, last: u64) -> EngineResult<HostTensor> {
    if first > last || last >= a.dims[axis] {
        return Err(EngineError::new(format!(
            "index range {first}..={last} out of bounds for dimension {axis} of extent {}",
            a.dims[axis]
        )));
    }
    let mut dims = a.dims;
    dims[axis] = last - first + 1;
    let src = udims(a.dims);
    let (first, last) = (first as usize, last as usize);
    Ok(HostTensor {
        dims,
        data: dispatch!(&a.data, x => slice_values(x, src, axis, first, last)),
    })
}

fn join_values<T: HostScalar>(
    x: &[T],
    y: &[T],
    x_dims: [usize; 4],
    y_dims: [usize; 4],
    axis: usize,
) -> EngineResult<HostBuffer> {
    let (inner, x_extent, outer) = around(x_dims, axis);
    let y_extent = y_dims[axis];
    let mut out = Vec::with_capacity(x.len() + y.len());
    for o in 0..outer {
        out.extend_from_slice(&x[o * x_extent * inner..(o + 1) * x_extent * inner]);
        out.extend_from_slice(&y[o * y_extent * inner..(o + 1) * y_extent * inner]);
    }
    Ok(T::into_buffer(out))
}

fn join(dim: u32, a: &HostTensor, b: &HostTensor) -> EngineResult<HostTensor> {
    let axis = dim as usize;
    if axis >= 4 {
        return Err(EngineError::new(format!("join dimension {dim} out of range")));
    }
    for d in (0..4).filter(|&d| d != axis) {
        if a.dims[d] != b.dims[d] {
            return Err(EngineError::new(format!(
                "cannot join {:?} and {:?} along dimension {dim}",
                a.dims, b.dims
            )));
        }
    }
    let mut dims = a.dims;
    dims[axis] += b.dims[axis];
    let (a_dims, b_dims) = (udims(a.dims), udims(b.dims));
    let data = dispatch_pair!(&a.data, &b.data, (x, y) => join_values(x, y, a_dims, b_dims, axis))?;
    Ok(HostTensor { dims, data })
}

fn matmul_values<T: HostScalar>(
    x: &[T],
    y: &[T],
    m: usize,
    k: usize,
    n: usize,
) -> EngineResult<HostBuffer> {
    let mut out = Vec::with_capacity(m * n);
    for j in 0..n {
        for i in 0..m {
            let mut acc = T::zero();
            for l in 0..k {
                let prod = T::arith(Arith::Mul, x[i + m * l], y[l + k * j]);
                acc = T::arith(Arith::Add, acc, prod.map_err(EngineError::new)?)
                    .map_err(EngineError::new)?;
            }
            out.push(acc);
        }
    }
    Ok(T::into_buffer(out))
}

fn matmul(a: &HostTensor, b: &HostTensor) -> EngineResult<HostTensor> {
    let [m, k, a2, a3] = udims(a.dims);
    let [k2, n, b2, b3] = udims(b.dims);
    if a2 * a3 != 1 || b2 * b3 != 1 {
        return Err(EngineError::new("matmul supports 2-D arrays only"));
    }
    if k != k2 {
        return Err(EngineError::new(format!(
            "matmul inner dimensions differ: {m}x{k} * {k2}x{n}"
        )));
    }
    let data = dispatch_pair!(&a.data, &b.data, (x, y) => matmul_values(x, y, m, k, n))?;
    Ok(HostTensor {
        dims: [m as u64, n as u64, 1, 1],
        data,
    })
}

// ============================================================================
// Casts
// ============================================================================

fn widen<T: HostScalar>(x: &[T]) -> Vec<Wide> {
    x.iter().map(|&v| v.to_wide()).collect()
}

fn narrow_to<T: HostScalar>(w: &[Wide]) -> HostBuffer {
    T::into_buffer(w.iter().map(|&v| T::from_wide(v)).collect())
}

fn narrow(dtype: Dtype, w: &[Wide]) -> HostBuffer {
    use engine_dtype::{Complex32, Complex64};
    match dtype {
        Dtype::F32 => narrow_to::<f32>(w),
        Dtype::C32 => narrow_to::<Complex32>(w),
        Dtype::F64 => narrow_to::<f64>(w),
        Dtype::C64 => narrow_to::<Complex64>(w),
        Dtype::B8 => narrow_to::<bool>(w),
        Dtype::S32 => narrow_to::<i32>(w),
        Dtype::U32 => narrow_to::<u32>(w),
        Dtype::U8 => narrow_to::<u8>(w),
        Dtype::S64 => narrow_to::<i64>(w),
        Dtype::U64 => narrow_to::<u64>(w),
        Dtype::S16 => narrow_to::<i16>(w),
        Dtype::U16 => narrow_to::<u16>(w),
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Population mean and standard deviation of one series.
fn moments<T: Float>(series: &[T]) -> (f64, f64) {
    let n = series.len() as f64;
    let values = series.iter().map(|v| v.to_f64().unwrap_or(f64::NAN));
    let mean = values.clone().sum::<f64>() / n;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn znorm_values<T: Float>(x: &[T], len: usize, epsilon: f64) -> Vec<T> {
    let mut out = Vec::with_capacity(x.len());
    for series in x.chunks(len) {
        let (mean, std) = moments(series);
        // Flat series are centered only.
        let scale = if std > epsilon { std } else { 1.0 };
        out.extend(series.iter().map(|v| {
            let z = (v.to_f64().unwrap_or(f64::NAN) - mean) / scale;
            T::from(z).unwrap_or_else(T::nan)
        }));
    }
    out
}

fn znorm(a: &HostTensor, epsilon: f64) -> EngineResult<HostTensor> {
    let len = a.dims[0] as usize;
    let data = match &a.data {
        HostBuffer::F32(x) => HostBuffer::F32(znorm_values(x, len, epsilon)),
        HostBuffer::F64(x) => HostBuffer::F64(znorm_values(x, len, epsilon)),
        other => {
            return Err(EngineError::new(format!(
                "znorm requires a floating-point array, got {}",
                other.dtype()
            )))
        }
    };
    Ok(HostTensor { dims: a.dims, data })
}

fn moment_values<T: Float>(x: &[T], len: usize) -> (Vec<T>, Vec<T>) {
    x.chunks(len)
        .map(|series| {
            let (mean, std) = moments(series);
            (
                T::from(mean).unwrap_or_else(T::nan),
                T::from(std).unwrap_or_else(T::nan),
            )
        })
        .unzip()
}

fn mean_stdev(a: &HostTensor) -> EngineResult<Vec<HostTensor>> {
    let len = a.dims[0] as usize;
    let (means, stdevs) = match &a.data {
        HostBuffer::F32(x) => {
            let (m, s) = moment_values(x, len);
            (HostBuffer::F32(m), HostBuffer::F32(s))
        }
        HostBuffer::F64(x) => {
            let (m, s) = moment_values(x, len);
            (HostBuffer::F64(m), HostBuffer::F64(s))
        }
        other => {
            return Err(EngineError::new(format!(
                "mean_stdev requires a floating-point array, got {}",
                other.dtype()
            )))
        }
    };
    let dims = [1, a.dims[1], a.dims[2], a.dims[3]];
    Ok(vec![
        HostTensor { dims, data: means },
        HostTensor { dims, data: stdevs },
    ])
}
