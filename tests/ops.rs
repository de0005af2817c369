use approx::assert_abs_diff_eq;
use engine_array::{normalization, Array, ArrayError, Complex64, Dtype, EngineContext};
use engine_sys::HostEngine;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn ctx() -> EngineContext {
    EngineContext::new(HostEngine::new()).unwrap()
}

#[test]
fn test_arithmetic_matches_host() {
    let ctx = ctx();
    let mut rng = StdRng::seed_from_u64(11);
    let x: Vec<f64> = (0..24).map(|_| rng.gen_range(0.5..2.0)).collect();
    let y: Vec<f64> = (0..24).map(|_| rng.gen_range(0.5..2.0)).collect();
    let a = Array::from_slice(&ctx, &x, &[2, 3, 4]).unwrap();
    let b = Array::from_slice(&ctx, &y, &[2, 3, 4]).unwrap();

    let cases: [(fn(&Array, &Array) -> engine_array::Result<Array>, fn(f64, f64) -> f64); 5] = [
        (Array::add, |p, q| p + q),
        (Array::sub, |p, q| p - q),
        (Array::mul, |p, q| p * q),
        (Array::div, |p, q| p / q),
        (Array::pow, f64::powf),
    ];
    for (op, host) in cases {
        let out = op(&a, &b).unwrap();
        assert_eq!(out.shape().unwrap(), a.shape().unwrap());
        for (got, (p, q)) in out.to_vec::<f64>().unwrap().iter().zip(x.iter().zip(&y)) {
            assert_abs_diff_eq!(*got, host(*p, *q), epsilon = 1e-12);
        }
    }
}

#[test]
fn test_comparisons_produce_b8() {
    let ctx = ctx();
    let a = Array::from_slice(&ctx, &[1i64, 5, 3], &[3]).unwrap();
    let b = Array::from_slice(&ctx, &[2i64, 5, 1], &[3]).unwrap();
    let lt = a.lt(&b).unwrap();
    assert_eq!(lt.dtype().unwrap(), Dtype::B8);
    assert_eq!(lt.to_vec::<bool>().unwrap(), vec![true, false, false]);
    assert_eq!(a.eq(&b).unwrap().to_vec::<bool>().unwrap(), vec![false, true, false]);
    assert_eq!(a.ne(&b).unwrap().to_vec::<bool>().unwrap(), vec![true, false, true]);
    assert_eq!(a.ge(&b).unwrap().to_vec::<bool>().unwrap(), vec![false, true, true]);
    assert_eq!(a.le(&b).unwrap().to_vec::<bool>().unwrap(), vec![true, true, false]);
}

#[test]
fn test_bitwise() {
    let ctx = ctx();
    let a = Array::from_slice(&ctx, &[0b1100u8, 0xff, 0], &[3]).unwrap();
    let b = Array::from_slice(&ctx, &[0b1010u8, 0x0f, 0], &[3]).unwrap();
    assert_eq!(a.bit_and(&b).unwrap().to_vec::<u8>().unwrap(), vec![0b1000, 0x0f, 0]);
    assert_eq!(a.bit_or(&b).unwrap().to_vec::<u8>().unwrap(), vec![0b1110, 0xff, 0]);
    assert_eq!(a.bit_xor(&b).unwrap().to_vec::<u8>().unwrap(), vec![0b0110, 0xf0, 0]);
    assert_eq!(a.shift_left(1).unwrap().to_vec::<u8>().unwrap(), vec![0b11000, 0xfe, 0]);
    assert_eq!(a.shift_right(4).unwrap().to_vec::<u8>().unwrap(), vec![0, 0x0f, 0]);
    assert_eq!(a.not().unwrap().to_vec::<bool>().unwrap(), vec![false, false, true]);

    let f = Array::from_slice(&ctx, &[1.0f32], &[1]).unwrap();
    assert!(matches!(f.bit_and(&f), Err(ArrayError::Engine(_))));
}

#[test]
fn test_layout_ops() {
    let ctx = ctx();
    // 2x3, column-major: [[1, 3, 5], [2, 4, 6]]
    let a = Array::from_slice(&ctx, &[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();

    let t = a.transpose(false).unwrap();
    assert_eq!(t.shape().unwrap().dims(), [3, 2, 1, 1]);
    assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, 3, 5, 2, 4, 6]);

    assert_eq!(a.col(2).unwrap().to_vec::<i32>().unwrap(), vec![5, 6]);
    assert_eq!(a.cols(0, 1).unwrap().to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(a.row(0).unwrap().to_vec::<i32>().unwrap(), vec![1, 3, 5]);
    assert_eq!(a.rows(0, 1).unwrap().to_vec::<i32>().unwrap(), a.to_vec::<i32>().unwrap());
    assert!(matches!(a.col(3), Err(ArrayError::Engine(_))));

    let j = Array::join(1, &a, &a.col(0).unwrap()).unwrap();
    assert_eq!(j.shape().unwrap().dims(), [2, 4, 1, 1]);
    assert_eq!(j.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4, 5, 6, 1, 2]);
    let j0 = Array::join(0, &a, &a).unwrap();
    assert_eq!(j0.shape().unwrap().dims(), [4, 3, 1, 1]);
}

#[test]
fn test_conjugate_transpose() {
    let ctx = ctx();
    let z = [Complex64::new(1.0, 2.0), Complex64::new(3.0, -4.0)];
    let a = Array::from_slice(&ctx, &z, &[2]).unwrap();
    let h = a.transpose(true).unwrap();
    assert_eq!(h.shape().unwrap().dims(), [1, 2, 1, 1]);
    assert_eq!(
        h.to_vec::<Complex64>().unwrap(),
        vec![Complex64::new(1.0, -2.0), Complex64::new(3.0, 4.0)]
    );
}

#[test]
fn test_matmul() {
    let ctx = ctx();
    // [[1, 2, 3], [4, 5, 6]] * [[1], [0], [-1]]
    let a = Array::from_slice(&ctx, &[1.0f64, 4.0, 2.0, 5.0, 3.0, 6.0], &[2, 3]).unwrap();
    let v = Array::from_slice(&ctx, &[1.0f64, 0.0, -1.0], &[3, 1]).unwrap();
    let c = a.matmul(&v).unwrap();
    assert_eq!(c.shape().unwrap().dims(), [2, 1, 1, 1]);
    assert_eq!(c.to_vec::<f64>().unwrap(), vec![-2.0, -2.0]);
    assert!(matches!(v.matmul(&v), Err(ArrayError::Engine(_))));
}

#[test]
fn test_cast_chain() {
    let ctx = ctx();
    let a = Array::from_slice(&ctx, &[-1.5f32, 0.0, 2.7], &[3]).unwrap();
    let s = a.cast(Dtype::S16).unwrap();
    assert_eq!(s.to_vec::<i16>().unwrap(), vec![-1, 0, 2]);
    let b = s.cast(Dtype::B8).unwrap();
    assert_eq!(b.to_vec::<bool>().unwrap(), vec![true, false, true]);
    let c = b.cast(Dtype::C64).unwrap();
    assert_eq!(c.to_vec::<Complex64>().unwrap()[0], Complex64::new(1.0, 0.0));
}

#[test]
fn test_forwarding_normalization() {
    let ctx = ctx();
    let a = Array::from_slice(&ctx, &[1.0f32, 2.0, 3.0, 4.0, 4.0, 4.0], &[3, 2]).unwrap();
    let z = normalization::znorm(&a, normalization::DEFAULT_EPSILON).unwrap();
    let z = z.to_vec::<f32>().unwrap();
    let s = (2.0f32 / 3.0).sqrt();
    assert_abs_diff_eq!(z[0], -1.0 / s, epsilon = 1e-6);
    assert_abs_diff_eq!(z[2], 1.0 / s, epsilon = 1e-6);
    assert_eq!(&z[3..], &[0.0, 0.0, 0.0]);

    let (mean, stdev) = normalization::mean_stdev(&a).unwrap();
    assert_eq!(mean.to_vec::<f32>().unwrap(), vec![2.0, 4.0]);
    assert_abs_diff_eq!(stdev.to_vec::<f32>().unwrap()[0], s, epsilon = 1e-6);
}
