use engine_array::{call, normalization, Array, ArrayError, CallConvention, EngineContext, OpCode};
use engine_sys::HostEngine;

fn rebinding_ctx() -> EngineContext {
    let ctx = EngineContext::new(HostEngine::rebinding()).unwrap();
    assert_eq!(ctx.convention(), CallConvention::Rebinding);
    ctx
}

#[test]
fn test_binary_op_rebinds_both_operands() {
    let ctx = rebinding_ctx();
    let x = Array::from_slice(&ctx, &[1.0f64, 2.0], &[2]).unwrap();
    let y = Array::from_slice(&ctx, &[10.0f64, 20.0], &[2]).unwrap();
    let (x_old, y_old) = (x.raw_id().unwrap(), y.raw_id().unwrap());

    let z = x.add(&y).unwrap();

    let (x_new, y_new) = (x.raw_id().unwrap(), y.raw_id().unwrap());
    assert_ne!(x_new, x_old);
    assert_ne!(y_new, y_old);
    assert_ne!(z.raw_id().unwrap(), x_new);

    // Operands still read their own data through the new identifiers.
    assert_eq!(x.to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
    assert_eq!(y.to_vec::<f64>().unwrap(), vec![10.0, 20.0]);
    assert_eq!(z.to_vec::<f64>().unwrap(), vec![11.0, 22.0]);

    // The engine forgot the old identifiers.
    assert!(ctx.engine().read(x_old).is_err());
    assert!(ctx.engine().shape(y_old).is_err());
    assert_eq!(ctx.live_handles(), 3);
}

#[test]
fn test_same_operand_twice() {
    let ctx = rebinding_ctx();
    let x = Array::from_slice(&ctx, &[3i32, 4], &[2]).unwrap();
    let old = x.raw_id().unwrap();
    let sq = x.mul(&x).unwrap();
    assert_ne!(x.raw_id().unwrap(), old);
    assert_eq!(sq.to_vec::<i32>().unwrap(), vec![9, 16]);
    assert_eq!(x.to_vec::<i32>().unwrap(), vec![3, 4]);
}

#[test]
fn test_unary_chain() {
    let ctx = rebinding_ctx();
    let a = Array::from_slice(&ctx, &[1u8, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
    let t = a.transpose(false).unwrap().transpose(false).unwrap();
    assert_eq!(t.to_vec::<u8>().unwrap(), a.to_vec::<u8>().unwrap());
    let r = a.rows(1, 1).unwrap();
    assert_eq!(r.to_vec::<u8>().unwrap(), vec![2, 4, 6]);
}

#[test]
fn test_engine_error_leaves_operands_bound() {
    let ctx = rebinding_ctx();
    let x = Array::from_slice(&ctx, &[1.0f32, 2.0], &[2]).unwrap();
    let y = Array::from_slice(&ctx, &[1.0f32], &[1]).unwrap();
    let (x_id, y_id) = (x.raw_id().unwrap(), y.raw_id().unwrap());

    assert!(matches!(x.sub(&y), Err(ArrayError::Engine(_))));

    assert_eq!(x.raw_id().unwrap(), x_id);
    assert_eq!(y.raw_id().unwrap(), y_id);
    assert_eq!(x.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
    assert_eq!(ctx.live_handles(), 2);
}

#[test]
fn test_in_place_under_rebinding() {
    let ctx = rebinding_ctx();
    let mut a = Array::from_slice(&ctx, &[1.0f64, 3.0], &[2]).unwrap();
    let old = a.raw_id().unwrap();
    normalization::znorm_in_place(&mut a, normalization::DEFAULT_EPSILON).unwrap();
    assert_ne!(a.raw_id().unwrap(), old);
    assert_eq!(a.to_vec::<f64>().unwrap(), vec![-1.0, 1.0]);
    assert_eq!(ctx.live_handles(), 1);
}

#[test]
fn test_multi_result_under_rebinding() {
    let ctx = rebinding_ctx();
    let a = Array::from_slice(&ctx, &[1.0f64, 3.0, 5.0, 5.0], &[2, 2]).unwrap();
    let results = call(OpCode::MeanStdev, &[&a]).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].to_vec::<f64>().unwrap(), vec![2.0, 5.0]);
    assert_eq!(results[1].to_vec::<f64>().unwrap(), vec![1.0, 0.0]);
    assert_eq!(a.to_vec::<f64>().unwrap(), vec![1.0, 3.0, 5.0, 5.0]);
}

#[test]
fn test_released_operand_is_not_sent() {
    let ctx = rebinding_ctx();
    let mut a = Array::from_slice(&ctx, &[1u16], &[1]).unwrap();
    a.release().unwrap();
    assert!(matches!(
        call(OpCode::Not, &[&a]),
        Err(ArrayError::UseAfterRelease { .. })
    ));
    assert!(matches!(call(OpCode::Not, &[]), Err(ArrayError::NullInput)));
}
