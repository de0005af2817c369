use engine_array::{normalization, Array, ArrayError, Backend, BackendSet, EngineContext};
use engine_sys::HostEngine;

fn opencl_ctx() -> EngineContext {
    let engine = HostEngine::new()
        .with_backends(BackendSet::default().with(Backend::OpenCl))
        .with_devices(2);
    EngineContext::new(engine).unwrap()
}

#[test]
fn test_release_then_use_fails() {
    let ctx = opencl_ctx();
    let mut a = Array::from_slice(&ctx, &[1.0f32, 2.0], &[2]).unwrap();
    let b = Array::from_slice(&ctx, &[1.0f32, 2.0], &[2]).unwrap();
    a.release().unwrap();

    assert!(matches!(a.data(), Err(ArrayError::UseAfterRelease { .. })));
    assert!(matches!(a.shape(), Err(ArrayError::UseAfterRelease { .. })));
    assert!(matches!(a.dtype(), Err(ArrayError::UseAfterRelease { .. })));
    assert!(matches!(a.copy(), Err(ArrayError::UseAfterRelease { .. })));
    assert!(matches!(a.add(&b), Err(ArrayError::UseAfterRelease { .. })));
    assert!(matches!(b.add(&a), Err(ArrayError::UseAfterRelease { .. })));
    assert!(matches!(a.release(), Err(ArrayError::UseAfterRelease { .. })));
}

#[test]
fn test_drop_releases() {
    let ctx = opencl_ctx();
    {
        let _a = Array::from_slice(&ctx, &[1u8, 2, 3], &[3]).unwrap();
        let _b = Array::from_slice(&ctx, &[4u8], &[1]).unwrap();
        assert_eq!(ctx.live_handles(), 2);
    }
    assert_eq!(ctx.live_handles(), 0);
}

#[test]
fn test_copy_is_independent() {
    let ctx = opencl_ctx();
    let before = vec![1.0f64, 2.0, 3.0, 5.0];
    let mut a = Array::from_slice(&ctx, &before, &[4]).unwrap();
    let b = a.copy().unwrap();
    assert_ne!(a.raw_id().unwrap(), b.raw_id().unwrap());

    normalization::znorm_in_place(&mut a, normalization::DEFAULT_EPSILON).unwrap();
    assert_ne!(a.to_vec::<f64>().unwrap(), before);
    assert_eq!(b.to_vec::<f64>().unwrap(), before);

    a.release().unwrap();
    assert_eq!(b.to_vec::<f64>().unwrap(), before);
}

#[test]
fn test_backend_change_requires_no_live_arrays() {
    let ctx = opencl_ctx();
    assert_eq!(ctx.backend(), Backend::Cpu);
    assert!(ctx.available_backends().contains(Backend::OpenCl));

    let mut a = Array::from_slice(&ctx, &[1i32], &[1]).unwrap();
    assert!(matches!(
        ctx.set_backend(Backend::OpenCl),
        Err(ArrayError::LiveHandles { count: 1 })
    ));
    assert!(matches!(
        ctx.set_device(1),
        Err(ArrayError::LiveHandles { count: 1 })
    ));
    assert_eq!(ctx.backend(), Backend::Cpu);

    a.release().unwrap();
    ctx.set_backend(Backend::OpenCl).unwrap();
    ctx.set_device(1).unwrap();
    assert_eq!(ctx.backend(), Backend::OpenCl);
    assert_eq!(ctx.device_id().unwrap(), 1);
    assert!(matches!(ctx.set_backend(Backend::Cuda), Err(ArrayError::Engine(_))));
}

#[test]
fn test_into_raw_leaves_context() {
    let ctx = opencl_ctx();
    let a = Array::from_slice(&ctx, &[1i64, 2], &[2]).unwrap();
    let shape = a.shape().unwrap();
    let raw = a.into_raw().unwrap();
    assert_eq!(ctx.live_handles(), 0);

    let b = Array::wrap(&ctx, raw, engine_array::Dtype::S64, shape).unwrap();
    assert_eq!(b.to_vec::<i64>().unwrap(), vec![1, 2]);
}

#[test]
fn test_arrays_move_between_threads() {
    let ctx = opencl_ctx();
    let a = Array::from_slice(&ctx, &[1.0f32, 2.0, 3.0], &[3]).unwrap();
    let b = Array::from_slice(&ctx, &[4.0f32, 5.0, 6.0], &[3]).unwrap();

    let handles: Vec<_> = [a, b]
        .into_iter()
        .map(|arr| std::thread::spawn(move || arr.add(&arr).unwrap().to_vec::<f32>().unwrap()))
        .collect();
    let sums: Vec<Vec<f32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(sums, vec![vec![2.0, 4.0, 6.0], vec![8.0, 10.0, 12.0]]);
    assert_eq!(ctx.live_handles(), 0);
}

#[test]
fn test_mixed_contexts_rejected() {
    let one = opencl_ctx();
    let two = opencl_ctx();
    let a = Array::from_slice(&one, &[1u8], &[1]).unwrap();
    let b = Array::from_slice(&two, &[1u8], &[1]).unwrap();
    assert!(matches!(a.add(&b), Err(ArrayError::ContextMismatch)));
}
