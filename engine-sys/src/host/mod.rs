//! In-process engine over host memory.
//!
//! `HostEngine` keeps every array in a table keyed by identifier. It speaks
//! either call convention; in [`CallConvention::Rebinding`] mode each call
//! moves its operands to fresh identifiers, so a caller that keeps using the
//! old identifiers fails loudly instead of reading stale storage.

mod kernels;
mod scalar;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use engine_dtype::{Codec, Dtype, HostBuffer};
use parking_lot::Mutex;

use crate::{
    Backend, BackendSet, CallConvention, Engine, EngineError, EngineResult, HandleId, OpCode,
    RawHandle,
};

/// Engine status codes, reported through [`EngineError::code`].
pub mod status {
    pub const UNKNOWN_ARRAY: i32 = 1;
    pub const BAD_ARGUMENT: i32 = 2;
    pub const UNSUPPORTED_BACKEND: i32 = 3;
    pub const BAD_DEVICE: i32 = 4;
}

/// One array held by the host engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HostTensor {
    pub(crate) dims: [u64; 4],
    pub(crate) data: HostBuffer,
}

#[derive(Debug)]
struct HostState {
    tensors: HashMap<u64, HostTensor>,
    backend: Backend,
    device: i32,
}

/// Reference engine running every operation on the calling thread.
#[derive(Debug)]
pub struct HostEngine {
    convention: CallConvention,
    backends: BackendSet,
    devices: i32,
    state: Mutex<HostState>,
    next_id: AtomicU64,
}

impl Default for HostEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEngine {
    /// Non-mutating engine with a single CPU device.
    pub fn new() -> Self {
        Self::with_convention(CallConvention::NonMutating)
    }

    /// Engine speaking the legacy rebinding convention.
    pub fn rebinding() -> Self {
        Self::with_convention(CallConvention::Rebinding)
    }

    pub fn with_convention(convention: CallConvention) -> Self {
        Self {
            convention,
            backends: BackendSet::default().with(Backend::Cpu),
            devices: 1,
            state: Mutex::new(HostState {
                tensors: HashMap::new(),
                backend: Backend::Cpu,
                device: 0,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Advertise additional backends. All of them run on the host.
    pub fn with_backends(mut self, backends: BackendSet) -> Self {
        self.backends = backends.with(Backend::Cpu);
        self
    }

    /// Number of devices reported for every backend.
    pub fn with_devices(mut self, devices: i32) -> Self {
        self.devices = devices.max(1);
        self
    }

    /// Arrays currently held.
    pub fn live_count(&self) -> usize {
        self.state.lock().tensors.len()
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.state.lock().tensors.contains_key(&id.0)
    }

    fn mint(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn owned(&self, id: u64) -> RawHandle {
        // SAFETY: `id` was just minted or just moved; the table holds the
        // only entry and no other RawHandle names it.
        unsafe { RawHandle::from_raw(id) }
    }
}

fn unknown(id: HandleId) -> EngineError {
    EngineError::with_code(status::UNKNOWN_ARRAY, format!("unknown array {id}"))
}

impl HostState {
    fn get(&self, id: HandleId) -> EngineResult<&HostTensor> {
        self.tensors.get(&id.0).ok_or_else(|| unknown(id))
    }
}

impl Engine for HostEngine {
    fn name(&self) -> &str {
        "host"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn convention(&self) -> CallConvention {
        self.convention
    }

    fn alloc(&self, dtype: Dtype, wire: &[u8], dims: [u64; 4]) -> EngineResult<RawHandle> {
        let expected = dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .and_then(|count| usize::try_from(count).ok())
            .and_then(|count| count.checked_mul(dtype.element_size()));
        let Some(expected) = expected else {
            return Err(EngineError::with_code(
                status::BAD_ARGUMENT,
                format!("{dims:?} {dtype} elements overflow the address space"),
            ));
        };
        if wire.len() != expected {
            return Err(EngineError::with_code(
                status::BAD_ARGUMENT,
                format!(
                    "{} bytes supplied for {dims:?} {dtype} elements ({expected} bytes)",
                    wire.len()
                ),
            ));
        }
        let data = Codec::for_dtype(dtype)
            .decode(wire)
            .map_err(|e| EngineError::with_code(status::BAD_ARGUMENT, e.to_string()))?;
        let id = self.mint();
        self.state.lock().tensors.insert(id, HostTensor { dims, data });
        tracing::trace!(id, %dtype, ?dims, "host alloc");
        Ok(self.owned(id))
    }

    fn read(&self, handle: HandleId) -> EngineResult<Vec<u8>> {
        let state = self.state.lock();
        let tensor = state.get(handle)?;
        Codec::for_dtype(tensor.data.dtype())
            .encode(&tensor.data)
            .map_err(|e| EngineError::new(e.to_string()))
    }

    fn shape(&self, handle: HandleId) -> EngineResult<[u64; 4]> {
        Ok(self.state.lock().get(handle)?.dims)
    }

    fn dtype_ordinal(&self, handle: HandleId) -> EngineResult<i32> {
        Ok(self.state.lock().get(handle)?.data.dtype().ordinal())
    }

    fn release(&self, handle: RawHandle) -> EngineResult<()> {
        let id = handle.id();
        match self.state.lock().tensors.remove(&handle.into_raw()) {
            Some(_) => {
                tracing::trace!(id = id.0, "host release");
                Ok(())
            }
            None => Err(unknown(id)),
        }
    }

    fn copy(&self, handle: HandleId) -> EngineResult<RawHandle> {
        let mut state = self.state.lock();
        let tensor = state.get(handle)?.clone();
        let id = self.mint();
        state.tensors.insert(id, tensor);
        Ok(self.owned(id))
    }

    fn call(&self, op: &OpCode, operands: &[HandleId]) -> EngineResult<Vec<RawHandle>> {
        if operands.len() != op.operand_count() {
            return Err(EngineError::with_code(
                status::BAD_ARGUMENT,
                format!(
                    "{} takes {} operands, got {}",
                    op.name(),
                    op.operand_count(),
                    operands.len()
                ),
            ));
        }

        let mut state = self.state.lock();
        let mut outputs = {
            let inputs = operands
                .iter()
                .map(|&id| state.get(id))
                .collect::<EngineResult<Vec<_>>>()?;
            kernels::execute(op, &inputs)?
        };

        if op.writes_operand() {
            let written = outputs.remove(0);
            state.tensors.insert(operands[0].0, written);
        }

        let mut ids = Vec::with_capacity(self.convention.expected_identifiers(op));
        if self.convention == CallConvention::Rebinding {
            let mut moved: Vec<(u64, u64)> = Vec::with_capacity(operands.len());
            for &HandleId(old) in operands {
                let new = match moved.iter().find(|(from, _)| *from == old) {
                    Some(&(_, to)) => to,
                    None => {
                        let to = self.mint();
                        if let Some(tensor) = state.tensors.remove(&old) {
                            state.tensors.insert(to, tensor);
                        }
                        moved.push((old, to));
                        tracing::trace!(from = old, to, "host relocate");
                        to
                    }
                };
                ids.push(new);
            }
        }
        for tensor in outputs {
            let id = self.mint();
            state.tensors.insert(id, tensor);
            ids.push(id);
        }
        Ok(ids.into_iter().map(|id| self.owned(id)).collect())
    }

    fn available_backends(&self) -> BackendSet {
        self.backends
    }

    fn backend(&self) -> Backend {
        self.state.lock().backend
    }

    fn set_backend(&self, backend: Backend) -> EngineResult<()> {
        let resolved = match backend {
            Backend::Default => Backend::Cpu,
            other if self.backends.contains(other) => other,
            other => {
                return Err(EngineError::with_code(
                    status::UNSUPPORTED_BACKEND,
                    format!("backend {other} not available; have {}", self.backends),
                ))
            }
        };
        let mut state = self.state.lock();
        state.backend = resolved;
        state.device = 0;
        Ok(())
    }

    fn device_count(&self) -> EngineResult<i32> {
        Ok(self.devices)
    }

    fn device_id(&self) -> EngineResult<i32> {
        Ok(self.state.lock().device)
    }

    fn set_device(&self, device: i32) -> EngineResult<()> {
        if !(0..self.devices).contains(&device) {
            return Err(EngineError::with_code(
                status::BAD_DEVICE,
                format!("device {device} out of range 0..{}", self.devices),
            ));
        }
        self.state.lock().device = device;
        Ok(())
    }

    fn info(&self) -> String {
        let state = self.state.lock();
        format!(
            "host engine v{} ({} convention), backend {}, device {}/{}",
            self.version(),
            match self.convention {
                CallConvention::Rebinding => "rebinding",
                CallConvention::NonMutating => "non-mutating",
            },
            state.backend,
            state.device,
            self.devices
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc_f64(engine: &HostEngine, data: &[f64], dims: [u64; 4]) -> RawHandle {
        let wire = Codec::for_dtype(Dtype::F64)
            .encode(&HostBuffer::from(data.to_vec()))
            .unwrap();
        engine.alloc(Dtype::F64, &wire, dims).unwrap()
    }

    #[test]
    fn test_alloc_read_release() {
        let engine = HostEngine::new();
        let h = alloc_f64(&engine, &[1.0, 2.0], [2, 1, 1, 1]);
        assert_eq!(engine.shape(h.id()).unwrap(), [2, 1, 1, 1]);
        assert_eq!(engine.dtype_ordinal(h.id()).unwrap(), Dtype::F64.ordinal());
        assert_eq!(engine.read(h.id()).unwrap().len(), 16);
        assert_eq!(engine.live_count(), 1);
        let id = h.id();
        engine.release(h).unwrap();
        assert_eq!(engine.live_count(), 0);
        let again = unsafe { RawHandle::from_raw(id.0) };
        let err = engine.release(again).unwrap_err();
        assert_eq!(err.code(), Some(status::UNKNOWN_ARRAY));
    }

    #[test]
    fn test_alloc_rejects_short_wire() {
        let engine = HostEngine::new();
        let err = engine.alloc(Dtype::S32, &[0u8; 7], [2, 1, 1, 1]).unwrap_err();
        assert_eq!(err.code(), Some(status::BAD_ARGUMENT));
    }

    #[test]
    fn test_alloc_rejects_overflowing_dims() {
        let engine = HostEngine::new();
        let err = engine
            .alloc(Dtype::F32, &[], [1 << 63, 2, 1, 1])
            .unwrap_err();
        assert_eq!(err.code(), Some(status::BAD_ARGUMENT));
        let err = engine
            .alloc(Dtype::C64, &[], [u64::MAX, 1, 1, 1])
            .unwrap_err();
        assert_eq!(err.code(), Some(status::BAD_ARGUMENT));
        assert_eq!(engine.live_count(), 0);
    }

    #[test]
    fn test_non_mutating_returns_results_only() {
        let engine = HostEngine::new();
        let a = alloc_f64(&engine, &[1.0, 2.0], [2, 1, 1, 1]);
        let b = alloc_f64(&engine, &[3.0, 4.0], [2, 1, 1, 1]);
        let out = engine.call(&OpCode::Add, &[a.id(), b.id()]).unwrap();
        assert_eq!(out.len(), 1);
        assert!(engine.contains(a.id()));
        assert!(engine.contains(b.id()));
        for h in out.into_iter().chain([a, b]) {
            engine.release(h).unwrap();
        }
    }

    #[test]
    fn test_rebinding_relocates_operands() {
        let engine = HostEngine::rebinding();
        let a = alloc_f64(&engine, &[1.0, 2.0], [2, 1, 1, 1]);
        let old = a.id();
        let out = engine.call(&OpCode::Add, &[old, old]).unwrap();
        assert_eq!(out.len(), 3);
        // same operand twice rebinds to a single identifier
        assert_eq!(out[0].id(), out[1].id());
        assert_ne!(out[0].id(), old);
        assert!(!engine.contains(old));
        assert_eq!(engine.live_count(), 2);
        let _ = a.into_raw();
        let mut out = out.into_iter();
        let moved = out.next().unwrap();
        let _ = out.next().unwrap().into_raw();
        engine.release(moved).unwrap();
        engine.release(out.next().unwrap()).unwrap();
        assert_eq!(engine.live_count(), 0);
    }

    #[test]
    fn test_failed_call_leaves_operands() {
        let engine = HostEngine::rebinding();
        let a = alloc_f64(&engine, &[1.0, 2.0], [2, 1, 1, 1]);
        let b = alloc_f64(&engine, &[1.0], [1, 1, 1, 1]);
        assert!(engine.call(&OpCode::Add, &[a.id(), b.id()]).is_err());
        assert!(engine.contains(a.id()));
        assert!(engine.contains(b.id()));
        engine.release(a).unwrap();
        engine.release(b).unwrap();
    }

    #[test]
    fn test_in_place_write() {
        let engine = HostEngine::new();
        let a = alloc_f64(&engine, &[1.0, 3.0], [2, 1, 1, 1]);
        let out = engine
            .call(&OpCode::ZNormInPlace { epsilon: 1e-8 }, &[a.id()])
            .unwrap();
        assert!(out.is_empty());
        let wire = engine.read(a.id()).unwrap();
        let data = Codec::for_dtype(Dtype::F64).decode(&wire).unwrap();
        assert_eq!(data, HostBuffer::F64(vec![-1.0, 1.0]));
        engine.release(a).unwrap();
    }

    #[test]
    fn test_backend_and_device_selection() {
        let engine = HostEngine::new()
            .with_backends(BackendSet::default().with(Backend::OpenCl))
            .with_devices(2);
        assert!(engine.set_backend(Backend::Cuda).is_err());
        engine.set_backend(Backend::OpenCl).unwrap();
        assert_eq!(engine.backend(), Backend::OpenCl);
        engine.set_device(1).unwrap();
        assert_eq!(engine.device_id().unwrap(), 1);
        assert_eq!(
            engine.set_device(2).unwrap_err().code(),
            Some(status::BAD_DEVICE)
        );
        engine.set_backend(Backend::Default).unwrap();
        assert_eq!(engine.backend(), Backend::Cpu);
        assert_eq!(engine.device_id().unwrap(), 0);
        assert!(engine.info().contains("backend cpu"));
    }
}
