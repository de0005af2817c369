use engine_dtype::Dtype;

use crate::{Backend, BackendSet, CallConvention, EngineResult, HandleId, OpCode, RawHandle};

/// The native compute engine, seen from the host.
///
/// Calls are synchronous and run to completion. Implementations must be
/// reentrant for distinct identifiers; callers never pass one identifier to
/// concurrent calls.
///
/// Arrays are rank 4, column-major (first dimension fastest). The per-dtype
/// entry points of a native engine (`alloc_f32`, `read_c64`, ...) are folded
/// into dtype-tagged calls carrying wire bytes in the format of
/// [`engine_dtype::Codec`].
pub trait Engine: Send + Sync {
    /// Engine build name, for diagnostics.
    fn name(&self) -> &str;

    fn version(&self) -> String;

    fn convention(&self) -> CallConvention;

    /// Allocate an array from `wire` bytes holding `dims.iter().product()`
    /// records of `dtype`.
    fn alloc(&self, dtype: Dtype, wire: &[u8], dims: [u64; 4]) -> EngineResult<RawHandle>;

    /// Read back the array's elements as wire bytes.
    fn read(&self, handle: HandleId) -> EngineResult<Vec<u8>>;

    fn shape(&self, handle: HandleId) -> EngineResult<[u64; 4]>;

    /// Dtype ordinal as the engine reports it; decode with
    /// [`Dtype::from_ordinal`].
    fn dtype_ordinal(&self, handle: HandleId) -> EngineResult<i32>;

    /// Free the array. The identifier is dead afterwards.
    fn release(&self, handle: RawHandle) -> EngineResult<()>;

    /// Deep copy: new storage, new identifier, same data and metadata.
    fn copy(&self, handle: HandleId) -> EngineResult<RawHandle>;

    /// Run `op` on `operands`, returning identifiers in the order the
    /// engine's [`CallConvention`] defines.
    fn call(&self, op: &OpCode, operands: &[HandleId]) -> EngineResult<Vec<RawHandle>>;

    fn available_backends(&self) -> BackendSet;

    fn backend(&self) -> Backend;

    fn set_backend(&self, backend: Backend) -> EngineResult<()>;

    /// Devices of the active backend.
    fn device_count(&self) -> EngineResult<i32>;

    fn device_id(&self) -> EngineResult<i32>;

    fn set_device(&self, device: i32) -> EngineResult<()>;

    /// Free-form description of the active backend and device.
    fn info(&self) -> String;
}
