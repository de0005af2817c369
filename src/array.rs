//! The owning wrapper around one engine-side array.

use std::cell::RefCell;
use std::fmt;
use std::mem;

use engine_dtype::{Codec, Dtype, Element, HostBuffer};
use engine_sys::{Engine, HandleId, RawHandle};

use crate::{ArrayError, EngineContext, ProtocolError, Result, Shape4};

#[derive(Debug)]
enum Slot {
    Live(RawHandle),
    /// Terminal; keeps the last identifier for error reports.
    Released(HandleId),
}

/// Owner of one engine-side array.
///
/// Exactly one `Array` owns a given identifier. Dtype and shape are cached
/// at construction. After [`release`](Self::release) every accessor fails
/// with [`ArrayError::UseAfterRelease`].
///
/// Under a rebinding engine, operations re-point the operands they are given
/// at the identifiers the engine returns. The slot is therefore interior
/// state, which makes `Array` `Send` but not `Sync`: one array must not be
/// used from two threads at once.
pub struct Array {
    ctx: EngineContext,
    slot: RefCell<Slot>,
    dtype: Dtype,
    shape: Shape4,
}

impl Array {
    /// Upload `buffer` with shape `dims`.
    ///
    /// Validation happens before the engine is called: `dims` must
    /// normalize and its element count must equal `buffer.len()`.
    pub fn from_host(ctx: &EngineContext, buffer: HostBuffer, dims: &[u64]) -> Result<Self> {
        let shape = Shape4::normalize(dims)?;
        shape.validate_len(buffer.len())?;
        let dtype = buffer.dtype();
        let wire = Codec::for_dtype(dtype).encode(&buffer)?;

        // Counted before the gate drops, so no backend change sees it uncounted.
        let _admit = ctx.admit();
        let raw = ctx.engine().alloc(dtype, &wire, shape.dims())?;
        if raw.is_null() {
            let _ = raw.into_raw();
            return Err(ProtocolError::NullHandle.into());
        }
        tracing::debug!(id = %raw, %dtype, %shape, "alloc");
        Ok(Self::adopt(ctx, raw, dtype, shape))
    }

    pub fn from_slice<T: Element>(ctx: &EngineContext, data: &[T], dims: &[u64]) -> Result<Self> {
        Self::from_host(ctx, T::into_buffer(data.to_vec()), dims)
    }

    pub fn from_vec<T: Element>(ctx: &EngineContext, data: Vec<T>, dims: &[u64]) -> Result<Self> {
        Self::from_host(ctx, T::into_buffer(data), dims)
    }

    pub fn builder() -> ArrayBuilder {
        ArrayBuilder::default()
    }

    /// Take ownership of an identifier issued by a prior engine call.
    ///
    /// No engine call is made; `dtype` and `shape` are trusted. Since
    /// `RawHandle` is move-only, one identifier cannot be wrapped twice.
    pub fn wrap(ctx: &EngineContext, raw: RawHandle, dtype: Dtype, shape: Shape4) -> Result<Self> {
        if raw.is_null() {
            let _ = raw.into_raw();
            return Err(ProtocolError::NullHandle.into());
        }
        Ok(Self::adopt(ctx, raw, dtype, shape))
    }

    /// Wrap a result identifier, asking the engine for its dtype and shape.
    ///
    /// The identifier is released if the engine's answers are malformed.
    pub(crate) fn from_engine(ctx: &EngineContext, raw: RawHandle) -> Result<Self> {
        if raw.is_null() {
            let _ = raw.into_raw();
            return Err(ProtocolError::NullHandle.into());
        }
        match query_meta(ctx.engine(), raw.id()) {
            Ok((dtype, shape)) => Ok(Self::adopt(ctx, raw, dtype, shape)),
            Err(err) => {
                if let Err(release) = ctx.engine().release(raw) {
                    tracing::warn!(%release, "releasing malformed result failed");
                }
                Err(err)
            }
        }
    }

    fn adopt(ctx: &EngineContext, raw: RawHandle, dtype: Dtype, shape: Shape4) -> Self {
        ctx.register();
        Self {
            ctx: ctx.clone(),
            slot: RefCell::new(Slot::Live(raw)),
            dtype,
            shape,
        }
    }

    #[inline]
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Identifier currently owned.
    pub fn raw_id(&self) -> Result<HandleId> {
        match &*self.slot.borrow() {
            Slot::Live(raw) => Ok(raw.id()),
            Slot::Released(id) => Err(ArrayError::UseAfterRelease { id: *id }),
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(&*self.slot.borrow(), Slot::Released(_))
    }

    /// Cached dtype.
    pub fn dtype(&self) -> Result<Dtype> {
        self.raw_id()?;
        Ok(self.dtype)
    }

    /// Cached shape.
    pub fn shape(&self) -> Result<Shape4> {
        self.raw_id()?;
        Ok(self.shape)
    }

    pub fn elements(&self) -> Result<u64> {
        Ok(self.shape()?.elements())
    }

    /// Dtype as the engine reports it now.
    pub fn engine_dtype(&self) -> Result<Dtype> {
        let id = self.raw_id()?;
        Ok(Dtype::from_ordinal(self.ctx.engine().dtype_ordinal(id)?)?)
    }

    /// Shape as the engine reports it now.
    pub fn engine_shape(&self) -> Result<Shape4> {
        let id = self.raw_id()?;
        Ok(Shape4::from_engine(self.ctx.engine().shape(id)?)?)
    }

    /// Read the elements back into a fresh host buffer, column-major.
    pub fn data(&self) -> Result<HostBuffer> {
        let id = self.raw_id()?;
        let wire = self.ctx.engine().read(id)?;
        let buffer = Codec::for_dtype(self.dtype).decode(&wire)?;
        let expected = self.shape.elements();
        if buffer.len() as u64 != expected {
            return Err(ProtocolError::ElementCount {
                shape: self.shape,
                expected,
                found: buffer.len(),
            }
            .into());
        }
        Ok(buffer)
    }

    /// Like [`data`](Self::data), typed. `T` must match the array's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype()? {
            return Err(ArrayError::DtypeMismatch {
                expected: T::DTYPE,
                found: self.dtype,
            });
        }
        self.data()?.into_vec().map_err(|buffer| ArrayError::DtypeMismatch {
            expected: T::DTYPE,
            found: buffer.dtype(),
        })
    }

    /// Deep copy into new engine storage.
    pub fn copy(&self) -> Result<Array> {
        let id = self.raw_id()?;
        let _admit = self.ctx.admit();
        let raw = self.ctx.engine().copy(id)?;
        tracing::debug!(from = %id, to = %raw, "copy");
        Self::wrap(&self.ctx, raw, self.dtype, self.shape)
    }

    /// Free the engine storage.
    ///
    /// The array is terminal afterwards even if the engine reports an
    /// error. A second call fails with [`ArrayError::UseAfterRelease`].
    pub fn release(&mut self) -> Result<()> {
        let raw = self.detach()?;
        tracing::debug!(id = %raw, "release");
        // Storage goes first; the live count drops only once it is gone.
        let released = self.ctx.engine().release(raw);
        self.ctx.unregister();
        Ok(released?)
    }

    /// Give up ownership without releasing.
    pub fn into_raw(self) -> Result<RawHandle> {
        let raw = self.detach()?;
        self.ctx.unregister();
        Ok(raw)
    }

    /// Mark the array released and hand back its handle. Leaves the live
    /// count to the caller.
    fn detach(&self) -> Result<RawHandle> {
        let id = self.raw_id()?;
        match mem::replace(&mut *self.slot.borrow_mut(), Slot::Released(id)) {
            Slot::Live(raw) => Ok(raw),
            Slot::Released(id) => Err(ArrayError::UseAfterRelease { id }),
        }
    }

    /// Give up an operand whose identifier was lost in a malformed call.
    ///
    /// `released` lists identifiers already freed by the caller. Any other
    /// identifier still held is released here; under a rebinding engine it
    /// is usually dead already.
    pub(crate) fn abandon(&self, released: &[HandleId]) {
        let Ok(raw) = self.detach() else {
            return;
        };
        let id = raw.id();
        if released.contains(&id) {
            let _ = raw.into_raw();
        } else if let Err(err) = self.ctx.engine().release(raw) {
            tracing::debug!(%id, %err, "abandoned operand already gone");
        }
        tracing::warn!(%id, "operand abandoned after malformed call");
        self.ctx.unregister();
    }

    /// Re-point at the identifier the engine returned for this operand.
    ///
    /// The previous identifier is dead unless it is returned unchanged.
    pub(crate) fn rebind(&self, raw: RawHandle) {
        let mut slot = self.slot.borrow_mut();
        match &mut *slot {
            Slot::Live(current) if current.id() == raw.id() => {
                let _ = raw.into_raw();
            }
            Slot::Live(current) => {
                tracing::trace!(from = %current, to = %raw, "rebind");
                let _ = mem::replace(current, raw).into_raw();
            }
            Slot::Released(_) => {
                let _ = raw.into_raw();
            }
        }
    }
}

fn query_meta(engine: &dyn Engine, id: HandleId) -> Result<(Dtype, Shape4)> {
    let dtype = Dtype::from_ordinal(engine.dtype_ordinal(id)?)?;
    let shape = Shape4::from_engine(engine.shape(id)?)?;
    Ok((dtype, shape))
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Slot::Live(raw) = mem::replace(self.slot.get_mut(), Slot::Released(HandleId(0))) {
            let id = raw.id();
            if let Err(err) = self.ctx.engine().release(raw) {
                tracing::warn!(%id, %err, "release on drop failed");
            }
            self.ctx.unregister();
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Array");
        match &*self.slot.borrow() {
            Slot::Live(raw) => s.field("id", &raw.id()),
            Slot::Released(id) => s.field("released", id),
        };
        s.field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Piecewise construction of an uploaded [`Array`].
///
/// Missing data fails with [`ArrayError::NullInput`], missing dimensions
/// with [`ArrayError::InvalidShape`].
#[derive(Debug, Default)]
pub struct ArrayBuilder {
    data: Option<HostBuffer>,
    dims: Option<Vec<u64>>,
}

impl ArrayBuilder {
    pub fn data(mut self, data: impl Into<HostBuffer>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn dims(mut self, dims: &[u64]) -> Self {
        self.dims = Some(dims.to_vec());
        self
    }

    pub fn build(self, ctx: &EngineContext) -> Result<Array> {
        let data = self.data.ok_or(ArrayError::NullInput)?;
        let dims = self.dims.ok_or(ArrayError::InvalidShape {
            dims: Vec::new(),
            reason: "dimensions absent",
        })?;
        Array::from_host(ctx, data, &dims)
    }
}
