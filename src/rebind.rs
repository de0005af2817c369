//! The one place engine calls are issued and operand rebinds applied.

use engine_sys::{CallConvention, HandleId, OpCode, RawHandle};

use crate::{Array, ArrayError, EngineContext, ProtocolError, Result};

/// Identifiers returned by one engine call.
///
/// Under [`CallConvention::Rebinding`] the engine returns one identifier per
/// operand before the results. Results are reachable only through
/// [`rebind`](Self::rebind), which re-points the operands first.
#[must_use = "operand identifiers must be rebound before results are used"]
#[derive(Debug)]
pub struct CallOutcome {
    operands: Vec<RawHandle>,
    results: Vec<RawHandle>,
}

impl CallOutcome {
    /// Split `ids` as `convention` orders them for `op`.
    ///
    /// Fails if the engine returned the wrong number of identifiers or a
    /// null one; the identifiers come back with the error.
    pub fn split(
        convention: CallConvention,
        op: &OpCode,
        mut ids: Vec<RawHandle>,
    ) -> std::result::Result<Self, Stranded> {
        let expected = convention.expected_identifiers(op);
        if ids.len() != expected {
            return Err(Stranded {
                error: ProtocolError::IdentifierCount {
                    op: op.name(),
                    expected,
                    found: ids.len(),
                },
                handles: ids,
            });
        }
        if ids.iter().any(RawHandle::is_null) {
            return Err(Stranded {
                error: ProtocolError::NullHandle,
                handles: ids,
            });
        }
        let results = match convention {
            CallConvention::Rebinding => ids.split_off(op.operand_count()),
            CallConvention::NonMutating => std::mem::take(&mut ids),
        };
        Ok(Self {
            operands: ids,
            results,
        })
    }

    /// Re-point each operand at its returned identifier, even when it is
    /// unchanged, then hand out the results.
    pub fn rebind(self, operands: &[&Array]) -> Vec<RawHandle> {
        debug_assert!(self.operands.is_empty() || self.operands.len() == operands.len());
        for (array, raw) in operands.iter().zip(self.operands) {
            array.rebind(raw);
        }
        self.results
    }
}

/// Identifiers of a call that could not be split.
#[derive(Debug)]
pub struct Stranded {
    pub error: ProtocolError,
    pub handles: Vec<RawHandle>,
}

impl Stranded {
    /// Release every stranded identifier and report the protocol error.
    ///
    /// Under [`CallConvention::Rebinding`] there is no telling which
    /// identifier belongs to which operand, so the operands are abandoned
    /// too and later use fails with [`ArrayError::UseAfterRelease`].
    fn settle(self, ctx: &EngineContext, operands: &[&Array]) -> ArrayError {
        let mut released = Vec::with_capacity(self.handles.len());
        for raw in self.handles {
            let id = raw.id();
            if raw.is_null() || released.contains(&id) {
                let _ = raw.into_raw();
                continue;
            }
            if let Err(err) = ctx.engine().release(raw) {
                tracing::warn!(%id, %err, "releasing stranded identifier failed");
            }
            released.push(id);
        }
        if ctx.convention() == CallConvention::Rebinding {
            for array in operands {
                array.abandon(&released);
            }
        }
        self.error.into()
    }
}

/// Run `op` on `operands` and wrap its results.
///
/// Engine failures propagate before any rebind is attempted. Operands must
/// be live and belong to one context.
pub fn call(op: OpCode, operands: &[&Array]) -> Result<Vec<Array>> {
    let Some(first) = operands.first() else {
        return Err(ArrayError::NullInput);
    };
    let ctx = first.context();
    if operands.iter().any(|a| !a.context().same(ctx)) {
        return Err(ArrayError::ContextMismatch);
    }
    let ids = operands
        .iter()
        .map(|a| a.raw_id())
        .collect::<Result<Vec<HandleId>>>()?;

    let _admit = ctx.admit();
    tracing::debug!(op = op.name(), operands = ?ids, "call");
    let raw = ctx.engine().call(&op, &ids)?;
    let results = match CallOutcome::split(ctx.convention(), &op, raw) {
        Ok(outcome) => outcome.rebind(operands),
        Err(stranded) => return Err(stranded.settle(ctx, operands)),
    };

    // Wrap every result before reporting the first failure.
    results
        .into_iter()
        .map(|raw| Array::from_engine(ctx, raw))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}
