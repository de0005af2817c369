//! Engine context and configuration.
//!
//! Backend and device selection is process-wide engine state. An
//! [`EngineContext`] owns it explicitly and counts the arrays created through
//! it; configuration changes are refused while any of them is live.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use engine_sys::{Backend, BackendSet, CallConvention, Engine};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::{ArrayError, Result};

/// Backend and device to select when a context is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub backend: Option<Backend>,
    pub device: Option<i32>,
}

impl EngineConfig {
    pub const BACKEND_VAR: &'static str = "ENGINE_ARRAY_BACKEND";
    pub const DEVICE_VAR: &'static str = "ENGINE_ARRAY_DEVICE";

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn device(mut self, device: i32) -> Self {
        self.device = Some(device);
        self
    }

    /// Read `ENGINE_ARRAY_BACKEND` and `ENGINE_ARRAY_DEVICE`.
    ///
    /// Unset or empty variables leave the engine's choice in place.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = var(Self::BACKEND_VAR)
            .map(|v| {
                v.parse::<Backend>()
                    .map_err(|e| ArrayError::Config(format!("{}: {e}", Self::BACKEND_VAR)))
            })
            .transpose()?;
        let device = var(Self::DEVICE_VAR)
            .map(|v| {
                v.trim().parse::<i32>().map_err(|e| {
                    ArrayError::Config(format!("{}={v:?}: {e}", Self::DEVICE_VAR))
                })
            })
            .transpose()?;

        Ok(Self { backend, device })
    }
}

struct Inner {
    engine: Box<dyn Engine>,
    live: AtomicUsize,
    // Array creation holds it shared, configuration changes exclusive.
    gate: RwLock<()>,
}

/// Shared handle to an engine and its configuration.
///
/// Cloning is cheap; clones refer to the same engine and the same live-array
/// count.
#[derive(Clone)]
pub struct EngineContext {
    inner: Arc<Inner>,
}

impl EngineContext {
    /// Context with the engine's default backend and device.
    pub fn new(engine: impl Engine + 'static) -> Result<Self> {
        Self::with_config(engine, EngineConfig::default())
    }

    /// Context configured from the environment, see [`EngineConfig::from_env`].
    pub fn from_env(engine: impl Engine + 'static) -> Result<Self> {
        Self::with_config(engine, EngineConfig::from_env()?)
    }

    pub fn with_config(engine: impl Engine + 'static, config: EngineConfig) -> Result<Self> {
        engine_dtype::verify_registry()?;

        if let Some(backend) = config.backend {
            engine.set_backend(backend)?;
        }
        if let Some(device) = config.device {
            engine.set_device(device)?;
        }
        tracing::debug!(
            engine = engine.name(),
            version = %engine.version(),
            convention = ?engine.convention(),
            backend = %engine.backend(),
            "engine context ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                engine: Box::new(engine),
                live: AtomicUsize::new(0),
                gate: RwLock::new(()),
            }),
        })
    }

    #[inline]
    pub fn engine(&self) -> &dyn Engine {
        &*self.inner.engine
    }

    pub fn convention(&self) -> CallConvention {
        self.engine().convention()
    }

    pub fn backend(&self) -> Backend {
        self.engine().backend()
    }

    pub fn available_backends(&self) -> BackendSet {
        self.engine().available_backends()
    }

    pub fn device_count(&self) -> Result<i32> {
        Ok(self.engine().device_count()?)
    }

    pub fn device_id(&self) -> Result<i32> {
        Ok(self.engine().device_id()?)
    }

    pub fn info(&self) -> String {
        self.engine().info()
    }

    pub fn version(&self) -> String {
        self.engine().version()
    }

    /// Arrays created in this context and not yet released.
    pub fn live_handles(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Switch backend. Fails with [`ArrayError::LiveHandles`] while arrays
    /// are live; live arrays are never migrated.
    pub fn set_backend(&self, backend: Backend) -> Result<()> {
        let _gate = self.inner.gate.write();
        self.ensure_idle()?;
        self.engine().set_backend(backend)?;
        tracing::debug!(%backend, "backend selected");
        Ok(())
    }

    /// Switch device on the active backend. Same precondition as
    /// [`set_backend`](Self::set_backend).
    pub fn set_device(&self, device: i32) -> Result<()> {
        let _gate = self.inner.gate.write();
        self.ensure_idle()?;
        self.engine().set_device(device)?;
        tracing::debug!(device, "device selected");
        Ok(())
    }

    pub fn same(&self, other: &EngineContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.live_handles() {
            0 => Ok(()),
            count => Err(ArrayError::LiveHandles { count }),
        }
    }

    /// Held across any engine call that may create arrays.
    pub(crate) fn admit(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.gate.read()
    }

    pub(crate) fn register(&self) {
        self.inner.live.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unregister(&self) {
        self.inner.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("engine", &self.engine().name())
            .field("convention", &self.convention())
            .field("live_handles", &self.live_handles())
            .finish()
    }
}
