use std::fmt;

/// Borrowed engine identifier.
///
/// Naming an identifier confers no ownership; it is what read-only entry
/// points take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// Owned engine identifier.
///
/// Exactly one `RawHandle` exists per live engine-side resource. It is
/// neither `Clone` nor `Copy`; ownership moves into [`Engine::release`],
/// into a wrapper that will release it, or out through [`RawHandle::into_raw`].
/// Dropping a `RawHandle` does not free anything.
///
/// [`Engine::release`]: crate::Engine::release
#[must_use = "an unreleased RawHandle leaks engine storage"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    /// Take ownership of an identifier issued by the engine.
    ///
    /// # Safety
    ///
    /// `raw` must be a live identifier that no other `RawHandle` (or wrapper
    /// built from one) owns. Two owners lead to a double release, which the
    /// engine treats as undefined behavior.
    #[inline]
    pub const unsafe fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Borrow the identifier.
    #[inline]
    pub const fn id(&self) -> HandleId {
        HandleId(self.0)
    }

    /// Give up ownership and return the bare identifier.
    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    /// Engines reserve 0 for "no array".
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id().fmt(f)
    }
}
