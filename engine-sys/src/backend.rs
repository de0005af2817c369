//! Backend selection types.
//!
//! Backend and device selection is process-wide engine state. Switching
//! either while arrays are live is unsupported; the context in
//! `engine-array` refuses to do so.

use std::fmt;
use std::str::FromStr;

use crate::EngineError;

/// Compute backend of the engine. Discriminants are the engine's bit values.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Whatever the engine picks on its own.
    Default = 0,
    Cpu = 1,
    Cuda = 2,
    OpenCl = 4,
}

impl Backend {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Backend::Default),
            1 => Some(Backend::Cpu),
            2 => Some(Backend::Cuda),
            4 => Some(Backend::OpenCl),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Backend::Default => "default",
            Backend::Cpu => "cpu",
            Backend::Cuda => "cuda",
            Backend::OpenCl => "opencl",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Backend::Default),
            "cpu" => Ok(Backend::Cpu),
            "cuda" => Ok(Backend::Cuda),
            "opencl" => Ok(Backend::OpenCl),
            other => Err(EngineError::new(format!("unknown backend '{other}'"))),
        }
    }
}

/// Bitmask of backends an engine build supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BackendSet(u32);

impl BackendSet {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn with(self, backend: Backend) -> Self {
        Self(self.0 | backend.bits())
    }

    /// `Default` is always available: the engine resolves it itself.
    pub const fn contains(self, backend: Backend) -> bool {
        match backend {
            Backend::Default => true,
            other => self.0 & other.bits() != 0,
        }
    }

    /// Concrete backends in the set, lowest bit first.
    pub fn iter(self) -> impl Iterator<Item = Backend> {
        [Backend::Cpu, Backend::Cuda, Backend::OpenCl]
            .into_iter()
            .filter(move |b| self.0 & b.bits() != 0)
    }
}

impl fmt::Display for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Backend::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
