//! Error types for obscurance-rs.

use thiserror::Error;

use crate::plan::ScratchId;

/// The main error type for obscurance-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObscuranceError {
    /// Two surfaces that must share a resolution do not.
    #[error("surface size mismatch: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A surface with zero width or height was supplied.
    #[error("surface '{0}' is empty")]
    EmptySurface(&'static str),

    /// A pass referenced a scratch buffer that is not currently held.
    #[error("scratch buffer {0:?} is not acquired")]
    UnknownScratch(ScratchId),

    /// A scratch buffer was acquired twice within one frame.
    #[error("scratch buffer {0:?} is already acquired")]
    ScratchInUse(ScratchId),

    /// A pass plan violated the acquire/run/release ordering.
    #[error("invalid pass plan: {0}")]
    InvalidPlan(String),
}

/// A specialized Result type for obscurance-core operations.
pub type Result<T> = std::result::Result<T, ObscuranceError>;
