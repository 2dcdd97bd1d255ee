//! Error types for the Laugh engine
//!
//! Every fallible operation in the engine returns [`Result`]. Variants follow the
//! failure classes the renderer distinguishes: fatal device errors, transient
//! surface errors, resource exhaustion and malformed descriptions.

use std::fmt;

/// Result type for Laugh engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Laugh engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (command recording, submission, object creation)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Allocation failed for a reason other than plain memory exhaustion
    AllocationError(String),

    /// Invalid resource (stale handle, wrong kind, bad descriptor)
    InvalidResource(String),

    /// Initialization failed (instance, device, surface, subsystems)
    InitializationFailed(String),

    /// A render pass description violates its own attachment/subpass rules
    InvalidRenderPass(String),

    /// Reflected shader bindings do not match the descriptor layout built for a pipeline
    ShaderStageMismatch {
        /// Pipeline being built
        pipeline: String,
        /// Offending shader stage
        stage: String,
        /// What did not match
        detail: String,
    },

    /// Surface is out of date or suboptimal, swap chain must be rebuilt
    SurfaceOutOfDate,

    /// Persisted asset could not be read, written or decoded
    AssetError(String),
}

impl Error {
    /// True for surface conditions that are recovered by recreating
    /// resolution-dependent state; everything else aborts the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::SurfaceOutOfDate)
    }

    /// True for memory exhaustion of either kind
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Error::OutOfMemory | Error::AllocationError(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::AllocationError(msg) => write!(f, "Allocation error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidRenderPass(msg) => write!(f, "Invalid render pass: {}", msg),
            Error::ShaderStageMismatch { pipeline, stage, detail } => write!(
                f,
                "Shader stage mismatch in pipeline '{}' ({} stage): {}",
                pipeline, stage, detail
            ),
            Error::SurfaceOutOfDate => write!(f, "Surface out of date"),
            Error::AssetError(msg) => write!(f, "Asset error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::AssetError(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
