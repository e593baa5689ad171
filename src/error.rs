//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds enumerated in the scheduler's error handling design:
//! invalid inputs, invalid lifecycle transitions, operations on terminally
//! closed resources, registry lookup misses, and errors that originate
//! inside a caller-supplied module. `ModuleError` tags the latter with the
//! originating module's kind and id so a consumer reading the error pool
//! can tell which collaborator misbehaved.

use thiserror::Error;

use crate::id::{ModuleId, ModuleKind};

/// Convenience alias for results using the crate error type.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("illegal state transition: from {from} to {to}: {reason}")]
    IllegalState {
        from: String,
        to: String,
        reason: String,
    },

    #[error("operation on closed buffer")]
    ClosedBuffer,

    #[error("operation on closed pool")]
    ClosedPool,

    #[error("no module instances registered for kind {0:?}")]
    NotFound(ModuleKind),

    #[error("module error ({kind:?} {id}): {message}")]
    ModuleError {
        kind: ModuleKind,
        id: ModuleId,
        message: String,
    },

    #[error("scheduler error: {0}")]
    SchedulerError(String),
}

impl CrawlError {
    /// Wrap an arbitrary collaborator-reported error message into a
    /// [`CrawlError::ModuleError`], tagging it with the originating
    /// module's kind and id. This is the wrapping step worker loops
    /// perform before placing an error into the error pool (spec §7).
    pub fn from_module(kind: ModuleKind, id: ModuleId, message: impl Into<String>) -> Self {
        CrawlError::ModuleError {
            kind,
            id,
            message: message.into(),
        }
    }
}
