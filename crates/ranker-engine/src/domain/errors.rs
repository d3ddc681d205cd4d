//! Domain error taxonomy.
//!
//! Every failed action maps to one machine-readable [`ErrorKind`] that is
//! reported back to the originating connection only; failures never corrupt
//! store state and never trigger a broadcast.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error classification shared across the whole system.
///
/// `Unauthenticated` is produced by the token verifier at the transport
/// boundary; all other kinds originate in the poll store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    Forbidden,
    InvalidArgument,
    PreconditionFailed,
    InvalidOperation,
}

/// Error returned by poll store mutators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// Poll, participant, or nomination id unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// Action not permitted for the current phase or the requester's role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed payload: empty text, duplicate ranking entries, unknown ids.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A countable requirement is not yet met.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Structurally impossible request.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl PollError {
    /// Classification used in `action_error` events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::NotFound(_) => ErrorKind::NotFound,
            PollError::Forbidden(_) => ErrorKind::Forbidden,
            PollError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PollError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            PollError::InvalidOperation(_) => ErrorKind::InvalidOperation,
        }
    }
}
