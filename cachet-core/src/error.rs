//! Error taxonomy for cache operations.
//!
//! The set is closed by design: every failure mode a request can observe is
//! one of these variants, and control flow in the orchestrator matches on
//! them rather than on exception-style unwinding.
//!
//! - [`TransportError`] — the backend exchange itself failed.
//! - [`StorageError`] — the cache store failed. Never fatal to a request;
//!   callers log and fall back to the backend or to stale data.
//! - [`ProtocolError`] — the backend produced a message that cannot be made
//!   protocol-compliant.
//! - [`RequestProtocolError`] — fatal noncompliance detected on an inbound
//!   request, answered with a synthesized 4xx/5xx response.

use thiserror::Error;

use crate::resource::AllocationError;

/// Backend dispatch failure, surfaced to the caller unless a
/// revalidation-failure salvage path applies.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct TransportError(Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    /// Wraps an arbitrary transport-level error.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self(error.into())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        Self::new(error)
    }
}

/// Error type for cache store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Internal storage error, state or computation failure.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error while talking to a remote store.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// The resource factory refused to allocate the response body.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl StorageError {
    /// Wraps an arbitrary error as an internal storage failure.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Internal(error.into())
    }
}

/// The backend produced a message that cannot be made compliant.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProtocolError(String);

impl ProtocolError {
    /// Creates a protocol error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Fatal noncompliance kinds detected on an inbound request.
///
/// Each kind maps to a synthesized error response; the request never
/// reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestProtocolError {
    /// The request method is not a known HTTP method.
    UnknownMethod,
    /// A weak entity tag was used with `Range`/`If-Range`.
    WeakEtagOnRange,
    /// A weak entity tag was used with `If-Match` on a state-changing
    /// method.
    WeakEtagOnStateChanging,
    /// The `Expect` header carries a directive other than `100-continue`.
    InvalidExpectDirective,
    /// The request HTTP version is outside HTTP/0.9 through HTTP/1.1.
    UnsupportedHttpVersion,
}

/// Error surfaced by the orchestrator's `execute`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend exchange failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend response could not be made protocol-compliant.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
