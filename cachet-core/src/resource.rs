//! Pluggable allocation of stored response bodies.
//!
//! A [`Resource`] is an opaque handle to the payload bytes of one cache
//! entry. Handles are shared behind [`Arc`], so a replaced entry keeps its
//! body alive for readers that still hold the old handle; the allocation is
//! released when the last clone drops.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

/// Handle to the stored payload bytes of a cache entry.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Contiguous view of the stored bytes.
    ///
    /// [`Bytes`] is reference-counted, so repeated calls are cheap and each
    /// served response gets an independent cursor over the same allocation.
    fn bytes(&self) -> Bytes;

    /// Length of the stored payload.
    fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Whether the stored payload is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared, reference-counted resource handle.
pub type SharedResource = Arc<dyn Resource>;

/// The factory refused to allocate a response body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("allocation of {requested} bytes refused (limit {limit})")]
pub struct AllocationError {
    /// Number of bytes the caller asked to store.
    pub requested: u64,
    /// The factory's configured limit.
    pub limit: u64,
}

/// Allocates [`Resource`] handles for response bodies.
///
/// Implementations decide where payload bytes live (heap, disk, a remote
/// blob store). The `source` argument is the cache key the resource is
/// allocated for, usable for naming or tracing.
pub trait ResourceFactory: Send + Sync {
    /// Copies `body` into a new resource.
    fn generate(&self, source: &str, body: Bytes) -> Result<SharedResource, AllocationError>;

    /// Duplicates an existing resource, e.g. when an updated entry inherits
    /// the prior entry's body.
    fn copy(
        &self,
        source: &str,
        resource: &SharedResource,
    ) -> Result<SharedResource, AllocationError> {
        self.generate(source, resource.bytes())
    }
}
