//! Per-request context tracking how the cache answered.

/// How the cache disposed of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheResponseStatus {
    /// The response came from the backend; no suitable entry was found.
    CacheMiss,
    /// The response was served from a stored entry.
    CacheHit,
    /// A stored entry was revalidated against the backend and served.
    Validated,
    /// The cache itself synthesized the response (error, timeout, or a
    /// self-addressed `OPTIONS`).
    CacheModuleResponse,
}

/// Context attached to a single `execute` call.
///
/// The dispatch status is written as the state machine advances;
/// last write wins. The caller reads it after the call returns.
#[derive(Debug, Clone, Default)]
pub struct CacheContext {
    status: Option<CacheResponseStatus>,
}

impl CacheContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatch status, if one has been recorded.
    pub fn status(&self) -> Option<CacheResponseStatus> {
        self.status
    }

    /// Records the dispatch status, overwriting any previous value.
    pub fn set_status(&mut self, status: CacheResponseStatus) {
        self.status = Some(status);
    }
}
