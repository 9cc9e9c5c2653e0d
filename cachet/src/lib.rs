#![warn(missing_docs)]
//! # cachet
//!
//! An RFC 2616 / RFC 5861-conformant HTTP caching layer that sits between
//! an application-level client and its transport. For each outbound request
//! the [`CacheOrchestrator`] decides whether to answer from a local store of
//! previously retrieved responses, to revalidate a stored entry
//! conditionally, or to forward unconditionally, and folds the backend's
//! answer back into the store.
//!
//! The orchestrator composes a set of small, mostly pure components:
//!
//! - [`validity::ValidityPolicy`] — freshness and age arithmetic;
//! - [`policy::RequestPolicy`] / [`policy::ResponsePolicy`] — cacheability
//!   gates on both sides of the exchange;
//! - [`suitability::SuitabilityChecker`] — matches stored entries against
//!   live requests (validators, `Vary`, conditionals);
//! - [`conditional::ConditionalRequestBuilder`] — derives `If-*` requests;
//! - [`generator::ResponseGenerator`] — materializes entries into
//!   responses;
//! - [`compliance`] — protocol repair at both boundaries;
//! - [`revalidator::AsynchronousRevalidator`] — the
//!   `stale-while-revalidate` worker pool, single-flight per key.
//!
//! Transports implement [`Backend`](cachet_core::Backend); storage
//! substrates implement [`CacheStore`](cachet_core::CacheStore) (see
//! `cachet-memory` for the in-memory reference store).
//!
//! ## Example
//!
//! ```ignore
//! use cachet::{CacheConfig, CacheOrchestrator};
//! use cachet_core::CacheContext;
//! use cachet_memory::MemoryCacheStore;
//!
//! let cache = CacheOrchestrator::builder()
//!     .backend(my_transport)
//!     .store(MemoryCacheStore::new())
//!     .config(CacheConfig::builder().shared_cache(false).build())
//!     .build();
//!
//! let mut ctx = CacheContext::new();
//! let response = cache.execute(request, &mut ctx).await?;
//! ```
//!
//! Range and partial-content caching are unsupported: `Range` requests and
//! `206` responses pass through untouched.

pub mod compliance;
pub mod conditional;
pub mod config;
pub mod generator;
pub mod orchestrator;
pub mod policy;
pub mod revalidator;
pub mod suitability;
pub mod validity;

#[cfg(test)]
mod test_util;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use orchestrator::{CacheOrchestrator, CacheOrchestratorBuilder};

pub use cachet_core::{
    Backend, CacheContext, CacheError, CacheRequest, CacheResponse, CacheResponseStatus,
    CacheStore,
};

/// The `cachet` prelude.
///
/// ```rust
/// use cachet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{CacheConfig, CacheContext, CacheError, CacheOrchestrator};
    pub use cachet_core::{Backend, CacheStore};
}
