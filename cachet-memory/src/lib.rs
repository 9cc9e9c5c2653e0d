#![warn(missing_docs)]
//! # cachet-memory
//!
//! The in-memory reference implementation of the `cachet` storage seam:
//! a [`MemoryCacheStore`] backed by a concurrent hash map, plus a
//! [`HeapResourceFactory`] that keeps response bodies on the heap behind
//! reference-counted handles.
//!
//! Suitable for single-process caches and as the store used in tests.
//! Entries live until they are replaced or invalidated; there is no
//! eviction beyond what invalidation removes.

mod keygen;
mod resource;
mod store;

pub use keygen::cache_key;
pub use resource::{HeapResource, HeapResourceFactory};
pub use store::MemoryCacheStore;
