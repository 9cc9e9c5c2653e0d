#![warn(missing_docs)]
//! # cachet-core
//!
//! Core types and adapter interfaces for the `cachet` HTTP caching layer.
//!
//! This crate defines the seams between the caching logic and the outside
//! world, so that the orchestration crate stays independent of any concrete
//! transport or storage substrate:
//!
//! - **Transport** is abstracted by the [`Backend`] trait.
//! - **Storage** is abstracted by the [`CacheStore`] trait, with body bytes
//!   allocated through a pluggable [`ResourceFactory`].
//! - **Stored responses** are modelled by [`CacheEntry`], an immutable
//!   record of one origin exchange.
//! - **Served bodies** are modelled by [`CacheBody`], which replays stored
//!   bytes or streams an untouched backend body through.
//!
//! It also carries the small protocol toolbox every component needs:
//! HTTP-date parsing ([`date`]), `Cache-Control` directive parsing
//! ([`directives`]) and the closed error taxonomy ([`error`]).

pub mod backend;
pub mod body;
pub mod context;
pub mod date;
pub mod directives;
pub mod entry;
pub mod error;
pub mod resource;
pub mod store;

pub use backend::{clone_request, Backend, CacheRequest};
pub use body::{CacheBody, CacheResponse, PartialBody, ReadLimit, Remaining};
pub use context::{CacheContext, CacheResponseStatus};
pub use entry::CacheEntry;
pub use error::{
    CacheError, ProtocolError, RequestProtocolError, StorageError, TransportError,
};
pub use resource::{AllocationError, Resource, ResourceFactory, SharedResource};
pub use store::{CacheStore, StoreResult, Variant};
