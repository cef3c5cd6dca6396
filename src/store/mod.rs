//! store
//!
//! Typed client for the remote content-addressable version store.
//!
//! # Architecture
//!
//! The [`VersionStore`] trait defines the only way this crate talks to
//! the object graph: blobs, trees, commits, and the per-branch ref. The
//! commit engine is written against the trait, so the HTTP adapter and
//! the in-memory mock are interchangeable.
//!
//! - Objects are immutable and content-addressed; creation is idempotent
//! - The branch ref is the single mutable object; it moves only through
//!   the compare-and-swap in [`VersionStore::update_ref`]
//! - A path resolves to a [`ContentEntry`]: explicitly a file or a
//!   directory, never an ambiguous shape
//!
//! # Modules
//!
//! - `traits`: Core `VersionStore` trait, wire types, and `StoreError`
//! - [`http`]: Adapter for Git-data style REST APIs
//! - [`mock`]: In-memory implementation for deterministic testing
//! - [`retry`]: Bounded exponential backoff for transient failures

pub mod http;
pub mod mock;
pub mod retry;
mod traits;

pub use retry::RetryPolicy;
pub use traits::*;
