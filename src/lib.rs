//! Atelier - collaborative write pipeline for versioned binary assets
//!
//! Atelier lets multiple collaborators modify binary creative-asset
//! files in a remote content-addressable, version-controlled repository
//! without silently clobbering each other's work: a commit engine
//! synthesizes atomic commits against the immutable object graph, and a
//! lock coordinator derives mutual-exclusion state from an append-only
//! event ledger and gates destructive operations on it.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`api`] - HTTP-boundary request shapes and thin handlers
//! - [`pipeline`] - Guarded mutation pipeline (lock guard, then engine)
//! - [`engine`] - Commit engine: atomic uploads, best-effort deletes
//! - [`locks`] - Lock coordinator projecting the event ledger
//! - [`ledger`] - Append-only lock ledger and metadata boundary
//! - [`store`] - Typed client for the remote version store
//! - [`core`] - Strong domain types
//! - [`config`] - Configuration schema and loading
//!
//! # Correctness Invariants
//!
//! 1. Blobs, trees, and commits are immutable and content-addressed;
//!    the branch ref moves only through compare-and-swap
//! 2. Lock state is a pure projection of the event ledger; no cached
//!    "current lock" exists anywhere
//! 3. A path is deleted or overwritten only when unlocked or locked by
//!    the acting user, owner or not
//! 4. A guarded batch is rejected whole, with every offender enumerated

pub mod api;
pub mod config;
pub mod core;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod pipeline;
pub mod store;
