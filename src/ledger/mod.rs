//! ledger
//!
//! Append-only lock ledger and asset metadata boundary.
//!
//! # Architecture
//!
//! The ledger is the system's only record of lock state. There is no
//! "current lock" column anywhere: the coordinator derives ownership by
//! projecting the event log, so the derived state can never drift from
//! the history that justifies it.
//!
//! **Important:** the ledger is authority for locks but not for file
//! content; the version store's object graph remains the single source
//! of truth for bytes.
//!
//! # Modules
//!
//! - [`types`] - Row types: TrackedFile, LockEvent, Comment
//! - [`store`] - The `LedgerStore` trait and in-memory implementation

pub mod store;
pub mod types;

pub use store::{LedgerError, LedgerStore, MemoryLedger};
pub use types::{Comment, LockEvent, TrackedFile};
