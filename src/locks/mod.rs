//! locks
//!
//! Mutual exclusion for tracked assets, derived from the lock ledger.
//!
//! # Architecture
//!
//! The coordinator never stores lock state. Every query projects the
//! append-only event ledger; every change appends to it. The guard is
//! the gate destructive operations (delete, overwrite-upload) must pass
//! before the commit engine runs.
//!
//! # Modules
//!
//! - [`coordinator`] - Status projection, ownership-checked toggling,
//!   and the batch guard

pub mod coordinator;

pub use coordinator::{
    LockConflict, LockCoordinator, LockError, LockHolder, LockStatus, OffendingLock,
};
