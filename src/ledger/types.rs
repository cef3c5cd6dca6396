//! ledger::types
//!
//! Row types for the asset-metadata boundary.
//!
//! Three tables back the asset-management features: tracked files, lock
//! events, and comments. Lock events and comments are append-only; a row,
//! once written, is never mutated or deleted by any operation in this
//! crate. Current lock state is always derived from the event rows,
//! never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{ActorId, EventId, FileId, RepoId, RepoPath};

/// A path registered for asset-management features (locks, comments).
///
/// Created the first time a path is explicitly tracked; unique per
/// `(repo, path)`. Registration is an idempotent insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Row id.
    pub file_id: FileId,
    /// Owning repository.
    pub repo_id: RepoId,
    /// Repository-relative path.
    pub path: RepoPath,
}

/// One lock or unlock event.
///
/// Ordering is by `(created_at, event_id)`; the higher pair wins. The
/// most recent event for a file defines its current lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    /// Row id; breaks `created_at` ties, higher wins.
    pub event_id: EventId,
    /// The tracked file this event belongs to.
    pub file_id: FileId,
    /// `true` for lock, `false` for unlock.
    pub locked: bool,
    /// The actor who issued the event.
    pub actor_id: ActorId,
    /// Display name of the actor at event time.
    pub actor_name: String,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

impl LockEvent {
    /// Sort key: later events win, ids break timestamp ties.
    pub fn sort_key(&self) -> (DateTime<Utc>, EventId) {
        (self.created_at, self.event_id)
    }
}

/// One comment on a tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Row id.
    pub comment_id: i64,
    /// The tracked file this comment belongs to.
    pub file_id: FileId,
    /// The commenting actor.
    pub actor_id: ActorId,
    /// Comment body.
    pub message: String,
    /// Comment timestamp.
    pub created_at: DateTime<Utc>,
}
