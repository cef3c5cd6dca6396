//! ledger::store
//!
//! The metadata-store boundary: tracked files, lock events, comments.
//!
//! # Design
//!
//! `LedgerStore` is the contract a metadata backend must satisfy. The
//! contract is deliberately narrow:
//!
//! - Lock events and comments are append-only. The trait exposes no way
//!   to mutate or delete them, so no implementation can be asked to.
//! - Reads are read-after-write consistent: an appended event is visible
//!   to every subsequent query on the same store handle.
//! - `track_file` is an idempotent insert-if-absent keyed on
//!   `(repo, path)`.
//!
//! Durability is the backend's concern (assumed ACID per statement, not
//! across statements); this crate never relies on multi-statement
//! transactions.
//!
//! [`MemoryLedger`] is the in-process implementation used by tests and
//! single-node deployments. Event ids are assigned from one monotone
//! counter, so two events created in the same clock instant still order
//! deterministically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use super::types::{Comment, LockEvent, TrackedFile};
use crate::core::types::{Actor, EventId, FileId, RepoId, RepoPath};

/// Errors from ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// No tracked file with the given id.
    #[error("unknown file id: {0}")]
    UnknownFile(FileId),

    /// The backing store failed.
    #[error("metadata store error: {0}")]
    Backend(String),
}

/// The metadata-store boundary consumed by the lock coordinator.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one handle serves concurrent
/// requests.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Register a path for asset-management features.
    ///
    /// Idempotent: returns the existing row when `(repo, path)` is
    /// already tracked.
    async fn track_file(&self, repo: RepoId, path: &RepoPath) -> Result<TrackedFile, LedgerError>;

    /// Look up a tracked file by `(repo, path)`.
    async fn find_file(
        &self,
        repo: RepoId,
        path: &RepoPath,
    ) -> Result<Option<TrackedFile>, LedgerError>;

    /// Append a lock or unlock event for a tracked file.
    async fn append_lock_event(
        &self,
        file: FileId,
        locked: bool,
        actor: &Actor,
    ) -> Result<LockEvent, LedgerError>;

    /// The event with the maximum `(created_at, event_id)` for a file.
    async fn latest_lock_event(&self, file: FileId) -> Result<Option<LockEvent>, LedgerError>;

    /// Full event history for a file, newest first. Audit surface.
    async fn lock_events(&self, file: FileId) -> Result<Vec<LockEvent>, LedgerError>;

    /// Append a comment to a tracked file.
    async fn add_comment(
        &self,
        file: FileId,
        actor: &Actor,
        message: &str,
    ) -> Result<Comment, LedgerError>;

    /// Comment history for a file, oldest first.
    async fn comments(&self, file: FileId) -> Result<Vec<Comment>, LedgerError>;
}

/// In-memory ledger implementation.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<MemoryLedgerInner>>,
}

#[derive(Debug, Default)]
struct MemoryLedgerInner {
    /// Tracked files keyed by (repo, path).
    files: HashMap<(RepoId, String), TrackedFile>,
    /// All lock events, in append order.
    events: Vec<LockEvent>,
    /// All comments, in append order.
    comments: Vec<Comment>,
    next_file_id: i64,
    next_event_id: i64,
    next_comment_id: i64,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of lock events across all files, for audit checks.
    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }
}

impl MemoryLedgerInner {
    fn known_file(&self, file: FileId) -> Result<(), LedgerError> {
        if self.files.values().any(|f| f.file_id == file) {
            Ok(())
        } else {
            Err(LedgerError::UnknownFile(file))
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn track_file(&self, repo: RepoId, path: &RepoPath) -> Result<TrackedFile, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (repo, path.to_string());
        if let Some(existing) = inner.files.get(&key) {
            return Ok(existing.clone());
        }
        inner.next_file_id += 1;
        let file = TrackedFile {
            file_id: FileId(inner.next_file_id),
            repo_id: repo,
            path: path.clone(),
        };
        inner.files.insert(key, file.clone());
        Ok(file)
    }

    async fn find_file(
        &self,
        repo: RepoId,
        path: &RepoPath,
    ) -> Result<Option<TrackedFile>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.files.get(&(repo, path.to_string())).cloned())
    }

    async fn append_lock_event(
        &self,
        file: FileId,
        locked: bool,
        actor: &Actor,
    ) -> Result<LockEvent, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.known_file(file)?;
        inner.next_event_id += 1;
        let event = LockEvent {
            event_id: EventId(inner.next_event_id),
            file_id: file,
            locked,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            created_at: Utc::now(),
        };
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn latest_lock_event(&self, file: FileId) -> Result<Option<LockEvent>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.file_id == file)
            .max_by_key(|e| e.sort_key())
            .cloned())
    }

    async fn lock_events(&self, file: FileId) -> Result<Vec<LockEvent>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<LockEvent> = inner
            .events
            .iter()
            .filter(|e| e.file_id == file)
            .cloned()
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse(e.sort_key()));
        Ok(events)
    }

    async fn add_comment(
        &self,
        file: FileId,
        actor: &Actor,
        message: &str,
    ) -> Result<Comment, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.known_file(file)?;
        inner.next_comment_id += 1;
        let comment = Comment {
            comment_id: inner.next_comment_id,
            file_id: file,
            actor_id: actor.id.clone(),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        inner.comments.push(comment.clone());
        Ok(comment)
    }

    async fn comments(&self, file: FileId) -> Result<Vec<Comment>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .comments
            .iter()
            .filter(|c| c.file_id == file)
            .cloned()
            .collect())
    }
}
