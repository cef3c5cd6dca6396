//! locks::coordinator
//!
//! Lock ownership derived from the append-only event ledger.
//!
//! # Architecture
//!
//! Lock state is an event-sourced projection. For every `(repo, path)`
//! the coordinator reads the ledger's most recent event - maximum
//! `(created_at, event_id)` - and nothing else: `unlocked` when there is
//! no event or the latest event is an unlock, `locked-by(actor)`
//! otherwise. No cached or separately stored "current" state exists to
//! drift from the log.
//!
//! # Invariants
//!
//! - Acquiring a lock held by a different actor is rejected
//! - Releasing a lock is rejected unless the requester holds it
//! - Re-acquiring or re-releasing one's own state appends an audit event
//!   and reports success, changing no visible state
//! - A guard rejects a batch if and only if at least one path is locked
//!   by someone other than the requester, and enumerates every such path
//!
//! # Example
//!
//! ```ignore
//! use atelier::locks::{LockCoordinator, LockStatus};
//!
//! let coordinator = LockCoordinator::new(ledger);
//! coordinator.set_lock(repo, &path, &actor, true).await?;
//!
//! match coordinator.get_lock_status(repo, &path).await? {
//!     LockStatus::LockedBy(holder) => println!("held by {}", holder.name),
//!     LockStatus::Unlocked => println!("free"),
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::core::types::{Actor, ActorId, RepoId, RepoPath};
use crate::ledger::{LedgerError, LedgerStore};

/// The actor currently holding a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    /// Stable user identifier.
    pub id: ActorId,
    /// Display name at the time the lock was taken.
    pub name: String,
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Current lock state of one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// No lock is in effect.
    Unlocked,
    /// The path is locked by the given actor.
    LockedBy(LockHolder),
}

impl LockStatus {
    /// Whether any lock is in effect.
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::LockedBy(_))
    }

    /// The current holder, if locked.
    pub fn holder(&self) -> Option<&LockHolder> {
        match self {
            LockStatus::LockedBy(holder) => Some(holder),
            LockStatus::Unlocked => None,
        }
    }
}

/// A path blocking a guarded mutation, with its holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffendingLock {
    /// The locked path.
    pub path: RepoPath,
    /// Who holds it.
    pub holder: LockHolder,
}

/// A batch rejection: every path locked by someone else, with holders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConflict {
    /// All blocking paths. Never empty.
    pub offending: Vec<OffendingLock>,
}

impl std::fmt::Display for LockConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "locked by other users:")?;
        for lock in &self.offending {
            write!(f, " '{}' by {};", lock.path, lock.holder)?;
        }
        Ok(())
    }
}

impl std::error::Error for LockConflict {}

/// Errors from lock operations.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// Acquisition rejected: the path is held by a different actor.
    #[error("'{path}' is locked by {holder}")]
    Held {
        /// The contested path.
        path: RepoPath,
        /// The current holder.
        holder: LockHolder,
    },

    /// Release rejected: the requester does not hold the lock.
    #[error("'{path}' is not locked by the requesting user")]
    NotHolder {
        /// The path in question.
        path: RepoPath,
    },

    /// A guarded batch was rejected.
    #[error(transparent)]
    Conflict(#[from] LockConflict),

    /// The metadata store failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Derives lock ownership from the ledger and gates mutations on it.
#[derive(Clone)]
pub struct LockCoordinator {
    ledger: Arc<dyn LedgerStore>,
}

impl LockCoordinator {
    /// Create a coordinator over a ledger backend.
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Current lock state for a path.
    ///
    /// A path that was never tracked, or whose latest event is an
    /// unlock, is unlocked.
    pub async fn get_lock_status(
        &self,
        repo: RepoId,
        path: &RepoPath,
    ) -> Result<LockStatus, LockError> {
        let Some(file) = self.ledger.find_file(repo, path).await? else {
            return Ok(LockStatus::Unlocked);
        };
        let latest = self.ledger.latest_lock_event(file.file_id).await?;
        Ok(match latest {
            Some(event) if event.locked => LockStatus::LockedBy(LockHolder {
                id: event.actor_id,
                name: event.actor_name,
            }),
            _ => LockStatus::Unlocked,
        })
    }

    /// Acquire (`desired = true`) or release (`desired = false`) a lock.
    ///
    /// Tracks the path if it was not yet registered. Every accepted
    /// request appends an event, including same-state repeats by the
    /// holder, so the ledger is a complete audit trail.
    ///
    /// # Errors
    ///
    /// - [`LockError::Held`] when acquiring over a different holder
    /// - [`LockError::NotHolder`] when releasing a lock the requester
    ///   does not hold
    pub async fn set_lock(
        &self,
        repo: RepoId,
        path: &RepoPath,
        actor: &Actor,
        desired: bool,
    ) -> Result<(), LockError> {
        let file = self.ledger.track_file(repo, path).await?;
        let latest = self.ledger.latest_lock_event(file.file_id).await?;

        if desired {
            if let Some(event) = &latest {
                if event.locked && event.actor_id != actor.id {
                    return Err(LockError::Held {
                        path: path.clone(),
                        holder: LockHolder {
                            id: event.actor_id.clone(),
                            name: event.actor_name.clone(),
                        },
                    });
                }
            }
        } else {
            // Release requires ownership. The one exception is repeating
            // one's own release: the latest event is an unlock by the
            // same actor, and the repeat is an accepted audit append.
            match &latest {
                Some(event) if event.actor_id == actor.id => {}
                _ => {
                    return Err(LockError::NotHolder { path: path.clone() });
                }
            }
        }

        debug!(repo = %repo, path = %path, actor = %actor.id, desired, "appending lock event");
        self.ledger
            .append_lock_event(file.file_id, desired, actor)
            .await?;
        Ok(())
    }

    /// Gate a destructive batch on lock ownership.
    ///
    /// Collects every path locked by an actor other than `actor`. Any
    /// offender rejects the entire batch; the error lists all of them so
    /// the caller can render one combined message. On rejection nothing
    /// has been mutated anywhere.
    pub async fn guard_mutation(
        &self,
        repo: RepoId,
        paths: &[RepoPath],
        actor: &Actor,
    ) -> Result<(), LockError> {
        let mut offending = Vec::new();
        for path in paths {
            if let LockStatus::LockedBy(holder) = self.get_lock_status(repo, path).await? {
                if holder.id != actor.id {
                    offending.push(OffendingLock {
                        path: path.clone(),
                        holder,
                    });
                }
            }
        }
        if offending.is_empty() {
            Ok(())
        } else {
            Err(LockConflict { offending }.into())
        }
    }
}

impl std::fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCoordinator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    fn coordinator() -> (LockCoordinator, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        (LockCoordinator::new(ledger.clone()), ledger)
    }

    fn actor(id: &str) -> Actor {
        Actor::new(id, id.to_uppercase(), format!("{id}@example.com"))
    }

    fn path(p: &str) -> RepoPath {
        RepoPath::new(p).unwrap()
    }

    const REPO: RepoId = RepoId(1);

    #[tokio::test]
    async fn untracked_path_is_unlocked() {
        let (coordinator, _) = coordinator();
        let status = coordinator
            .get_lock_status(REPO, &path("a.png"))
            .await
            .unwrap();
        assert_eq!(status, LockStatus::Unlocked);
    }

    #[tokio::test]
    async fn acquire_then_status_shows_holder() {
        let (coordinator, _) = coordinator();
        let u1 = actor("u1");
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, true)
            .await
            .unwrap();

        let status = coordinator
            .get_lock_status(REPO, &path("a.png"))
            .await
            .unwrap();
        let holder = status.holder().unwrap();
        assert_eq!(holder.id, u1.id);
        assert_eq!(holder.name, "U1");
    }

    #[tokio::test]
    async fn acquire_over_other_holder_is_rejected() {
        let (coordinator, _) = coordinator();
        coordinator
            .set_lock(REPO, &path("x.psd"), &actor("u1"), true)
            .await
            .unwrap();

        let err = coordinator
            .set_lock(REPO, &path("x.psd"), &actor("u2"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Held { .. }));
    }

    #[tokio::test]
    async fn release_by_holder_unlocks() {
        let (coordinator, _) = coordinator();
        let u1 = actor("u1");
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, true)
            .await
            .unwrap();
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, false)
            .await
            .unwrap();

        let status = coordinator
            .get_lock_status(REPO, &path("a.png"))
            .await
            .unwrap();
        assert_eq!(status, LockStatus::Unlocked);
    }

    #[tokio::test]
    async fn release_by_non_holder_is_rejected() {
        let (coordinator, _) = coordinator();
        coordinator
            .set_lock(REPO, &path("a.png"), &actor("u1"), true)
            .await
            .unwrap();

        let err = coordinator
            .set_lock(REPO, &path("a.png"), &actor("u2"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHolder { .. }));
    }

    #[tokio::test]
    async fn release_without_any_lock_is_rejected() {
        let (coordinator, _) = coordinator();
        let err = coordinator
            .set_lock(REPO, &path("a.png"), &actor("u1"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHolder { .. }));
    }

    #[tokio::test]
    async fn reacquire_own_lock_appends_audit_event() {
        let (coordinator, ledger) = coordinator();
        let u1 = actor("u1");
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, true)
            .await
            .unwrap();
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, true)
            .await
            .unwrap();

        assert_eq!(ledger.event_count(), 2);
        let status = coordinator
            .get_lock_status(REPO, &path("a.png"))
            .await
            .unwrap();
        assert!(status.is_locked());
    }

    #[tokio::test]
    async fn rerelease_own_unlock_appends_audit_event() {
        let (coordinator, ledger) = coordinator();
        let u1 = actor("u1");
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, true)
            .await
            .unwrap();
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, false)
            .await
            .unwrap();
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, false)
            .await
            .unwrap();

        assert_eq!(ledger.event_count(), 3);
        let status = coordinator
            .get_lock_status(REPO, &path("a.png"))
            .await
            .unwrap();
        assert_eq!(status, LockStatus::Unlocked);
    }

    #[tokio::test]
    async fn guard_passes_clear_batch() {
        let (coordinator, _) = coordinator();
        let u1 = actor("u1");
        // u1's own lock does not block u1.
        coordinator
            .set_lock(REPO, &path("a.png"), &u1, true)
            .await
            .unwrap();

        coordinator
            .guard_mutation(REPO, &[path("a.png"), path("b.png")], &u1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn guard_rejects_batch_and_lists_all_offenders() {
        let (coordinator, _) = coordinator();
        coordinator
            .set_lock(REPO, &path("a.png"), &actor("u1"), true)
            .await
            .unwrap();
        coordinator
            .set_lock(REPO, &path("b.png"), &actor("u2"), true)
            .await
            .unwrap();

        let err = coordinator
            .guard_mutation(
                REPO,
                &[path("a.png"), path("b.png"), path("c.png")],
                &actor("u3"),
            )
            .await
            .unwrap_err();
        match err {
            LockError::Conflict(conflict) => {
                assert_eq!(conflict.offending.len(), 2);
                assert_eq!(conflict.offending[0].path, path("a.png"));
                assert_eq!(conflict.offending[1].path, path("b.png"));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scenario_lock_release_interleaving() {
        // setLock(U1, true); a U2 acquisition while held must fail;
        // after U1 releases, the path reads unlocked.
        let (coordinator, _) = coordinator();
        let u1 = actor("u1");
        let u2 = actor("u2");
        let p = path("x.psd");

        coordinator.set_lock(REPO, &p, &u1, true).await.unwrap();
        assert!(coordinator.set_lock(REPO, &p, &u2, true).await.is_err());
        coordinator.set_lock(REPO, &p, &u1, false).await.unwrap();

        let status = coordinator.get_lock_status(REPO, &p).await.unwrap();
        assert_eq!(status, LockStatus::Unlocked);
    }
}
