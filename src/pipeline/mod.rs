//! pipeline
//!
//! The guarded mutation pipeline: lock guard, then commit engine.
//!
//! # Architecture
//!
//! `MutationPipeline` is the entry surface for everything that changes a
//! repository. Destructive operations - deletion and overwrite-upload -
//! pass the lock guard before the commit engine runs: every path in the
//! batch must be unlocked or locked by the acting user, or the whole
//! batch is rejected with the full list of offenders. The guard is
//! applied uniformly to uploads; a new or untracked path has no ledger
//! row, is therefore unlocked, and passes trivially.
//!
//! # Known residual risk
//!
//! There is a time-of-check-to-time-of-use gap between the guard and the
//! final ref update: another actor can acquire a lock while a guarded
//! mutation is in flight, and that mutation will still land. With the
//! expected contention on a shared asset repository the window is
//! accepted. Two mitigations exist if it stops being acceptable: re-run
//! the guard immediately before the final ref-update attempt, or take a
//! short-lived per-path mutation lease for the duration of the pipeline.
//!
//! # Example
//!
//! ```ignore
//! use atelier::pipeline::MutationPipeline;
//!
//! let pipeline = MutationPipeline::new(store, ledger, RepoId(1));
//!
//! // Atomic upload of a batch
//! let commit = pipeline
//!     .upload_batch(&branch, changes, "Reimport after palette fix", &actor)
//!     .await?;
//!
//! // Best-effort delete
//! let outcome = pipeline
//!     .delete(&branch, &paths, "Retire unused scenes", &actor)
//!     .await?;
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::core::types::{Actor, BranchName, ObjectId, RepoId, RepoPath};
use crate::engine::{self, DeleteOutcome, EngineError, FileChange};
use crate::ledger::{Comment, LedgerError, LedgerStore, LockEvent};
use crate::locks::{LockCoordinator, LockError, LockStatus};
use crate::store::VersionStore;

/// Errors from pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A lock check or toggle failed.
    #[error(transparent)]
    Locks(#[from] LockError),

    /// The commit engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The metadata store failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Entry surface for repository mutations, one instance per repository.
#[derive(Clone)]
pub struct MutationPipeline {
    store: Arc<dyn VersionStore>,
    ledger: Arc<dyn LedgerStore>,
    locks: LockCoordinator,
    repo: RepoId,
}

impl MutationPipeline {
    /// Create a pipeline over a version store and a metadata ledger.
    pub fn new(store: Arc<dyn VersionStore>, ledger: Arc<dyn LedgerStore>, repo: RepoId) -> Self {
        let locks = LockCoordinator::new(ledger.clone());
        Self {
            store,
            ledger,
            locks,
            repo,
        }
    }

    /// The repository this pipeline serves.
    pub fn repo(&self) -> RepoId {
        self.repo
    }

    /// Upload a single file, guarded.
    ///
    /// Delegates to [`upload_batch`](Self::upload_batch) with one change.
    pub async fn upload(
        &self,
        branch: &BranchName,
        path: RepoPath,
        bytes: Vec<u8>,
        message: &str,
        actor: &Actor,
    ) -> Result<ObjectId, PipelineError> {
        self.upload_batch(branch, vec![FileChange::new(path, bytes)], message, actor)
            .await
    }

    /// Upload a batch of files as one atomic commit, guarded.
    ///
    /// Every path in the batch must be unlocked or locked by `actor`;
    /// otherwise the whole batch is rejected with
    /// [`LockError::Conflict`] listing every offender, and nothing is
    /// mutated anywhere.
    pub async fn upload_batch(
        &self,
        branch: &BranchName,
        changes: Vec<FileChange>,
        message: &str,
        actor: &Actor,
    ) -> Result<ObjectId, PipelineError> {
        let op_id = Uuid::new_v4();
        let paths: Vec<RepoPath> = changes.iter().map(|c| c.path.clone()).collect();
        self.locks.guard_mutation(self.repo, &paths, actor).await?;

        let commit =
            engine::commit_files(self.store.as_ref(), branch, &changes, message, actor).await?;
        info!(
            op = %op_id,
            repo = %self.repo,
            branch = %branch,
            commit = %commit.short(8),
            files = changes.len(),
            "upload committed"
        );
        Ok(commit)
    }

    /// Delete a batch of paths, guarded, best-effort per item.
    ///
    /// The guard is all-or-nothing across the batch; past it, each path
    /// succeeds or fails independently and the outcome reports the
    /// partition.
    pub async fn delete(
        &self,
        branch: &BranchName,
        paths: &[RepoPath],
        message: &str,
        actor: &Actor,
    ) -> Result<DeleteOutcome, PipelineError> {
        let op_id = Uuid::new_v4();
        self.locks.guard_mutation(self.repo, paths, actor).await?;

        let outcome =
            engine::delete_files(self.store.as_ref(), branch, paths, message, actor).await;
        info!(
            op = %op_id,
            repo = %self.repo,
            branch = %branch,
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "delete batch finished"
        );
        Ok(outcome)
    }

    /// Acquire or release a lock on a path.
    ///
    /// Tracks the path on first use. Ownership rules are enforced by the
    /// coordinator: acquiring over a different holder and releasing a
    /// lock one does not hold are both rejected.
    pub async fn lock(
        &self,
        path: &RepoPath,
        actor: &Actor,
        desired: bool,
    ) -> Result<(), PipelineError> {
        self.locks
            .set_lock(self.repo, path, actor, desired)
            .await
            .map_err(PipelineError::from)
    }

    /// Current lock state of a path.
    pub async fn lock_status(&self, path: &RepoPath) -> Result<LockStatus, PipelineError> {
        self.locks
            .get_lock_status(self.repo, path)
            .await
            .map_err(PipelineError::from)
    }

    /// Full lock event history for a path, newest first. Audit surface;
    /// an untracked path has an empty history.
    pub async fn lock_history(&self, path: &RepoPath) -> Result<Vec<LockEvent>, PipelineError> {
        match self.ledger.find_file(self.repo, path).await? {
            Some(file) => Ok(self.ledger.lock_events(file.file_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Add a comment to a path, tracking it on first use.
    pub async fn comment(
        &self,
        path: &RepoPath,
        actor: &Actor,
        message: &str,
    ) -> Result<Comment, PipelineError> {
        let file = self.ledger.track_file(self.repo, path).await?;
        Ok(self.ledger.add_comment(file.file_id, actor, message).await?)
    }

    /// Comment history for a path, oldest first.
    pub async fn comments(&self, path: &RepoPath) -> Result<Vec<Comment>, PipelineError> {
        match self.ledger.find_file(self.repo, path).await? {
            Some(file) => Ok(self.ledger.comments(file.file_id).await?),
            None => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Debug for MutationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPipeline")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
