//! engine::commit
//!
//! Atomic batch commits against the remote version store.
//!
//! # Architecture
//!
//! `commit_files` turns a batch of `(path, bytes)` changes into exactly
//! one commit:
//!
//! 1. Resolve the branch head and its base tree
//! 2. Create one blob per change, with bounded parallelism - blob
//!    creation is idempotent and order-free
//! 3. Overlay the base tree with the new leaves in one composite create
//! 4. Create a commit parented on the resolved head
//! 5. Move the ref with compare-and-swap
//!
//! The ref update is the only serialization point. When the CAS reports
//! a conflict the head has moved under us: the engine re-resolves the
//! head, rebuilds the overlay against the new base, and retries, bounded
//! by [`MAX_REF_ATTEMPTS`]. A blind retry of the same CAS would either
//! fail identically or, worse, discard the concurrent commit; the rebase
//! incorporates it instead.
//!
//! # Invariants
//!
//! - Success means the head's tree contains every changed path with the
//!   submitted bytes, and every untouched path byte-identical to the
//!   prior head's tree
//! - Any failure before the ref update leaves no observable state
//!   change; created blobs and trees are inert, store-collectible garbage
//! - The ref is never advanced over a concurrent commit without
//!   incorporating it as the new base

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::core::types::{Actor, BranchName, ObjectId, RepoPath};
use crate::store::{StoreError, TreeLeaf, UpdateRefOutcome, VersionStore};

use super::EngineError;

/// CAS attempts before giving up with `RefConflict`.
pub const MAX_REF_ATTEMPTS: u32 = 3;

/// Concurrent blob creations per commit.
pub const MAX_BLOB_CONCURRENCY: usize = 8;

/// One changed file in a commit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative destination path.
    pub path: RepoPath,
    /// Full new content for the path.
    pub bytes: Vec<u8>,
}

impl FileChange {
    pub fn new(path: RepoPath, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            bytes: bytes.into(),
        }
    }
}

fn validate_batch(changes: &[FileChange]) -> Result<(), EngineError> {
    if changes.is_empty() {
        return Err(EngineError::Validation("no files to commit".into()));
    }
    let mut seen = std::collections::HashSet::new();
    for change in changes {
        if !seen.insert(change.path.as_str()) {
            return Err(EngineError::Validation(format!(
                "duplicate path in batch: '{}'",
                change.path
            )));
        }
    }
    Ok(())
}

/// Commit a batch of file changes as one atomic commit.
///
/// Returns the id of the new head commit. See the module docs for the
/// algorithm and its guarantees.
///
/// # Errors
///
/// - [`EngineError::Validation`] for an empty batch or duplicate paths,
///   before any remote call
/// - [`EngineError::RefConflict`] when the head keeps moving and the
///   retry budget is exhausted
/// - [`EngineError::Upstream`] for store failures; `ref_mutated` is
///   `true` only when the failure happened in the ref update itself,
///   where the move may already have applied
pub async fn commit_files(
    store: &dyn VersionStore,
    branch: &BranchName,
    changes: &[FileChange],
    message: &str,
    author: &Actor,
) -> Result<ObjectId, EngineError> {
    validate_batch(changes)?;

    let mut head = store
        .resolve_ref(branch)
        .await
        .map_err(EngineError::before_ref_update)?;

    // Blob creation has no ordering dependency and same bytes always
    // yield the same id, so the fan-out is safe to run ahead of the
    // CAS loop and never needs to be repeated on a rebase.
    let leaves: Vec<TreeLeaf> = stream::iter(changes.iter().map(|change| async move {
        let blob = store.create_blob(&change.bytes).await?;
        Ok::<_, StoreError>(TreeLeaf {
            path: change.path.clone(),
            blob,
        })
    }))
    .buffer_unordered(MAX_BLOB_CONCURRENCY)
    .try_collect()
    .await
    .map_err(EngineError::before_ref_update)?;

    for attempt in 1..=MAX_REF_ATTEMPTS {
        let base = store
            .get_commit(&head)
            .await
            .map_err(EngineError::before_ref_update)?
            .tree;
        let tree = store
            .create_tree(&base, &leaves)
            .await
            .map_err(EngineError::before_ref_update)?;
        let commit = store
            .create_commit(&tree, &head, message, author)
            .await
            .map_err(EngineError::before_ref_update)?;

        match store
            .update_ref(branch, &head, &commit)
            .await
            .map_err(EngineError::at_ref_update)?
        {
            UpdateRefOutcome::Updated => {
                debug!(branch = %branch, commit = %commit.short(8), files = changes.len(), "committed batch");
                return Ok(commit);
            }
            UpdateRefOutcome::Conflict { actual } => {
                head = match actual {
                    Some(observed) => observed,
                    None => store
                        .resolve_ref(branch)
                        .await
                        .map_err(EngineError::before_ref_update)?,
                };
                warn!(
                    branch = %branch,
                    attempt,
                    new_head = %head.short(8),
                    "head moved during commit, rebasing onto new base"
                );
            }
        }
    }

    Err(EngineError::RefConflict {
        attempts: MAX_REF_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::{FailOn, MockStore};
    use crate::store::ContentEntry;

    fn branch() -> BranchName {
        BranchName::new("main").unwrap()
    }

    fn author() -> Actor {
        Actor::new("u1", "Ada", "ada@example.com")
    }

    fn change(path: &str, bytes: &[u8]) -> FileChange {
        FileChange::new(RepoPath::new(path).unwrap(), bytes)
    }

    async fn content_bytes(store: &MockStore, path: &str) -> Vec<u8> {
        match store
            .get_content(&RepoPath::new(path).unwrap(), &branch())
            .await
            .unwrap()
        {
            ContentEntry::File(file) => file.content.unwrap(),
            ContentEntry::Dir(_) => panic!("expected file at {path}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_fails_before_any_remote_call() {
        let store = MockStore::with_branch("main");
        let err = commit_files(&store, &branch(), &[], "init", &author())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn duplicate_paths_fail_before_any_remote_call() {
        let store = MockStore::with_branch("main");
        let changes = vec![change("a.png", b"1"), change("a.png", b"2")];
        let err = commit_files(&store, &branch(), &changes, "dup", &author())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn batch_produces_one_commit_with_exact_bytes() {
        let store = MockStore::with_branch("main");
        let old_head = store.head("main").unwrap();

        let changes = vec![change("a.png", b"aaa"), change("b.png", b"bbb")];
        let new_head = commit_files(&store, &branch(), &changes, "init", &author())
            .await
            .unwrap();

        assert_eq!(store.head("main"), Some(new_head.clone()));
        let info = store.get_commit(&new_head).await.unwrap();
        assert_eq!(info.parents, vec![old_head]);
        assert_eq!(store.commit_message(&new_head).unwrap(), "init");

        assert_eq!(content_bytes(&store, "a.png").await, b"aaa");
        assert_eq!(content_bytes(&store, "b.png").await, b"bbb");
    }

    #[tokio::test]
    async fn untouched_paths_survive_byte_identical() {
        let store = MockStore::with_branch("main");
        store.seed_file("main", "keep.png", b"keep me");

        commit_files(
            &store,
            &branch(),
            &[change("new.png", b"new")],
            "add new",
            &author(),
        )
        .await
        .unwrap();

        assert_eq!(content_bytes(&store, "keep.png").await, b"keep me");
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let store = MockStore::with_branch("main");
        store.seed_file("main", "a.png", b"v1");

        commit_files(
            &store,
            &branch(),
            &[change("a.png", b"v2")],
            "update",
            &author(),
        )
        .await
        .unwrap();

        assert_eq!(content_bytes(&store, "a.png").await, b"v2");
    }

    #[tokio::test]
    async fn cas_conflict_rebases_onto_new_head() {
        let store = MockStore::with_branch("main");

        // A concurrent writer lands between our resolve and our CAS.
        store.push_interloper("theirs.png", b"theirs");

        let new_head = commit_files(
            &store,
            &branch(),
            &[change("ours.png", b"ours")],
            "ours",
            &author(),
        )
        .await
        .unwrap();

        // Our commit sits on top of theirs, and both files exist.
        let info = store.get_commit(&new_head).await.unwrap();
        let parent = store.get_commit(&info.parents[0]).await.unwrap();
        assert!(!parent.parents.is_empty());
        assert_eq!(content_bytes(&store, "theirs.png").await, b"theirs");
        assert_eq!(content_bytes(&store, "ours.png").await, b"ours");
    }

    #[tokio::test]
    async fn exhausted_cas_budget_is_ref_conflict() {
        let store = MockStore::with_branch("main");
        // Every CAS attempt loses the race.
        for i in 0..MAX_REF_ATTEMPTS {
            store.push_interloper(&format!("racer-{i}.png"), b"fast");
        }

        let err = commit_files(
            &store,
            &branch(),
            &[change("a.png", b"a")],
            "msg",
            &author(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::RefConflict {
                attempts: MAX_REF_ATTEMPTS
            }
        ));
    }

    #[tokio::test]
    async fn update_ref_failure_is_tagged_ref_mutated() {
        let store = MockStore::with_branch("main");
        store.set_fail_on(FailOn::UpdateRef(StoreError::Network("reset".into())));

        let err = commit_files(
            &store,
            &branch(),
            &[change("a.png", b"a")],
            "msg",
            &author(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Upstream {
                ref_mutated: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failure_before_ref_update_changes_nothing() {
        let store = MockStore::with_branch("main");
        let head = store.head("main").unwrap();
        store.set_fail_on(FailOn::CreateCommit(StoreError::Api {
            status: 500,
            message: "boom".into(),
        }));

        let err = commit_files(
            &store,
            &branch(),
            &[change("a.png", b"a")],
            "msg",
            &author(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Upstream {
                ref_mutated: false,
                ..
            }
        ));
        assert_eq!(store.head("main"), Some(head));
    }

    #[tokio::test]
    async fn blob_fanout_is_idempotent_for_equal_content() {
        let store = MockStore::with_branch("main");

        commit_files(
            &store,
            &branch(),
            &[change("a.png", b"same"), change("b.png", b"same")],
            "two paths one blob",
            &author(),
        )
        .await
        .unwrap();

        assert_eq!(
            content_bytes(&store, "a.png").await,
            content_bytes(&store, "b.png").await
        );
    }
}
