//! engine::delete
//!
//! Best-effort batch deletion.
//!
//! # Design
//!
//! Deletion is a per-item batch, not one atomic multi-file commit: each
//! path is resolved and deleted independently through the store's scoped
//! delete, producing one commit per removed file. One item's failure
//! never aborts its siblings; the outcome partitions the batch into
//! `deleted` and `failed` so the caller can report both in one response.
//!
//! This is deliberately asymmetric with the upload path, which commits a
//! whole batch atomically. A single atomic delete commit could not
//! report a partial partition - a path that turns out to be a directory
//! must fail alone while the rest proceed.
//!
//! Items run through a bounded task group rather than a sequential
//! loop; results are reported in input order regardless of completion
//! order.

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::core::types::{Actor, BranchName, RepoPath};
use crate::store::{ContentEntry, StoreError, VersionStore};

/// Concurrent per-item deletions.
pub const MAX_DELETE_CONCURRENCY: usize = 4;

/// Failure reason reported when a path resolves to a directory.
pub const REASON_IS_DIRECTORY: &str = "Is a directory";

/// One failed item of a delete batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// The path that could not be deleted.
    pub path: RepoPath,
    /// Human-readable reason.
    pub reason: String,
}

/// Outcome of a best-effort delete batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Paths that were deleted, in input order.
    pub deleted: Vec<RepoPath>,
    /// Paths that failed, with reasons, in input order.
    pub failed: Vec<DeleteFailure>,
}

impl DeleteOutcome {
    /// Whether every item of the batch succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

async fn delete_one(
    store: &dyn VersionStore,
    branch: &BranchName,
    path: &RepoPath,
    message: &str,
    author: &Actor,
) -> Result<(), String> {
    let entry = store
        .get_content(path, branch)
        .await
        .map_err(|e| reason_for(&e))?;
    let file = match entry {
        ContentEntry::Dir(_) => return Err(REASON_IS_DIRECTORY.to_string()),
        ContentEntry::File(file) => file,
    };
    store
        .delete_content(branch, path, &file.id, message, author)
        .await
        .map_err(|e| reason_for(&e))?;
    Ok(())
}

fn reason_for(err: &StoreError) -> String {
    match err {
        StoreError::NotFound(_) => "Not found".to_string(),
        other => other.to_string(),
    }
}

/// Delete a batch of paths, best-effort.
///
/// Every path is processed independently; the outcome partitions the
/// batch into `deleted` and `failed`. An empty batch is a successful
/// no-op. This function itself never fails: upstream errors become
/// per-item failure reasons.
pub async fn delete_files(
    store: &dyn VersionStore,
    branch: &BranchName,
    paths: &[RepoPath],
    message: &str,
    author: &Actor,
) -> DeleteOutcome {
    let results: Vec<(usize, Result<(), String>)> =
        stream::iter(paths.iter().enumerate().map(|(index, path)| async move {
            (index, delete_one(store, branch, path, message, author).await)
        }))
        .buffer_unordered(MAX_DELETE_CONCURRENCY)
        .collect()
        .await;

    let mut outcome = DeleteOutcome::default();
    let mut ordered = results;
    ordered.sort_by_key(|(index, _)| *index);
    for (index, result) in ordered {
        let path = paths[index].clone();
        match result {
            Ok(()) => outcome.deleted.push(path),
            Err(reason) => {
                debug!(path = %path, reason = %reason, "delete item failed");
                outcome.failed.push(DeleteFailure { path, reason });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Actor;
    use crate::store::mock::{FailOn, MockStore};

    fn branch() -> BranchName {
        BranchName::new("main").unwrap()
    }

    fn author() -> Actor {
        Actor::new("u1", "Ada", "ada@example.com")
    }

    fn path(p: &str) -> RepoPath {
        RepoPath::new(p).unwrap()
    }

    #[tokio::test]
    async fn deletes_existing_files() {
        let store = MockStore::with_branch("main");
        store.seed_file("main", "a.png", b"a");
        store.seed_file("main", "b.png", b"b");

        let outcome = delete_files(
            &store,
            &branch(),
            &[path("a.png"), path("b.png")],
            "Delete assets",
            &author(),
        )
        .await;

        assert_eq!(outcome.deleted, vec![path("a.png"), path("b.png")]);
        assert!(outcome.is_complete());
        assert!(store
            .get_content(&path("a.png"), &branch())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn directory_fails_without_aborting_siblings() {
        let store = MockStore::with_branch("main");
        store.seed_file("main", "c.png/inner.png", b"nested");
        store.seed_file("main", "d.png", b"d");

        let outcome = delete_files(
            &store,
            &branch(),
            &[path("c.png"), path("d.png")],
            "Delete",
            &author(),
        )
        .await;

        assert_eq!(outcome.deleted, vec![path("d.png")]);
        assert_eq!(
            outcome.failed,
            vec![DeleteFailure {
                path: path("c.png"),
                reason: REASON_IS_DIRECTORY.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_path_reports_not_found() {
        let store = MockStore::with_branch("main");
        store.seed_file("main", "real.png", b"r");

        let outcome = delete_files(
            &store,
            &branch(),
            &[path("ghost.png"), path("real.png")],
            "Delete",
            &author(),
        )
        .await;

        assert_eq!(outcome.deleted, vec![path("real.png")]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].reason, "Not found");
    }

    #[tokio::test]
    async fn upstream_failure_is_per_item() {
        let store = MockStore::with_branch("main");
        store.seed_file("main", "a.png", b"a");
        store.seed_file("main", "b.png", b"b");
        // One failing delete call; the sibling still goes through.
        store.set_fail_on_times(
            FailOn::DeleteContent(StoreError::Api {
                status: 500,
                message: "hiccup".into(),
            }),
            1,
        );

        let outcome = delete_files(
            &store,
            &branch(),
            &[path("a.png"), path("b.png")],
            "Delete",
            &author(),
        )
        .await;

        assert_eq!(outcome.deleted.len() + outcome.failed.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let store = MockStore::with_branch("main");
        let outcome = delete_files(&store, &branch(), &[], "Delete", &author()).await;
        assert!(outcome.deleted.is_empty());
        assert!(outcome.failed.is_empty());
    }
}
