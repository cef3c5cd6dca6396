//! store::traits
//!
//! Version store trait definition for the remote object graph.
//!
//! # Design
//!
//! The `VersionStore` trait is the typed boundary to a remote
//! content-addressable object store: blobs, trees, commits, and one
//! mutable ref per branch. The trait is async because every operation is
//! a remote call. All methods return `Result` so upstream failures stay
//! visible to the caller.
//!
//! Blobs, trees, and commits are immutable and content-addressed;
//! creating the same content twice yields the same id. The branch ref is
//! the only mutable object, and [`VersionStore::update_ref`] is the only
//! way to move it: a compare-and-swap that reports
//! [`UpdateRefOutcome::Conflict`] instead of silently overwriting.
//!
//! A path in the repository may resolve to a file or to a directory.
//! [`ContentEntry`] makes that an explicit tagged union at this boundary;
//! response shapes that match neither are a [`StoreError::Decode`], never
//! probed around.
//!
//! # Example
//!
//! ```ignore
//! use atelier::store::{TreeLeaf, UpdateRefOutcome, VersionStore};
//!
//! async fn advance(store: &dyn VersionStore) -> Result<(), StoreError> {
//!     let head = store.resolve_ref(&branch).await?;
//!     let base = store.get_commit(&head).await?.tree;
//!     let blob = store.create_blob(b"bytes").await?;
//!     let tree = store
//!         .create_tree(&base, &[TreeLeaf { path, blob }])
//!         .await?;
//!     let commit = store.create_commit(&tree, &head, "message", &author).await?;
//!     match store.update_ref(&branch, &head, &commit).await? {
//!         UpdateRefOutcome::Updated => Ok(()),
//!         UpdateRefOutcome::Conflict { .. } => { /* rebase and retry */ Ok(()) }
//!     }
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{Actor, BranchName, ObjectId, RepoPath};

/// Errors from version store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested object, path, or ref was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// The store API returned an error.
    #[error("store API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// A response did not match any expected shape.
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether a retry with backoff could plausibly succeed.
    ///
    /// Network failures and server-side (5xx) errors are transient;
    /// everything else is either permanent or a logical conflict that
    /// needs different handling than a blind retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A commit as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// The commit's own id.
    pub id: ObjectId,
    /// Id of the root tree this commit snapshots.
    pub tree: ObjectId,
    /// Parent commit ids. Linear history means at most one in practice.
    pub parents: Vec<ObjectId>,
}

/// Kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A file (blob).
    Blob,
    /// A subdirectory (tree).
    Tree,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Blob => write!(f, "blob"),
            EntryKind::Tree => write!(f, "tree"),
        }
    }
}

/// One entry of a tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path of the entry. Relative to the listed tree, or to the
    /// repository root for recursive listings.
    pub path: String,
    /// File mode string (e.g. "100644" for a regular file).
    pub mode: String,
    /// Whether this entry is a blob or a subtree.
    pub kind: EntryKind,
    /// Object id of the entry.
    pub id: ObjectId,
}

/// A leaf overlay entry for composite tree creation.
///
/// `path` is repository-root-relative; the store materializes every
/// intermediate subtree between the base tree and the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLeaf {
    /// Full path of the file within the repository.
    pub path: RepoPath,
    /// Blob id the path should point at.
    pub blob: ObjectId,
}

/// Outcome of a compare-and-swap ref update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRefOutcome {
    /// The ref was moved to the new commit.
    Updated,
    /// The ref no longer matched the expected old value.
    Conflict {
        /// The head observed at rejection time, when the store reports it.
        actual: Option<ObjectId>,
    },
}

/// A file resolved through the contents endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Blob id of the file content.
    pub id: ObjectId,
    /// Repository-relative path.
    pub path: String,
    /// Size in bytes as reported by the store.
    pub size: u64,
    /// File bytes, when the store inlined them in the response.
    pub content: Option<Vec<u8>>,
}

/// A directory child as returned from a contents listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Repository-relative path of the child.
    pub path: String,
    /// Whether the child is a file or a directory.
    pub kind: EntryKind,
    /// Object id of the child.
    pub id: ObjectId,
}

/// What a repository path resolves to.
///
/// The remote contents endpoint returns an object for a file and an
/// array for a directory. This union keeps that distinction explicit so
/// callers never have to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEntry {
    /// The path is a single file.
    File(FileEntry),
    /// The path is a directory; entries are its immediate children.
    Dir(Vec<DirEntry>),
}

impl ContentEntry {
    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, ContentEntry::Dir(_))
    }
}

/// The typed interface to the remote version store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one client can serve
/// concurrent mutation requests.
///
/// # Idempotency
///
/// `create_blob`, `create_tree`, and `create_commit` are idempotent per
/// content: the store addresses objects by hash, so re-creating
/// identical content returns the same id without duplicate storage.
/// Orphaned objects from an abandoned pipeline are inert and
/// store-collectible; nothing observable changes until `update_ref`.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Resolve a branch to its current head commit id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch does not exist
    async fn resolve_ref(&self, branch: &BranchName) -> Result<ObjectId, StoreError>;

    /// Fetch a commit by id.
    async fn get_commit(&self, id: &ObjectId) -> Result<CommitInfo, StoreError>;

    /// List the entries of one tree level.
    async fn get_tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>, StoreError>;

    /// Create a blob from raw bytes, returning its content address.
    async fn create_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError>;

    /// Create a tree by overlaying leaf entries onto a base tree.
    ///
    /// The store materializes all intermediate subtrees; the overlay is a
    /// flat list of root-relative leaves.
    async fn create_tree(
        &self,
        base: &ObjectId,
        overlay: &[TreeLeaf],
    ) -> Result<ObjectId, StoreError>;

    /// Create a commit referencing a tree, with a single parent.
    async fn create_commit(
        &self,
        tree: &ObjectId,
        parent: &ObjectId,
        message: &str,
        author: &Actor,
    ) -> Result<ObjectId, StoreError>;

    /// Move the branch ref from `expected_old` to `new`, compare-and-swap.
    ///
    /// Returns `Ok(UpdateRefOutcome::Conflict { .. })` when the ref no
    /// longer equals `expected_old`; that is a logical conflict for the
    /// caller's rebase loop, not an `Err`.
    async fn update_ref(
        &self,
        branch: &BranchName,
        expected_old: &ObjectId,
        new: &ObjectId,
    ) -> Result<UpdateRefOutcome, StoreError>;

    /// Resolve a path at a branch head to a file or directory listing.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the path does not exist at that ref
    /// - `Decode` if the response matches neither shape
    async fn get_content(
        &self,
        path: &RepoPath,
        branch: &BranchName,
    ) -> Result<ContentEntry, StoreError>;

    /// Delete a single file, scoped to a known content id.
    ///
    /// The store rejects the delete if the path's current content no
    /// longer matches `content_id`. Returns the id of the deletion
    /// commit.
    async fn delete_content(
        &self,
        branch: &BranchName,
        path: &RepoPath,
        content_id: &ObjectId,
        message: &str,
        author: &Actor,
    ) -> Result<ObjectId, StoreError>;

    /// List the tree at a branch head, optionally recursively.
    async fn list_tree(
        &self,
        branch: &BranchName,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>, StoreError>;
}
