//! store::mock
//!
//! In-memory version store for deterministic testing.
//!
//! # Design
//!
//! `MockStore` implements the full `VersionStore` trait against an
//! in-process object graph: content-addressed blobs, trees, and commits
//! keyed by their sha256, plus a per-branch ref map with strict
//! compare-and-swap. Because objects are keyed by content hash, blob
//! idempotency falls out for free: identical bytes hash to the same id
//! and occupy one slot.
//!
//! Failure scenarios are injectable per method via [`FailOn`], and every
//! call is recorded for verification.
//!
//! # Example
//!
//! ```
//! use atelier::store::mock::MockStore;
//! use atelier::store::VersionStore;
//!
//! # tokio_test::block_on(async {
//! let store = MockStore::with_branch("main");
//! let blob = store.create_blob(b"pixels").await.unwrap();
//!
//! // Identical content yields the identical id.
//! let again = store.create_blob(b"pixels").await.unwrap();
//! assert_eq!(blob, again);
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::traits::{
    CommitInfo, ContentEntry, DirEntry, EntryKind, FileEntry, StoreError, TreeEntry, TreeLeaf,
    UpdateRefOutcome, VersionStore,
};
use crate::core::types::{Actor, BranchName, ObjectId, RepoPath};

/// File mode for regular blobs.
const MODE_BLOB: &str = "100644";
/// File mode for subtrees.
const MODE_TREE: &str = "040000";

/// Mock version store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockStoreInner {
    /// Objects by content address.
    objects: HashMap<ObjectId, Object>,
    /// Branch refs.
    refs: HashMap<String, ObjectId>,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Remaining injected failures; `None` means unlimited.
    fail_remaining: Option<u32>,
    /// Queued concurrent-writer commits, applied one per `update_ref`
    /// call just before the CAS check. Simulates a racing writer that
    /// lands first.
    interlopers: Vec<(String, Vec<u8>)>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// A stored object.
#[derive(Debug, Clone)]
enum Object {
    Blob(Vec<u8>),
    /// One directory level: name -> (kind, id), sorted for stable hashing.
    Tree(BTreeMap<String, (EntryKind, ObjectId)>),
    Commit {
        tree: ObjectId,
        parents: Vec<ObjectId>,
        message: String,
        author: String,
    },
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail resolve_ref with the given error.
    ResolveRef(StoreError),
    /// Fail get_commit with the given error.
    GetCommit(StoreError),
    /// Fail get_tree with the given error.
    GetTree(StoreError),
    /// Fail create_blob with the given error.
    CreateBlob(StoreError),
    /// Fail create_tree with the given error.
    CreateTree(StoreError),
    /// Fail create_commit with the given error.
    CreateCommit(StoreError),
    /// Fail update_ref with the given error.
    UpdateRef(StoreError),
    /// Fail get_content with the given error.
    GetContent(StoreError),
    /// Fail delete_content with the given error.
    DeleteContent(StoreError),
    /// Fail list_tree with the given error.
    ListTree(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    ResolveRef { branch: String },
    GetCommit { id: ObjectId },
    GetTree { id: ObjectId },
    CreateBlob { size: usize },
    CreateTree { base: ObjectId, leaves: usize },
    CreateCommit { tree: ObjectId, parent: ObjectId },
    UpdateRef { branch: String, expected: ObjectId, new: ObjectId },
    GetContent { branch: String, path: String },
    DeleteContent { path: String, content_id: ObjectId },
    ListTree { branch: String, recursive: bool },
}

fn hash_object(kind: &str, payload: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"\0");
    hasher.update(payload);
    let digest = hasher.finalize();
    // Hex of sha256 is always a valid 64-char ObjectId.
    ObjectId::new(hex::encode(digest)).expect("sha256 hex is a valid object id")
}

impl MockStoreInner {
    fn take_failure(&mut self, matches: impl Fn(&FailOn) -> Option<StoreError>) -> Option<StoreError> {
        let err = self.fail_on.as_ref().and_then(&matches)?;
        if let Some(remaining) = &mut self.fail_remaining {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.fail_on = None;
                self.fail_remaining = None;
            }
        }
        Some(err)
    }

    fn insert_blob(&mut self, bytes: &[u8]) -> ObjectId {
        let id = hash_object("blob", bytes);
        self.objects
            .entry(id.clone())
            .or_insert_with(|| Object::Blob(bytes.to_vec()));
        id
    }

    fn insert_tree(&mut self, entries: BTreeMap<String, (EntryKind, ObjectId)>) -> ObjectId {
        let mut payload = Vec::new();
        for (name, (kind, id)) in &entries {
            payload.extend_from_slice(kind.to_string().as_bytes());
            payload.push(b' ');
            payload.extend_from_slice(id.as_str().as_bytes());
            payload.push(b' ');
            payload.extend_from_slice(name.as_bytes());
            payload.push(b'\n');
        }
        let id = hash_object("tree", &payload);
        self.objects
            .entry(id.clone())
            .or_insert(Object::Tree(entries));
        id
    }

    fn insert_commit(
        &mut self,
        tree: ObjectId,
        parents: Vec<ObjectId>,
        message: &str,
        author: &str,
    ) -> ObjectId {
        let mut payload = Vec::new();
        payload.extend_from_slice(tree.as_str().as_bytes());
        for parent in &parents {
            payload.push(b'\n');
            payload.extend_from_slice(parent.as_str().as_bytes());
        }
        payload.push(b'\n');
        payload.extend_from_slice(author.as_bytes());
        payload.push(b'\n');
        payload.extend_from_slice(message.as_bytes());
        let id = hash_object("commit", &payload);
        self.objects.entry(id.clone()).or_insert(Object::Commit {
            tree,
            parents,
            message: message.to_string(),
            author: author.to_string(),
        });
        id
    }

    fn tree_entries(&self, id: &ObjectId) -> Result<&BTreeMap<String, (EntryKind, ObjectId)>, StoreError> {
        match self.objects.get(id) {
            Some(Object::Tree(entries)) => Ok(entries),
            Some(_) => Err(StoreError::Decode(format!("{} is not a tree", id.short(8)))),
            None => Err(StoreError::NotFound(format!("tree {}", id.short(8)))),
        }
    }

    fn commit(&self, id: &ObjectId) -> Result<CommitInfo, StoreError> {
        match self.objects.get(id) {
            Some(Object::Commit { tree, parents, .. }) => Ok(CommitInfo {
                id: id.clone(),
                tree: tree.clone(),
                parents: parents.clone(),
            }),
            Some(_) => Err(StoreError::Decode(format!(
                "{} is not a commit",
                id.short(8)
            ))),
            None => Err(StoreError::NotFound(format!("commit {}", id.short(8)))),
        }
    }

    fn head(&self, branch: &BranchName) -> Result<ObjectId, StoreError> {
        self.refs
            .get(branch.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("refs/heads/{}", branch)))
    }

    /// Rebuild the spine of `tree_id` with `segments` pointing at `blob`.
    fn overlay_leaf(
        &mut self,
        tree_id: &ObjectId,
        segments: &[&str],
        blob: &ObjectId,
    ) -> Result<ObjectId, StoreError> {
        let mut entries = self.tree_entries(tree_id)?.clone();
        let (first, rest) = segments
            .split_first()
            .expect("validated paths have at least one segment");
        if rest.is_empty() {
            entries.insert((*first).to_string(), (EntryKind::Blob, blob.clone()));
        } else {
            let child_id = match entries.get(*first) {
                Some((EntryKind::Tree, id)) => id.clone(),
                // A blob in the way is replaced by a directory, matching
                // how the composite create on the remote store behaves.
                _ => self.insert_tree(BTreeMap::new()),
            };
            let new_child = self.overlay_leaf(&child_id, rest, blob)?;
            entries.insert((*first).to_string(), (EntryKind::Tree, new_child));
        }
        Ok(self.insert_tree(entries))
    }

    /// Rebuild the spine of `tree_id` with `segments` removed.
    /// Empty subtrees are pruned. Returns `None` when the path is absent.
    fn remove_leaf(&mut self, tree_id: &ObjectId, segments: &[&str]) -> Option<ObjectId> {
        let mut entries = self.tree_entries(tree_id).ok()?.clone();
        let (first, rest) = segments.split_first()?;
        if rest.is_empty() {
            entries.remove(*first)?;
        } else {
            let child_id = match entries.get(*first) {
                Some((EntryKind::Tree, id)) => id.clone(),
                _ => return None,
            };
            match self.remove_leaf(&child_id, rest) {
                Some(new_child) => {
                    let child_entries = self.tree_entries(&new_child).ok()?;
                    if child_entries.is_empty() {
                        entries.remove(*first);
                    } else {
                        entries.insert((*first).to_string(), (EntryKind::Tree, new_child));
                    }
                }
                None => return None,
            }
        }
        Some(self.insert_tree(entries))
    }

    /// Walk a tree by path segments.
    fn lookup(
        &self,
        tree_id: &ObjectId,
        segments: &[&str],
    ) -> Result<(EntryKind, ObjectId), StoreError> {
        let entries = self.tree_entries(tree_id)?;
        let (first, rest) = segments
            .split_first()
            .expect("validated paths have at least one segment");
        let (kind, id) = entries
            .get(*first)
            .ok_or_else(|| StoreError::NotFound(format!("path segment '{first}'")))?;
        if rest.is_empty() {
            Ok((*kind, id.clone()))
        } else {
            match kind {
                EntryKind::Tree => self.lookup(id, rest),
                EntryKind::Blob => Err(StoreError::NotFound(format!(
                    "'{first}' is a file, not a directory"
                ))),
            }
        }
    }

    /// Commit a single file onto a branch head, bypassing CAS.
    fn apply_seed(&mut self, branch: &str, path: &str, bytes: &[u8]) -> ObjectId {
        let head = self
            .refs
            .get(branch)
            .cloned()
            .expect("seeding requires an existing branch");
        let base_tree = match self.objects.get(&head) {
            Some(Object::Commit { tree, .. }) => tree.clone(),
            _ => panic!("branch head is not a commit"),
        };
        let blob = self.insert_blob(bytes);
        let segments: Vec<&str> = path.split('/').collect();
        let tree = self
            .overlay_leaf(&base_tree, &segments, &blob)
            .expect("seed overlay cannot fail");
        let commit = self.insert_commit(tree, vec![head], &format!("Seed {path}"), "system");
        self.refs.insert(branch.to_string(), commit.clone());
        commit
    }

    fn walk_recursive(
        &self,
        tree_id: &ObjectId,
        prefix: &str,
        out: &mut Vec<TreeEntry>,
    ) -> Result<(), StoreError> {
        let entries = self.tree_entries(tree_id)?.clone();
        for (name, (kind, id)) in entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            match kind {
                EntryKind::Blob => out.push(TreeEntry {
                    path,
                    mode: MODE_BLOB.to_string(),
                    kind,
                    id,
                }),
                EntryKind::Tree => {
                    out.push(TreeEntry {
                        path: path.clone(),
                        mode: MODE_TREE.to_string(),
                        kind,
                        id: id.clone(),
                    });
                    self.walk_recursive(&id, &path, out)?;
                }
            }
        }
        Ok(())
    }
}

impl MockStore {
    /// Create an empty mock store with no branches.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockStoreInner {
                objects: HashMap::new(),
                refs: HashMap::new(),
                fail_on: None,
                fail_remaining: None,
                interlopers: Vec::new(),
                operations: Vec::new(),
            })),
        }
    }

    /// Create a mock store with one branch pointing at an empty root commit.
    pub fn with_branch(branch: &str) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            let tree = inner.insert_tree(BTreeMap::new());
            let commit = inner.insert_commit(tree, Vec::new(), "Initial commit", "system");
            inner.refs.insert(branch.to_string(), commit);
        }
        store
    }

    /// Configure a method to fail with the given error until cleared.
    pub fn set_fail_on(&self, fail: FailOn) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(fail);
        inner.fail_remaining = None;
    }

    /// Configure a method to fail `times` times, then recover.
    pub fn set_fail_on_times(&self, fail: FailOn, times: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(fail);
        inner.fail_remaining = Some(times);
    }

    /// Clear any configured failure.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
        inner.fail_remaining = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Current head of a branch, if the branch exists.
    pub fn head(&self, branch: &str) -> Option<ObjectId> {
        self.inner.lock().unwrap().refs.get(branch).cloned()
    }

    /// Force a branch to a commit, bypassing CAS. Test setup only.
    pub fn set_head(&self, branch: &str, commit: ObjectId) {
        self.inner
            .lock()
            .unwrap()
            .refs
            .insert(branch.to_string(), commit);
    }

    /// Read blob bytes back by id.
    pub fn blob_bytes(&self, id: &ObjectId) -> Option<Vec<u8>> {
        match self.inner.lock().unwrap().objects.get(id) {
            Some(Object::Blob(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Commit message of a stored commit, for assertions.
    pub fn commit_message(&self, id: &ObjectId) -> Option<String> {
        match self.inner.lock().unwrap().objects.get(id) {
            Some(Object::Commit { message, .. }) => Some(message.clone()),
            _ => None,
        }
    }

    /// Total number of stored objects (blobs + trees + commits).
    pub fn object_count(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    /// Seed a file onto a branch head directly. Test setup only; applies
    /// the same overlay path as a real commit but without CAS.
    pub fn seed_file(&self, branch: &str, path: &str, bytes: &[u8]) -> ObjectId {
        self.inner.lock().unwrap().apply_seed(branch, path, bytes)
    }

    /// Queue a concurrent-writer commit to land immediately before the
    /// next `update_ref` call, making that CAS observe a moved head.
    pub fn push_interloper(&self, path: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .interlopers
            .push((path.to_string(), bytes.to_vec()));
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionStore for MockStore {
    async fn resolve_ref(&self, branch: &BranchName) -> Result<ObjectId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::ResolveRef {
            branch: branch.to_string(),
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::ResolveRef(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        inner.head(branch)
    }

    async fn get_commit(&self, id: &ObjectId) -> Result<CommitInfo, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .operations
            .push(MockOperation::GetCommit { id: id.clone() });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::GetCommit(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        inner.commit(id)
    }

    async fn get_tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .operations
            .push(MockOperation::GetTree { id: id.clone() });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::GetTree(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        let entries = inner.tree_entries(id)?;
        Ok(entries
            .iter()
            .map(|(name, (kind, id))| TreeEntry {
                path: name.clone(),
                mode: match kind {
                    EntryKind::Blob => MODE_BLOB.to_string(),
                    EntryKind::Tree => MODE_TREE.to_string(),
                },
                kind: *kind,
                id: id.clone(),
            })
            .collect())
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .operations
            .push(MockOperation::CreateBlob { size: bytes.len() });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::CreateBlob(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        Ok(inner.insert_blob(bytes))
    }

    async fn create_tree(
        &self,
        base: &ObjectId,
        overlay: &[TreeLeaf],
    ) -> Result<ObjectId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreateTree {
            base: base.clone(),
            leaves: overlay.len(),
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::CreateTree(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        let mut tree = base.clone();
        for leaf in overlay {
            let segments: Vec<&str> = leaf.path.as_str().split('/').collect();
            tree = inner.overlay_leaf(&tree, &segments, &leaf.blob)?;
        }
        Ok(tree)
    }

    async fn create_commit(
        &self,
        tree: &ObjectId,
        parent: &ObjectId,
        message: &str,
        author: &Actor,
    ) -> Result<ObjectId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreateCommit {
            tree: tree.clone(),
            parent: parent.clone(),
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::CreateCommit(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        Ok(inner.insert_commit(
            tree.clone(),
            vec![parent.clone()],
            message,
            &format!("{} <{}>", author.name, author.email),
        ))
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        expected_old: &ObjectId,
        new: &ObjectId,
    ) -> Result<UpdateRefOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::UpdateRef {
            branch: branch.to_string(),
            expected: expected_old.clone(),
            new: new.clone(),
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::UpdateRef(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        if !inner.interlopers.is_empty() {
            let (path, bytes) = inner.interlopers.remove(0);
            inner.apply_seed(branch.as_str(), &path, &bytes);
        }
        let current = inner.head(branch)?;
        if &current == expected_old {
            inner.refs.insert(branch.to_string(), new.clone());
            Ok(UpdateRefOutcome::Updated)
        } else {
            Ok(UpdateRefOutcome::Conflict {
                actual: Some(current),
            })
        }
    }

    async fn get_content(
        &self,
        path: &RepoPath,
        branch: &BranchName,
    ) -> Result<ContentEntry, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::GetContent {
            branch: branch.to_string(),
            path: path.to_string(),
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::GetContent(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        let head = inner.head(branch)?;
        let root = inner.commit(&head)?.tree;
        let segments: Vec<&str> = path.as_str().split('/').collect();
        let (kind, id) = inner.lookup(&root, &segments)?;
        match kind {
            EntryKind::Blob => {
                let bytes = match inner.objects.get(&id) {
                    Some(Object::Blob(bytes)) => bytes.clone(),
                    _ => return Err(StoreError::Decode("blob entry without blob object".into())),
                };
                Ok(ContentEntry::File(FileEntry {
                    id,
                    path: path.to_string(),
                    size: bytes.len() as u64,
                    content: Some(bytes),
                }))
            }
            EntryKind::Tree => {
                let children = inner
                    .tree_entries(&id)?
                    .iter()
                    .map(|(name, (kind, id))| DirEntry {
                        path: format!("{path}/{name}"),
                        kind: *kind,
                        id: id.clone(),
                    })
                    .collect();
                Ok(ContentEntry::Dir(children))
            }
        }
    }

    async fn delete_content(
        &self,
        branch: &BranchName,
        path: &RepoPath,
        content_id: &ObjectId,
        message: &str,
        author: &Actor,
    ) -> Result<ObjectId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeleteContent {
            path: path.to_string(),
            content_id: content_id.clone(),
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::DeleteContent(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        let head = inner.head(branch)?;
        let root = inner.commit(&head)?.tree;
        let segments: Vec<&str> = path.as_str().split('/').collect();
        let (kind, id) = inner.lookup(&root, &segments)?;
        match kind {
            EntryKind::Tree => {
                return Err(StoreError::Api {
                    status: 422,
                    message: format!("'{path}' is a directory"),
                })
            }
            EntryKind::Blob if &id != content_id => {
                return Err(StoreError::Api {
                    status: 409,
                    message: format!("'{path}' does not match the provided content id"),
                })
            }
            EntryKind::Blob => {}
        }
        let new_root = inner
            .remove_leaf(&root, &segments)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let commit = inner.insert_commit(
            new_root,
            vec![head],
            message,
            &format!("{} <{}>", author.name, author.email),
        );
        inner.refs.insert(branch.to_string(), commit.clone());
        Ok(commit)
    }

    async fn list_tree(
        &self,
        branch: &BranchName,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::ListTree {
            branch: branch.to_string(),
            recursive,
        });
        if let Some(err) = inner.take_failure(|f| match f {
            FailOn::ListTree(e) => Some(e.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        let head = inner.head(branch)?;
        let root = inner.commit(&head)?.tree;
        if recursive {
            let mut out = Vec::new();
            inner.walk_recursive(&root, "", &mut out)?;
            Ok(out)
        } else {
            let entries = inner.tree_entries(&root)?;
            Ok(entries
                .iter()
                .map(|(name, (kind, id))| TreeEntry {
                    path: name.clone(),
                    mode: match kind {
                        EntryKind::Blob => MODE_BLOB.to_string(),
                        EntryKind::Tree => MODE_TREE.to_string(),
                    },
                    kind: *kind,
                    id: id.clone(),
                })
                .collect())
        }
    }
}
