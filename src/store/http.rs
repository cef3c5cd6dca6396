//! store::http
//!
//! HTTP version store adapter for Git-data style REST APIs.
//!
//! # Design
//!
//! This module implements the `VersionStore` trait against the Git data
//! surface exposed by GitHub/Gitea-compatible hosts:
//!
//! - `git/refs`, `git/commits`, `git/trees`, `git/blobs` for the object
//!   graph
//! - `contents/{path}` for path resolution and scoped deletes
//!
//! # Compare-and-swap
//!
//! The ref PATCH endpoint does not take an expected-old value; it
//! enforces fast-forward-only updates instead. On a linear branch the
//! two are equivalent: the new commit's sole parent is `expected_old`,
//! so the update fast-forwards if and only if the head still equals
//! `expected_old`. A non-fast-forward rejection (409/422) is therefore
//! reported as [`UpdateRefOutcome::Conflict`], never as an `Err`.
//!
//! # Retries
//!
//! Read and create calls are idempotent and wrapped in bounded
//! exponential backoff for transient failures. `update_ref` and
//! `delete_content` are not retried here; the commit engine owns the
//! rebase loop and the destructive-call bookkeeping.
//!
//! # Example
//!
//! ```ignore
//! use atelier::store::http::HttpStore;
//! use atelier::store::VersionStore;
//!
//! let store = HttpStore::new(
//!     "https://git.example.com/api/v1",
//!     "studio",
//!     "campaign-assets",
//!     Some("token".to_string()),
//! );
//! let head = store.resolve_ref(&branch).await?;
//! ```

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::{with_retry, RetryPolicy};
use super::traits::{
    CommitInfo, ContentEntry, DirEntry, EntryKind, FileEntry, StoreError, TreeEntry, TreeLeaf,
    UpdateRefOutcome, VersionStore,
};
use crate::core::types::{Actor, BranchName, ObjectId, RepoPath};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "atelier";

/// HTTP version store adapter.
///
/// One instance serves one repository on one host. Cloning is cheap;
/// the underlying `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct HttpStore {
    /// HTTP client for making requests.
    client: Client,
    /// Bearer token, when the host requires authentication.
    token: Option<String>,
    /// Repository owner (user or organization).
    owner: String,
    /// Repository name.
    repo: String,
    /// API base URL.
    api_base: String,
    /// Backoff policy for idempotent calls.
    retry: RetryPolicy,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStore")
            .field("has_token", &self.token.is_some())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl HttpStore {
    /// Create a new HTTP store adapter.
    ///
    /// # Arguments
    ///
    /// * `api_base` - API base URL (e.g. `https://api.github.com`)
    /// * `owner` - Repository owner
    /// * `repo` - Repository name
    /// * `token` - Bearer token, or `None` for anonymous access
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token,
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the transient-failure retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| StoreError::AuthFailed("token is not a valid header".into()))?,
            );
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// One GET request, decoded. Retry wrapping happens at the call site.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, StoreError> {
        let resp = self
            .client
            .get(url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(Self::network)?;
        self.handle_response(resp).await
    }

    /// One POST request with a JSON body, decoded.
    async fn post_json<T, B>(&self, url: &str, body: &B) -> Result<T, StoreError>
    where
        T: for<'de> Deserialize<'de>,
        B: serde::Serialize + ?Sized,
    {
        let resp = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .map_err(Self::network)?;
        self.handle_response(resp).await
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, StoreError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                StoreError::Decode(format!("failed to parse response: {e}"))
            })
        } else {
            Err(Self::error_from_response(response, status).await)
        }
    }

    /// Map an error response from the API to a `StoreError`.
    async fn error_from_response(response: Response, status: StatusCode) -> StoreError {
        // Try to get an error message from the body
        let message = match response.json::<ApiErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => StoreError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => StoreError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited,
            _ if status.is_server_error() => StoreError::Api {
                status: status.as_u16(),
                message: format!("server error: {message}"),
            },
            _ => StoreError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    fn network(e: reqwest::Error) -> StoreError {
        StoreError::Network(e.to_string())
    }

    fn decode_oid(sha: &str, what: &str) -> Result<ObjectId, StoreError> {
        ObjectId::new(sha).map_err(|e| StoreError::Decode(format!("bad {what} id: {e}")))
    }
}

fn entry_kind(wire: &str) -> Option<EntryKind> {
    match wire {
        "blob" | "file" => Some(EntryKind::Blob),
        "tree" | "dir" => Some(EntryKind::Tree),
        _ => None,
    }
}

fn decode_tree_entries(entries: Vec<WireTreeEntry>) -> Result<Vec<TreeEntry>, StoreError> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(kind) = entry_kind(&entry.kind) else {
            // Submodules and symlinks are outside this pipeline's model.
            debug!(path = %entry.path, kind = %entry.kind, "skipping unsupported tree entry");
            continue;
        };
        out.push(TreeEntry {
            path: entry.path,
            mode: entry.mode,
            kind,
            id: HttpStore::decode_oid(&entry.sha, "tree entry")?,
        });
    }
    Ok(out)
}

#[async_trait]
impl VersionStore for HttpStore {
    async fn resolve_ref(&self, branch: &BranchName) -> Result<ObjectId, StoreError> {
        let url = self.repo_url(&format!("git/ref/heads/{branch}"));
        let url = url.as_str();
        let response: WireRef =
            with_retry(&self.retry, "resolve_ref", || self.get_json(url)).await?;
        Self::decode_oid(&response.object.sha, "ref target")
    }

    async fn get_commit(&self, id: &ObjectId) -> Result<CommitInfo, StoreError> {
        let url = self.repo_url(&format!("git/commits/{id}"));
        let url = url.as_str();
        let response: WireCommit =
            with_retry(&self.retry, "get_commit", || self.get_json(url)).await?;
        Ok(CommitInfo {
            id: Self::decode_oid(&response.sha, "commit")?,
            tree: Self::decode_oid(&response.tree.sha, "commit tree")?,
            parents: response
                .parents
                .iter()
                .map(|p| Self::decode_oid(&p.sha, "commit parent"))
                .collect::<Result<_, _>>()?,
        })
    }

    async fn get_tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>, StoreError> {
        let url = self.repo_url(&format!("git/trees/{id}"));
        let url = url.as_str();
        let response: WireTree =
            with_retry(&self.retry, "get_tree", || self.get_json(url)).await?;
        decode_tree_entries(response.tree)
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError> {
        let url = self.repo_url("git/blobs");
        let url = url.as_str();
        let body = CreateBlobBody {
            content: BASE64_STANDARD.encode(bytes),
            encoding: "base64",
        };
        let body = &body;
        let response: WireSha =
            with_retry(&self.retry, "create_blob", || self.post_json(url, body)).await?;
        Self::decode_oid(&response.sha, "blob")
    }

    async fn create_tree(
        &self,
        base: &ObjectId,
        overlay: &[TreeLeaf],
    ) -> Result<ObjectId, StoreError> {
        let url = self.repo_url("git/trees");
        let url = url.as_str();
        let body = CreateTreeBody {
            base_tree: base.as_str(),
            tree: overlay
                .iter()
                .map(|leaf| NewTreeEntry {
                    path: leaf.path.as_str(),
                    mode: "100644",
                    kind: "blob",
                    sha: leaf.blob.as_str(),
                })
                .collect(),
        };
        let body = &body;
        let response: WireSha =
            with_retry(&self.retry, "create_tree", || self.post_json(url, body)).await?;
        Self::decode_oid(&response.sha, "tree")
    }

    async fn create_commit(
        &self,
        tree: &ObjectId,
        parent: &ObjectId,
        message: &str,
        author: &Actor,
    ) -> Result<ObjectId, StoreError> {
        let url = self.repo_url("git/commits");
        let url = url.as_str();
        let body = CreateCommitBody {
            message,
            tree: tree.as_str(),
            parents: vec![parent.as_str()],
            author: WireAuthor {
                name: &author.name,
                email: &author.email,
                date: Some(Utc::now().to_rfc3339()),
            },
        };
        let body = &body;
        let response: WireSha =
            with_retry(&self.retry, "create_commit", || self.post_json(url, body)).await?;
        Self::decode_oid(&response.sha, "commit")
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        _expected_old: &ObjectId,
        new: &ObjectId,
    ) -> Result<UpdateRefOutcome, StoreError> {
        let url = self.repo_url(&format!("git/refs/heads/{branch}"));
        let body = UpdateRefBody {
            sha: new.as_str(),
            force: false,
        };
        let resp = self
            .client
            .patch(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(Self::network)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(UpdateRefOutcome::Updated);
        }
        // Non-fast-forward rejection; the host does not report the
        // observed head, so the caller re-resolves.
        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::CONFLICT {
            return Ok(UpdateRefOutcome::Conflict { actual: None });
        }
        Err(Self::error_from_response(resp, status).await)
    }

    async fn get_content(
        &self,
        path: &RepoPath,
        branch: &BranchName,
    ) -> Result<ContentEntry, StoreError> {
        let url = format!("{}?ref={branch}", self.repo_url(&format!("contents/{path}")));
        let url = url.as_str();
        let response: WireContents =
            with_retry(&self.retry, "get_content", || self.get_json(url)).await?;
        decode_contents(response)
    }

    async fn delete_content(
        &self,
        branch: &BranchName,
        path: &RepoPath,
        content_id: &ObjectId,
        message: &str,
        author: &Actor,
    ) -> Result<ObjectId, StoreError> {
        let url = self.repo_url(&format!("contents/{path}"));
        let body = DeleteContentBody {
            message,
            sha: content_id.as_str(),
            branch: branch.as_str(),
            author: WireAuthor {
                name: &author.name,
                email: &author.email,
                date: None,
            },
        };
        let resp = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(Self::network)?;
        let response: DeleteContentResponse = self.handle_response(resp).await?;
        Self::decode_oid(&response.commit.sha, "deletion commit")
    }

    async fn list_tree(
        &self,
        branch: &BranchName,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>, StoreError> {
        let head = self.resolve_ref(branch).await?;
        let tree = self.get_commit(&head).await?.tree;
        if !recursive {
            return self.get_tree(&tree).await;
        }
        let url = format!("{}?recursive=1", self.repo_url(&format!("git/trees/{tree}")));
        let url = url.as_str();
        let response: WireTree =
            with_retry(&self.retry, "list_tree", || self.get_json(url)).await?;
        decode_tree_entries(response.tree)
    }
}

/// Decode the file-or-directory union from the contents endpoint.
fn decode_contents(wire: WireContents) -> Result<ContentEntry, StoreError> {
    match wire {
        WireContents::File(file) => {
            if entry_kind(&file.kind) != Some(EntryKind::Blob) {
                return Err(StoreError::Decode(format!(
                    "unsupported content type '{}'",
                    file.kind
                )));
            }
            let content = match file.content {
                Some(encoded) => {
                    // Hosts wrap base64 payloads at 60 columns.
                    let compact: String =
                        encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                    Some(BASE64_STANDARD.decode(compact).map_err(|e| {
                        StoreError::Decode(format!("bad base64 content: {e}"))
                    })?)
                }
                None => None,
            };
            Ok(ContentEntry::File(FileEntry {
                id: HttpStore::decode_oid(&file.sha, "content")?,
                path: file.path,
                size: file.size,
                content,
            }))
        }
        WireContents::Dir(children) => {
            let mut entries = Vec::with_capacity(children.len());
            for child in children {
                let Some(kind) = entry_kind(&child.kind) else {
                    return Err(StoreError::Decode(format!(
                        "unsupported directory entry type '{}'",
                        child.kind
                    )));
                };
                entries.push(DirEntry {
                    path: child.path,
                    kind,
                    id: HttpStore::decode_oid(&child.sha, "directory entry")?,
                });
            }
            Ok(ContentEntry::Dir(entries))
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Error response format.
#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct WireSha {
    sha: String,
}

#[derive(Deserialize)]
struct WireRef {
    object: WireSha,
}

#[derive(Deserialize)]
struct WireCommit {
    sha: String,
    tree: WireSha,
    #[serde(default)]
    parents: Vec<WireSha>,
}

#[derive(Deserialize)]
struct WireTree {
    tree: Vec<WireTreeEntry>,
}

#[derive(Deserialize)]
struct WireTreeEntry {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

/// The contents endpoint returns an object for a file and an array for a
/// directory; anything else fails to deserialize and surfaces as Decode.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireContents {
    Dir(Vec<WireContentsChild>),
    File(WireContentsFile),
}

#[derive(Deserialize)]
struct WireContentsFile {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    sha: String,
    size: u64,
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireContentsChild {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    sha: String,
}

#[derive(Serialize)]
struct CreateBlobBody {
    content: String,
    encoding: &'static str,
}

#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: Vec<NewTreeEntry<'a>>,
}

#[derive(Serialize)]
struct NewTreeEntry<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
    author: WireAuthor<'a>,
}

#[derive(Serialize)]
struct WireAuthor<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Serialize)]
struct DeleteContentBody<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
    author: WireAuthor<'a>,
}

#[derive(Deserialize)]
struct DeleteContentResponse {
    commit: WireSha,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "abc123def4567890abc123def4567890abc12345";

    #[test]
    fn repo_url_building() {
        let store = HttpStore::new("https://api.example.com", "studio", "assets", None);
        assert_eq!(
            store.repo_url("git/blobs"),
            "https://api.example.com/repos/studio/assets/git/blobs"
        );
    }

    #[test]
    fn debug_does_not_leak_token() {
        let store = HttpStore::new("https://x", "o", "r", Some("sekrit".into()));
        let debug = format!("{store:?}");
        assert!(!debug.contains("sekrit"));
        assert!(debug.contains("has_token: true"));
    }

    #[test]
    fn contents_object_decodes_as_file() {
        let json = format!(
            r#"{{"type":"file","path":"a.png","sha":"{SHA}","size":3,"content":"cGl4\nZWxz\n"}}"#
        );
        let wire: WireContents = serde_json::from_str(&json).unwrap();
        let entry = decode_contents(wire).unwrap();
        match entry {
            ContentEntry::File(file) => {
                assert_eq!(file.path, "a.png");
                assert_eq!(file.content.as_deref(), Some(&b"pixels"[..]));
            }
            ContentEntry::Dir(_) => panic!("expected file"),
        }
    }

    #[test]
    fn contents_array_decodes_as_dir() {
        let json = format!(
            r#"[{{"type":"file","path":"d/a.png","sha":"{SHA}"}},
                {{"type":"dir","path":"d/sub","sha":"{SHA}"}}]"#
        );
        let wire: WireContents = serde_json::from_str(&json).unwrap();
        let entry = decode_contents(wire).unwrap();
        match entry {
            ContentEntry::Dir(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].kind, EntryKind::Blob);
                assert_eq!(children[1].kind, EntryKind::Tree);
            }
            ContentEntry::File(_) => panic!("expected dir"),
        }
    }

    #[test]
    fn contents_unknown_type_is_decode_error() {
        let json = format!(r#"{{"type":"symlink","path":"l","sha":"{SHA}","size":0}}"#);
        let wire: WireContents = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            decode_contents(wire),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn tree_entries_skip_submodules() {
        let entries = vec![
            WireTreeEntry {
                path: "a.png".into(),
                mode: "100644".into(),
                kind: "blob".into(),
                sha: SHA.into(),
            },
            WireTreeEntry {
                path: "vendored".into(),
                mode: "160000".into(),
                kind: "commit".into(),
                sha: SHA.into(),
            },
        ];
        let decoded = decode_tree_entries(entries).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].path, "a.png");
    }

    #[test]
    fn update_ref_body_serializes_non_forced() {
        let body = UpdateRefBody {
            sha: SHA,
            force: false,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, format!(r#"{{"sha":"{SHA}","force":false}}"#));
    }
}
