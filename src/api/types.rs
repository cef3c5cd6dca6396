//! api::types
//!
//! Request and response shapes for the HTTP entry points.
//!
//! # Design
//!
//! These are the wire shapes the (external) HTTP layer binds to. Requests
//! arrive as raw strings and are validated into domain types by the
//! handlers; responses and errors serialize to JSON. The error type maps
//! onto the status codes the entry points promise:
//!
//! | error          | status |
//! |----------------|--------|
//! | `Validation`   | 400    |
//! | `Auth`         | 401    |
//! | `LockConflict` | 403    |
//! | `Forbidden`    | 403    |
//! | `Upstream`     | 500    |
//!
//! A `LockConflict` body enumerates every offending path with its
//! holder, so the caller can render one combined message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineError;
use crate::locks::{LockConflict, LockError};
use crate::pipeline::PipelineError;

/// Upload request: query/form fields accompanying the file content.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    /// Target repository path.
    pub path: String,
    /// Target branch.
    pub branch: String,
    /// Commit message. Empty falls back to a generated message.
    #[serde(default)]
    pub message: String,
    /// Optional longer description, appended to the commit message.
    #[serde(default)]
    pub description: Option<String>,
}

/// Delete request body.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    /// Paths to delete.
    pub paths: Vec<String>,
    /// Optional commit message for the deletion commits.
    #[serde(default)]
    pub message: Option<String>,
}

/// Lock toggle request.
#[derive(Debug, Clone, Deserialize)]
pub struct LockRequest {
    /// Target repository path.
    pub path: String,
    /// Branch named by the caller. Validated for shape, but locks are
    /// repository-scoped: a lock on a path applies across branches.
    pub branch: String,
    /// `true` to acquire, `false` to release.
    pub desired: bool,
}

/// Successful upload response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Id of the new head commit.
    pub commit_id: String,
}

/// One failed item in a delete response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPath {
    /// The path that failed.
    pub path: String,
    /// Why it failed.
    pub reason: String,
}

/// Delete response: the per-item partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Paths that were deleted.
    pub deleted: Vec<String>,
    /// Paths that failed, with reasons.
    pub failed: Vec<FailedPath>,
}

/// Lock toggle response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResponse {
    /// Always `true`; errors use the error shape instead.
    pub ok: bool,
}

/// Lock status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStatusResponse {
    /// Whether the path is currently locked.
    pub is_locked: bool,
    /// Holder id, when locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_id: Option<String>,
    /// Holder display name, when locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
}

/// One offending path in a lock-conflict body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPath {
    /// The locked path.
    pub path: String,
    /// Holder id.
    pub holder_id: String,
    /// Holder display name.
    pub holder_name: String,
}

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Missing or malformed input. No remote call was made.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No authenticated identity on the request.
    #[error("authentication required")]
    Auth,

    /// The mutation was blocked by locks held by other users.
    #[error("{0}")]
    LockConflict(LockConflict),

    /// The actor may not perform this lock operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The object store or metadata store failed.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl ApiError {
    /// The HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Auth => 401,
            ApiError::LockConflict(_) | ApiError::Forbidden(_) => 403,
            ApiError::Upstream(_) => 500,
        }
    }

    /// The JSON body for this error.
    ///
    /// Lock conflicts enumerate every offending path and holder under
    /// `locked`; other errors carry only `error`.
    pub fn body(&self) -> serde_json::Value {
        match self {
            ApiError::LockConflict(conflict) => {
                let locked: Vec<LockedPath> = conflict
                    .offending
                    .iter()
                    .map(|o| LockedPath {
                        path: o.path.to_string(),
                        holder_id: o.holder.id.to_string(),
                        holder_name: o.holder.name.clone(),
                    })
                    .collect();
                serde_json::json!({
                    "error": self.to_string(),
                    "locked": locked,
                })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Locks(LockError::Conflict(conflict)) => {
                ApiError::LockConflict(conflict)
            }
            PipelineError::Locks(LockError::Held { path, holder }) => {
                ApiError::LockConflict(LockConflict {
                    offending: vec![crate::locks::OffendingLock { path, holder }],
                })
            }
            PipelineError::Locks(LockError::NotHolder { path }) => {
                ApiError::Forbidden(format!("'{path}' is not locked by the requesting user"))
            }
            PipelineError::Locks(LockError::Ledger(e)) => ApiError::Upstream(e.to_string()),
            PipelineError::Engine(EngineError::Validation(message)) => {
                ApiError::Validation(message)
            }
            PipelineError::Engine(e) => ApiError::Upstream(e.to_string()),
            PipelineError::Ledger(e) => ApiError::Upstream(e.to_string()),
        }
    }
}
