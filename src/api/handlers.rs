//! api::handlers
//!
//! Thin async handlers for the mutation entry points.
//!
//! # Design
//!
//! Each handler follows the same shape: authenticate, validate, call the
//! pipeline, map the result. Validation and authentication failures are
//! fail-fast - no remote call is issued. The handlers are framework-free;
//! the hosting HTTP layer binds its routes to these functions and renders
//! [`ApiError::status_code`] / [`ApiError::body`].

use tracing::instrument;

use super::types::{
    ApiError, DeleteRequest, DeleteResponse, FailedPath, LockRequest, LockResponse,
    LockStatusResponse, UploadRequest, UploadResponse,
};
use crate::core::types::{Actor, BranchName, RepoPath};
use crate::locks::LockStatus;
use crate::pipeline::MutationPipeline;

fn require_identity(identity: Option<&Actor>) -> Result<&Actor, ApiError> {
    identity.ok_or(ApiError::Auth)
}

fn parse_path(raw: &str) -> Result<RepoPath, ApiError> {
    RepoPath::new(raw).map_err(|e| ApiError::Validation(e.to_string()))
}

fn parse_branch(raw: &str) -> Result<BranchName, ApiError> {
    BranchName::new(raw).map_err(|e| ApiError::Validation(e.to_string()))
}

/// Compose the commit message from the request's message and description.
fn commit_message(message: &str, description: Option<&str>, fallback: String) -> String {
    let subject = if message.trim().is_empty() {
        fallback
    } else {
        message.trim().to_string()
    };
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(description) => format!("{subject}\n\n{description}"),
        None => subject,
    }
}

/// Handle an upload: one file, one commit.
#[instrument(skip_all, fields(path = %request.path, branch = %request.branch))]
pub async fn handle_upload(
    pipeline: &MutationPipeline,
    identity: Option<&Actor>,
    request: UploadRequest,
    content: Vec<u8>,
) -> Result<UploadResponse, ApiError> {
    let actor = require_identity(identity)?;
    let path = parse_path(&request.path)?;
    let branch = parse_branch(&request.branch)?;
    let message = commit_message(
        &request.message,
        request.description.as_deref(),
        format!("Upload {path}"),
    );

    let commit = pipeline
        .upload(&branch, path, content, &message, actor)
        .await?;
    Ok(UploadResponse {
        commit_id: commit.to_string(),
    })
}

/// Handle a delete: a best-effort batch over the given paths.
#[instrument(skip_all, fields(branch = %branch, count = request.paths.len()))]
pub async fn handle_delete(
    pipeline: &MutationPipeline,
    identity: Option<&Actor>,
    branch: &str,
    request: DeleteRequest,
) -> Result<DeleteResponse, ApiError> {
    let actor = require_identity(identity)?;
    if request.paths.is_empty() {
        return Err(ApiError::Validation("no paths to delete".into()));
    }
    let branch = parse_branch(branch)?;
    let paths = request
        .paths
        .iter()
        .map(|p| parse_path(p))
        .collect::<Result<Vec<_>, _>>()?;
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Delete {} file(s)", paths.len()));

    let outcome = pipeline.delete(&branch, &paths, &message, actor).await?;
    Ok(DeleteResponse {
        deleted: outcome.deleted.iter().map(|p| p.to_string()).collect(),
        failed: outcome
            .failed
            .into_iter()
            .map(|f| FailedPath {
                path: f.path.to_string(),
                reason: f.reason,
            })
            .collect(),
    })
}

/// Handle a lock toggle.
#[instrument(skip_all, fields(path = %request.path, desired = request.desired))]
pub async fn handle_lock(
    pipeline: &MutationPipeline,
    identity: Option<&Actor>,
    request: LockRequest,
) -> Result<LockResponse, ApiError> {
    let actor = require_identity(identity)?;
    let path = parse_path(&request.path)?;
    parse_branch(&request.branch)?;

    pipeline.lock(&path, actor, request.desired).await?;
    Ok(LockResponse { ok: true })
}

/// Handle a lock status query.
pub async fn handle_lock_status(
    pipeline: &MutationPipeline,
    identity: Option<&Actor>,
    path: &str,
) -> Result<LockStatusResponse, ApiError> {
    require_identity(identity)?;
    let path = parse_path(path)?;

    let status = pipeline.lock_status(&path).await?;
    Ok(match status {
        LockStatus::Unlocked => LockStatusResponse {
            is_locked: false,
            holder_id: None,
            holder_name: None,
        },
        LockStatus::LockedBy(holder) => LockStatusResponse {
            is_locked: true,
            holder_id: Some(holder.id.to_string()),
            holder_name: Some(holder.name),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RepoId;
    use crate::ledger::MemoryLedger;
    use crate::store::mock::MockStore;
    use std::sync::Arc;

    fn pipeline() -> (MutationPipeline, MockStore) {
        let store = MockStore::with_branch("main");
        let ledger = Arc::new(MemoryLedger::new());
        let pipeline = MutationPipeline::new(Arc::new(store.clone()), ledger, RepoId(1));
        (pipeline, store)
    }

    fn actor() -> Actor {
        Actor::new("u1", "Ada", "ada@example.com")
    }

    fn upload_request(path: &str) -> UploadRequest {
        UploadRequest {
            path: path.into(),
            branch: "main".into(),
            message: "msg".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn upload_without_identity_is_auth_error() {
        let (pipeline, store) = pipeline();
        let err = handle_upload(&pipeline, None, upload_request("a.png"), b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn upload_with_bad_path_is_validation_error() {
        let (pipeline, store) = pipeline();
        let err = handle_upload(
            &pipeline,
            Some(&actor()),
            upload_request("../escape.png"),
            b"x".to_vec(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn upload_succeeds_and_returns_commit_id() {
        let (pipeline, store) = pipeline();
        let response = handle_upload(
            &pipeline,
            Some(&actor()),
            upload_request("a.png"),
            b"bytes".to_vec(),
        )
        .await
        .unwrap();
        assert_eq!(
            store.head("main").unwrap().to_string(),
            response.commit_id
        );
    }

    #[tokio::test]
    async fn delete_with_empty_paths_is_validation_error() {
        let (pipeline, _) = pipeline();
        let err = handle_delete(
            &pipeline,
            Some(&actor()),
            "main",
            DeleteRequest {
                paths: vec![],
                message: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn lock_then_status_roundtrip() {
        let (pipeline, _) = pipeline();
        handle_lock(
            &pipeline,
            Some(&actor()),
            LockRequest {
                path: "a.png".into(),
                branch: "main".into(),
                desired: true,
            },
        )
        .await
        .unwrap();

        let status = handle_lock_status(&pipeline, Some(&actor()), "a.png")
            .await
            .unwrap();
        assert!(status.is_locked);
        assert_eq!(status.holder_id.as_deref(), Some("u1"));
        assert_eq!(status.holder_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn commit_message_composition() {
        assert_eq!(commit_message("msg", None, "fb".into()), "msg");
        assert_eq!(commit_message("", None, "fb".into()), "fb");
        assert_eq!(
            commit_message("msg", Some("long form"), "fb".into()),
            "msg\n\nlong form"
        );
        assert_eq!(commit_message("  ", Some("  "), "fb".into()), "fb");
    }
}
