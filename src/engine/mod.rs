//! engine
//!
//! The commit engine: all writes to the version store flow through here.
//!
//! # Architecture
//!
//! Two write shapes exist, with deliberately different semantics:
//!
//! - [`commit::commit_files`] - all-or-nothing. A batch of changes
//!   becomes exactly one commit, or nothing observable happens.
//! - [`delete::delete_files`] - best-effort. Each path succeeds or fails
//!   on its own, and the outcome reports the partition.
//!
//! The engine owns the compare-and-swap rebase loop on the branch ref;
//! callers never touch the ref directly.
//!
//! # Modules
//!
//! - [`commit`] - Atomic batch commits with CAS rebase-and-retry
//! - [`delete`] - Best-effort per-item deletion

pub mod commit;
pub mod delete;

pub use commit::{commit_files, FileChange, MAX_BLOB_CONCURRENCY, MAX_REF_ATTEMPTS};
pub use delete::{delete_files, DeleteFailure, DeleteOutcome, REASON_IS_DIRECTORY};

use thiserror::Error;

use crate::store::StoreError;

/// Errors from commit-engine operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The request was malformed; no remote call was issued.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The branch head kept moving and the CAS retry budget ran out.
    #[error("branch head changed {attempts} times during commit; giving up")]
    RefConflict {
        /// How many compare-and-swap attempts were made.
        attempts: u32,
    },

    /// The remote store failed.
    ///
    /// `ref_mutated` is `true` when the failure happened in the ref
    /// update call itself, where the destructive move may already have
    /// applied on the remote side; `false` means the branch is
    /// guaranteed untouched.
    #[error("upstream store failure (ref mutated: {ref_mutated}): {source}")]
    Upstream {
        /// The underlying store error.
        source: StoreError,
        /// Whether the branch ref may already have moved.
        ref_mutated: bool,
    },
}

impl EngineError {
    /// Wrap a store failure from before the ref update.
    pub(crate) fn before_ref_update(source: StoreError) -> Self {
        EngineError::Upstream {
            source,
            ref_mutated: false,
        }
    }

    /// Wrap a store failure from the ref update itself.
    pub(crate) fn at_ref_update(source: StoreError) -> Self {
        EngineError::Upstream {
            source,
            ref_mutated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        assert_eq!(
            format!("{}", EngineError::Validation("no files".into())),
            "invalid request: no files"
        );
        assert_eq!(
            format!("{}", EngineError::RefConflict { attempts: 3 }),
            "branch head changed 3 times during commit; giving up"
        );
        let upstream = EngineError::Upstream {
            source: StoreError::RateLimited,
            ref_mutated: false,
        };
        assert_eq!(
            format!("{upstream}"),
            "upstream store failure (ref mutated: false): rate limited"
        );
    }
}
