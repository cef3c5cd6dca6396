//! api
//!
//! HTTP-boundary request shapes and handlers.
//!
//! # Architecture
//!
//! The HTTP server, session handling, and rendering live outside this
//! crate. What lives here is the contract those layers bind to: typed
//! request/response shapes, fail-fast validation, and the error-to-status
//! mapping (400 invalid input, 401 unauthenticated, 403 lock conflict
//! with the offending paths enumerated, 500 upstream failure).
//!
//! # Modules
//!
//! - [`types`] - Request/response shapes and `ApiError`
//! - [`handlers`] - Validate → authenticate → pipeline → response

pub mod handlers;
pub mod types;

pub use handlers::{handle_delete, handle_lock, handle_lock_status, handle_upload};
pub use types::{
    ApiError, DeleteRequest, DeleteResponse, FailedPath, LockRequest, LockResponse,
    LockStatusResponse, LockedPath, UploadRequest, UploadResponse,
};
