//! core
//!
//! Core domain types for the write pipeline.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ObjectId, BranchName, RepoPath, Actor, etc.
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Validation happens at construction, never downstream

pub mod types;
