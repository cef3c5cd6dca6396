//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ObjectId`] - Content-addressed object identifier (hex SHA)
//! - [`BranchName`] - Validated branch name
//! - [`RepoPath`] - Validated repository-relative file path
//! - [`RepoId`] - Repository identifier in the metadata store
//! - [`Actor`] - Acting identity for commits, locks, and comments
//! - [`FileId`] / [`EventId`] - Metadata row identifiers
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs: a
//! [`RepoPath`] can never escape the repository root, and an
//! [`ObjectId`] is always lowercase hex of a known digest width.
//!
//! # Examples
//!
//! ```
//! use atelier::core::types::{BranchName, ObjectId, RepoPath};
//!
//! // Valid constructions
//! let branch = BranchName::new("design/q3-refresh").unwrap();
//! let oid = ObjectId::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let path = RepoPath::new("textures/wall.png").unwrap();
//!
//! // Invalid constructions fail at creation time
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(ObjectId::new("not-a-sha").is_err());
//! assert!(RepoPath::new("../escape.png").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid repository path: {0}")]
    InvalidPath(String),
}

/// A content-addressed object identifier.
///
/// Identifies blobs, trees, and commits in the version store. Ids are
/// normalized to lowercase hex; both 40-character (SHA-1) and
/// 64-character (SHA-256) digests are accepted since the remote store's
/// hash function is not ours to choose.
///
/// # Example
///
/// ```
/// use atelier::core::types::ObjectId;
///
/// let oid = ObjectId::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a new validated object id.
    ///
    /// The id is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidObjectId` if the string is not a valid
    /// hex digest of a supported width.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into().to_ascii_lowercase();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get an abbreviated form of the id.
    ///
    /// Returns the first `len` characters; if `len` exceeds the id
    /// length, returns the full id.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(id: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if id.len() != 40 && id.len() != 64 {
            return Err(TypeError::InvalidObjectId(format!(
                "expected 40 or 64 hex characters, got {}",
                id.len()
            )));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidObjectId(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(oid: ObjectId) -> Self {
        oid.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated branch name.
///
/// Branch names must conform to Git's refname rules (see
/// `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use atelier::core::types::BranchName;
///
/// let name = BranchName::new("feature/lighting-pass").unwrap();
/// assert_eq!(name.as_str(), "feature/lighting-pass");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's
    /// refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Validate a branch name against Git's refname rules.
    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }

        if name.starts_with('.') || name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '.' or '-'".into(),
            ));
        }

        if name.ends_with(".lock") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '.lock'".into(),
            ));
        }
        if name.ends_with('/') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '/'".into(),
            ));
        }

        for pattern in ["..", "@{", "//"] {
            if name.contains(pattern) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{pattern}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }

        for c in name.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidBranchName(
                    "branch name cannot contain control characters".into(),
                ));
            }
        }

        // Check each component (split by /) for component-specific rules
        for component in name.split('/') {
            if component.starts_with('.') {
                return Err(TypeError::InvalidBranchName(
                    "path component cannot start with '.'".into(),
                ));
            }
            if component.ends_with(".lock") {
                return Err(TypeError::InvalidBranchName(
                    "path component cannot end with '.lock'".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated repository-relative file path.
///
/// Paths use `/` separators and are relative to the repository root:
/// - Cannot be empty
/// - Cannot start or end with `/`
/// - Cannot contain empty, `.`, or `..` segments
/// - Cannot contain `\`, ASCII control characters, or a NUL byte
///
/// Directory traversal is unrepresentable: a constructed `RepoPath`
/// always addresses something at or below the repository root.
///
/// # Example
///
/// ```
/// use atelier::core::types::RepoPath;
///
/// let path = RepoPath::new("scenes/intro/skybox.psd").unwrap();
/// assert_eq!(path.as_str(), "scenes/intro/skybox.psd");
/// assert_eq!(path.file_name(), "skybox.psd");
///
/// assert!(RepoPath::new("/absolute.png").is_err());
/// assert!(RepoPath::new("a/../b.png").is_err());
/// assert!(RepoPath::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a new validated repository path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if the path is empty, absolute,
    /// or contains traversal or control characters.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> Result<(), TypeError> {
        if path.is_empty() {
            return Err(TypeError::InvalidPath("path cannot be empty".into()));
        }
        if path.starts_with('/') {
            return Err(TypeError::InvalidPath("path cannot be absolute".into()));
        }
        if path.ends_with('/') {
            return Err(TypeError::InvalidPath("path cannot end with '/'".into()));
        }
        if path.contains('\\') {
            return Err(TypeError::InvalidPath(
                "path must use '/' separators".into(),
            ));
        }
        for c in path.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidPath(
                    "path cannot contain control characters".into(),
                ));
            }
        }
        for segment in path.split('/') {
            match segment {
                "" => {
                    return Err(TypeError::InvalidPath(
                        "path cannot contain empty segments".into(),
                    ))
                }
                "." | ".." => {
                    return Err(TypeError::InvalidPath(
                        "path cannot contain '.' or '..' segments".into(),
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The parent directory, or `None` for a top-level path.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(dir, _)| dir)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repository identifier in the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(pub i64);

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a tracked file row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a lock-event row. Higher ids break `created_at` ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an acting user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An acting identity: the author of commits, locks, and comments.
///
/// Resolved by the session layer before any request reaches this crate;
/// nothing here issues or validates credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable user identifier.
    pub id: ActorId,
    /// Display name, used as the commit author name.
    pub name: String,
    /// Email, used as the commit author email.
    pub email: String,
}

impl Actor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: ActorId::new(id),
            name: name.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_normalizes_to_lowercase() {
        let oid = ObjectId::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
        assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
    }

    #[test]
    fn object_id_accepts_sha256_width() {
        let hex64 = "a".repeat(64);
        assert!(ObjectId::new(hex64).is_ok());
    }

    #[test]
    fn object_id_rejects_bad_input() {
        assert!(ObjectId::new("").is_err());
        assert!(ObjectId::new("abc123").is_err());
        assert!(ObjectId::new("g".repeat(40)).is_err());
    }

    #[test]
    fn object_id_short() {
        let oid = ObjectId::new("abc123def4567890abc123def4567890abc12345").unwrap();
        assert_eq!(oid.short(7), "abc123d");
        assert_eq!(oid.short(100), oid.as_str());
    }

    #[test]
    fn branch_name_valid() {
        assert!(BranchName::new("main").is_ok());
        assert!(BranchName::new("feature/lighting-pass").is_ok());
        assert!(BranchName::new("user@feature").is_ok());
    }

    #[test]
    fn branch_name_invalid() {
        assert!(BranchName::new("").is_err());
        assert!(BranchName::new(".hidden").is_err());
        assert!(BranchName::new("-flag").is_err());
        assert!(BranchName::new("a..b").is_err());
        assert!(BranchName::new("ends.lock").is_err());
        assert!(BranchName::new("has space").is_err());
        assert!(BranchName::new("trailing/").is_err());
    }

    #[test]
    fn repo_path_valid() {
        let path = RepoPath::new("scenes/intro/skybox.psd").unwrap();
        assert_eq!(path.file_name(), "skybox.psd");
        assert_eq!(path.parent(), Some("scenes/intro"));

        let top = RepoPath::new("readme.md").unwrap();
        assert_eq!(top.file_name(), "readme.md");
        assert_eq!(top.parent(), None);
    }

    #[test]
    fn repo_path_rejects_traversal() {
        assert!(RepoPath::new("../up.png").is_err());
        assert!(RepoPath::new("a/../b.png").is_err());
        assert!(RepoPath::new("a/./b.png").is_err());
        assert!(RepoPath::new("a//b.png").is_err());
    }

    #[test]
    fn repo_path_rejects_absolute_and_empty() {
        assert!(RepoPath::new("").is_err());
        assert!(RepoPath::new("/rooted.png").is_err());
        assert!(RepoPath::new("dir/").is_err());
        assert!(RepoPath::new("back\\slash.png").is_err());
    }

    #[test]
    fn repo_path_serde_roundtrip() {
        let path = RepoPath::new("textures/wall.png").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"textures/wall.png\"");
        let back: RepoPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn repo_path_serde_rejects_invalid() {
        let result: Result<RepoPath, _> = serde_json::from_str("\"../escape\"");
        assert!(result.is_err());
    }

    #[test]
    fn event_id_orders_numerically() {
        assert!(EventId(10) > EventId(9));
    }

    #[test]
    fn actor_construction() {
        let actor = Actor::new("u1", "Ada", "ada@example.com");
        assert_eq!(actor.id.as_str(), "u1");
        assert_eq!(actor.name, "Ada");
    }
}
