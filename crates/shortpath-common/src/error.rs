//! Error taxonomy shared by the link engine, the URL checker and storage adapters.

use thiserror::Error;

use crate::types::NodeId;

/// A raw path string was rejected before touching storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    EmptyPath,

    #[error("path is too long")]
    PathTooLong,

    #[error("path may only contain lowercase letters, digits, '-' and '/'")]
    InvalidPathChars,

    #[error("path has too many segments")]
    TooManyPathSegments,

    #[error("path segment is too long")]
    SegmentTooLong,

    #[error("path starts with a reserved prefix")]
    InvalidPrefix,
}

impl PathError {
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// Storage adapter failures.
///
/// These are opaque to callers of the link engine: they are reported,
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another node already occupies this (parent, segment) slot
    #[error("segment '{segment}' already exists under parent {parent:?}")]
    UniqueViolation {
        parent: Option<NodeId>,
        segment: String,
    },

    /// A concurrent unit of work touched the same records first
    #[error("concurrent modification, transaction aborted")]
    Conflict,

    /// A write referenced a node that is not stored
    #[error("node {0} does not exist")]
    MissingNode(NodeId),

    /// Backend connection/operation error
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn status_code(&self) -> u16 {
        500
    }
}

/// Resolving a path to its redirect target failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Some segment along the walk has no node
    #[error("link not found")]
    LinkNotFound,

    /// The path exists but its terminal node carries no target
    #[error("no redirect URL registered for this path")]
    EmptyRedirectUrl,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ResolveError {
    /// Everything but a storage failure is a plain 404 for visitors
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Storage(_) => 500,
            _ => 404,
        }
    }
}

/// Registering a new path failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// The path already points at the very same URL
    #[error("Link already exists")]
    LinkExists,

    /// The path already points at a different URL
    #[error("Link points elsewhere")]
    LinkPointsElsewhere,

    #[error("{0}")]
    Storage(#[from] StoreError),
}

impl InsertError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidPath(e) => e.status_code(),
            Self::LinkExists | Self::LinkPointsElsewhere => 409,
            Self::Storage(e) => e.status_code(),
        }
    }

    /// Conflicts are terminal outcomes, not failures of the service
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::LinkExists | Self::LinkPointsElsewhere)
    }
}

/// A submitted redirect target did not pass the liveness check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Unparsable, or points back at this service
    #[error("link is not allowed")]
    InvalidLink,

    #[error("link responded with status code {0}")]
    UrlStatusCode(u16),

    #[error("link redirects elsewhere")]
    UrlRedirects,

    #[error("link did not respond in time")]
    UrlTimeout,

    #[error("link is unreachable: {0}")]
    Unreachable(String),
}

impl UrlError {
    pub fn status_code(&self) -> u16 {
        400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_variants_stay_distinct() {
        assert_ne!(ResolveError::LinkNotFound, ResolveError::EmptyRedirectUrl);
        assert_eq!(ResolveError::LinkNotFound.status_code(), 404);
        assert_eq!(ResolveError::EmptyRedirectUrl.status_code(), 404);
        assert_eq!(ResolveError::from(StoreError::Conflict).status_code(), 500);
    }

    #[test]
    fn test_insert_status_codes() {
        assert_eq!(InsertError::LinkExists.status_code(), 409);
        assert_eq!(InsertError::LinkPointsElsewhere.status_code(), 409);
        assert_eq!(InsertError::from(PathError::EmptyPath).status_code(), 400);
        assert_eq!(
            InsertError::from(StoreError::Backend("down".into())).status_code(),
            500
        );
        assert!(InsertError::LinkExists.is_conflict());
        assert!(!InsertError::from(StoreError::Conflict).is_conflict());
    }
}
