//! Path resolution: walk the tree one segment at a time.

use shortpath_common::{Node, PathError, ResolveError};

use crate::storage::NodeStore;

/// Find the redirect target of an already validated path.
///
/// Stops at the first missing segment. A path that exists but ends on a
/// node without a target is reported separately from a missing one.
pub async fn resolve(store: &dyn NodeStore, segments: &[String]) -> Result<String, ResolveError> {
    if segments.is_empty() {
        return Err(PathError::EmptyPath.into());
    }

    let mut current: Option<Node> = None;
    for segment in segments {
        let parent = current.as_ref().map(|node| node.id);
        match store.find_node(parent, segment).await? {
            Some(node) => current = Some(node),
            None => {
                tracing::debug!(?segments, missing = %segment, "Link not found");
                return Err(ResolveError::LinkNotFound);
            }
        }
    }

    match current.and_then(|node| node.url).filter(|url| !url.is_empty()) {
        Some(url) => Ok(url),
        None => {
            tracing::debug!(?segments, "Path exists but has no redirect URL");
            Err(ResolveError::EmptyRedirectUrl)
        }
    }
}
