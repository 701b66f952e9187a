//! Link registration: walk the tree, creating missing segments on the way.

use shortpath_common::{InsertError, Node, PathError};

use crate::storage::NodeStore;

/// Register `url` under an already validated path.
///
/// Runs as a single unit of work: the intermediate nodes created along the
/// way and the final URL assignment commit together or not at all. An
/// existing target is never overwritten.
pub async fn insert(store: &dyn NodeStore, url: &str, segments: &[String]) -> Result<(), InsertError> {
    if segments.is_empty() {
        return Err(PathError::EmptyPath.into());
    }

    let mut tx = store.begin().await?;
    let mut terminal: Option<Node> = None;

    for segment in segments {
        let parent = terminal.as_ref().map(|node| node.id);
        let node = match tx.find_node(parent, segment).await? {
            Some(node) => node,
            None => tx.create_node(parent, segment).await?,
        };
        terminal = Some(node);
    }

    let Some(node) = terminal else {
        return Err(PathError::EmptyPath.into());
    };

    match node.url.as_deref().filter(|existing| !existing.is_empty()) {
        None => {
            tx.set_url(node.id, url).await?;
            tx.commit().await?;
            tracing::info!(?segments, url = %url, node_id = %node.id, "Link registered");
            Ok(())
        }
        // Dropping `tx` below rolls back; nothing was staged anyway
        Some(existing) if existing == url => Err(InsertError::LinkExists),
        Some(existing) => {
            tracing::debug!(?segments, existing = %existing, requested = %url, "Link points elsewhere");
            Err(InsertError::LinkPointsElsewhere)
        }
    }
}
