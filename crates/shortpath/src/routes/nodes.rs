//! Read-only views of the path tree.

use axum::{
    Json,
    extract::{Path, State},
};
use shortpath_common::{Node, NodeId, NodeView, StoreError};

use super::ApiError;
use crate::state::AppState;

fn parse_id(raw: &str) -> Result<NodeId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid id parameter"))
}

fn storage_failure(e: StoreError) -> ApiError {
    tracing::error!(error = %e, "Storage failure in node lookup");
    ApiError::new(e.status_code(), e.to_string())
}

fn views(nodes: Vec<Node>) -> Json<Vec<NodeView>> {
    Json(nodes.into_iter().map(NodeView::from).collect())
}

/// Top-level nodes
pub async fn get_root_nodes(State(state): State<AppState>) -> Result<Json<Vec<NodeView>>, ApiError> {
    let nodes = state.store.list_root_nodes().await.map_err(storage_failure)?;
    Ok(views(nodes))
}

pub async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeView>, ApiError> {
    let id = parse_id(&id)?;
    match state.store.get_node(id).await.map_err(storage_failure)? {
        Some(node) => Ok(Json(node.into())),
        None => Err(ApiError::not_found(format!("Node {id} not found"))),
    }
}

/// Direct children; an unknown parent simply has none
pub async fn get_node_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NodeView>>, ApiError> {
    let id = parse_id(&id)?;
    let nodes = state.store.list_children(id).await.map_err(storage_failure)?;
    Ok(views(nodes))
}
