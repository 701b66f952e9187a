//! Node persistence.
//!
//! The link engine only talks to [`NodeStore`] and [`NodeTransaction`].
//! Multi-step writes go through a transaction so that either every staged
//! node and URL assignment lands, or none of them do.

use anyhow::Result;
use async_trait::async_trait;
use shortpath_common::{Node, NodeId, StoreError};
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read access to the path tree plus a unit-of-work entry point.
///
/// Implementations must enforce uniqueness of `(parent, segment)`.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Look up the child `segment` of `parent` (`None` searches top-level nodes)
    async fn find_node(&self, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<Node>>;

    async fn get_node(&self, id: NodeId) -> StoreResult<Option<Node>>;

    /// Top-level nodes, ordered by id
    async fn list_root_nodes(&self) -> StoreResult<Vec<Node>>;

    /// Direct children of `parent`, ordered by id. Unknown parents have no children.
    async fn list_children(&self, parent: NodeId) -> StoreResult<Vec<Node>>;

    /// Start a unit of work
    async fn begin(&self) -> StoreResult<Box<dyn NodeTransaction>>;

    /// Backend health check
    async fn ping(&self) -> StoreResult<()>;
}

/// A unit of work against a [`NodeStore`].
///
/// Writes are only visible to this transaction until [`commit`](Self::commit)
/// succeeds. Dropping the transaction without committing discards them.
#[async_trait]
pub trait NodeTransaction: Send {
    /// Like [`NodeStore::find_node`], but also sees this transaction's staged writes
    async fn find_node(&mut self, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<Node>>;

    /// Stage a new node without a URL
    async fn create_node(&mut self, parent: Option<NodeId>, segment: &str) -> StoreResult<Node>;

    /// Stage a URL assignment
    async fn set_url(&mut self, id: NodeId, url: &str) -> StoreResult<()>;

    /// Apply every staged write atomically. The transaction is spent afterwards.
    async fn commit(&mut self) -> StoreResult<()>;
}

/// Build the configured storage backend
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn NodeStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory node store, links are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url).await?;
            tracing::info!(redis_url = %config.redis_url, "Redis node store connected");
            Ok(Arc::new(store))
        }
    }
}
