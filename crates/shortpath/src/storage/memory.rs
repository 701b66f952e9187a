//! Process-local node store.
//!
//! Transactions stage their writes and validate them against the committed
//! tables only when they commit (optimistic concurrency). Two units of work
//! racing for the same `(parent, segment)` slot therefore both succeed in
//! staging, and the second one to commit fails with a uniqueness violation.

use async_trait::async_trait;
use shortpath_common::{Node, NodeId, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{NodeStore, NodeTransaction, StoreResult};

type SiblingKey = (Option<NodeId>, String);

#[derive(Default)]
struct Tables {
    /// Ordered by id so listings come out stable
    nodes: BTreeMap<NodeId, Node>,
    /// Uniqueness index over (parent, segment)
    siblings: HashMap<SiblingKey, NodeId>,
}

impl Tables {
    fn find(&self, parent: Option<NodeId>, segment: &str) -> Option<&Node> {
        self.siblings
            .get(&(parent, segment.to_string()))
            .and_then(|id| self.nodes.get(id))
    }

    fn children(&self, parent: Option<NodeId>) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|node| node.parent == parent)
            .cloned()
            .collect()
    }
}

/// In-memory [`NodeStore`]
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    next_id: Arc<AtomicU64>,
    #[cfg(test)]
    faults: Arc<parking_lot::Mutex<Option<usize>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            #[cfg(test)]
            faults: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Let `ops` more operations through, then fail every one after that
    #[cfg(test)]
    pub fn fail_after(&self, ops: usize) {
        *self.faults.lock() = Some(ops);
    }

    #[cfg(test)]
    pub fn heal(&self) {
        *self.faults.lock() = None;
    }

    /// Insert a committed node directly, bypassing the unit of work
    #[cfg(test)]
    pub async fn seed(&self, parent: Option<NodeId>, segment: &str, url: Option<&str>) -> Node {
        let node = Node {
            id: NodeId::new(self.next_id.fetch_add(1, Ordering::Relaxed)),
            parent,
            segment: segment.to_string(),
            url: url.map(str::to_string),
        };
        let mut tables = self.tables.write().await;
        tables
            .siblings
            .insert((parent, node.segment.clone()), node.id);
        tables.nodes.insert(node.id, node.clone());
        node
    }

    /// Every committed node, ordered by id
    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<Node> {
        self.tables.read().await.nodes.values().cloned().collect()
    }

    fn check_fault(&self) -> StoreResult<()> {
        #[cfg(test)]
        {
            let mut faults = self.faults.lock();
            if let Some(remaining) = faults.as_mut() {
                if *remaining == 0 {
                    return Err(StoreError::Backend("injected failure".to_string()));
                }
                *remaining -= 1;
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find_node(&self, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<Node>> {
        self.check_fault()?;
        Ok(self.tables.read().await.find(parent, segment).cloned())
    }

    async fn get_node(&self, id: NodeId) -> StoreResult<Option<Node>> {
        self.check_fault()?;
        Ok(self.tables.read().await.nodes.get(&id).cloned())
    }

    async fn list_root_nodes(&self) -> StoreResult<Vec<Node>> {
        self.check_fault()?;
        Ok(self.tables.read().await.children(None))
    }

    async fn list_children(&self, parent: NodeId) -> StoreResult<Vec<Node>> {
        self.check_fault()?;
        Ok(self.tables.read().await.children(Some(parent)))
    }

    async fn begin(&self) -> StoreResult<Box<dyn NodeTransaction>> {
        self.check_fault()?;
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            created: Vec::new(),
            url_updates: HashMap::new(),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_fault()
    }
}

/// Staged writes of one unit of work
struct MemoryTransaction {
    store: MemoryStore,
    /// New nodes, URL assignments to them are applied in place
    created: Vec<Node>,
    /// URL assignments to nodes that were already committed
    url_updates: HashMap<NodeId, String>,
}

impl MemoryTransaction {
    fn staged(&self, parent: Option<NodeId>, segment: &str) -> Option<&Node> {
        self.created
            .iter()
            .find(|node| node.parent == parent && node.segment == segment)
    }
}

#[async_trait]
impl NodeTransaction for MemoryTransaction {
    async fn find_node(&mut self, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<Node>> {
        self.store.check_fault()?;

        if let Some(node) = self.staged(parent, segment) {
            return Ok(Some(node.clone()));
        }

        let tables = self.store.tables.read().await;
        Ok(tables.find(parent, segment).cloned().map(|mut node| {
            if let Some(url) = self.url_updates.get(&node.id) {
                node.url = Some(url.clone());
            }
            node
        }))
    }

    async fn create_node(&mut self, parent: Option<NodeId>, segment: &str) -> StoreResult<Node> {
        self.store.check_fault()?;

        let taken = self.staged(parent, segment).is_some()
            || self.store.tables.read().await.find(parent, segment).is_some();
        if taken {
            return Err(StoreError::UniqueViolation {
                parent,
                segment: segment.to_string(),
            });
        }

        let node = Node {
            id: NodeId::new(self.store.next_id.fetch_add(1, Ordering::Relaxed)),
            parent,
            segment: segment.to_string(),
            url: None,
        };
        self.created.push(node.clone());
        Ok(node)
    }

    async fn set_url(&mut self, id: NodeId, url: &str) -> StoreResult<()> {
        self.store.check_fault()?;

        if let Some(node) = self.created.iter_mut().find(|node| node.id == id) {
            node.url = Some(url.to_string());
            return Ok(());
        }

        if !self.store.tables.read().await.nodes.contains_key(&id) {
            return Err(StoreError::MissingNode(id));
        }
        self.url_updates.insert(id, url.to_string());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.store.check_fault()?;

        let created = std::mem::take(&mut self.created);
        let url_updates = std::mem::take(&mut self.url_updates);
        let mut tables = self.store.tables.write().await;

        // Validate everything before touching the tables
        for node in &created {
            if tables.find(node.parent, &node.segment).is_some() {
                return Err(StoreError::UniqueViolation {
                    parent: node.parent,
                    segment: node.segment.clone(),
                });
            }
            if let Some(parent) = node.parent {
                let staged_parent = created.iter().any(|n| n.id == parent);
                if !staged_parent && !tables.nodes.contains_key(&parent) {
                    return Err(StoreError::MissingNode(parent));
                }
            }
        }
        for (id, url) in &url_updates {
            match tables.nodes.get(id) {
                None => return Err(StoreError::MissingNode(*id)),
                // Someone else assigned a different target since we looked
                Some(node) if node.has_url() && node.url.as_deref() != Some(url.as_str()) => {
                    return Err(StoreError::Conflict);
                }
                Some(_) => {}
            }
        }

        for node in created {
            tables
                .siblings
                .insert((node.parent, node.segment.clone()), node.id);
            tables.nodes.insert(node.id, node);
        }
        for (id, url) in url_updates {
            if let Some(node) = tables.nodes.get_mut(&id) {
                node.url = Some(url);
            }
        }

        Ok(())
    }
}
