//! Redis-backed node store.
//!
//! Layout:
//! - `shortpath:node:{id}` hash with `parent`, `segment`, `url` (empty string = absent)
//! - `shortpath:children:{id|root}` hash mapping segment -> child id
//! - `shortpath:next_node_id` id counter
//!
//! Transactions run on a dedicated connection, WATCH every key they read and
//! commit through MULTI/EXEC. An aborted EXEC means another writer got there
//! first and surfaces as [`StoreError::Conflict`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionLike, ConnectionManager, MultiplexedConnection};
use shortpath_common::constants::redis_keys;
use shortpath_common::{Node, NodeId, StoreError};
use std::collections::{HashMap, HashSet};

use super::{NodeStore, NodeTransaction, StoreResult};

/// Node store persisted in Redis
pub struct RedisStore {
    client: redis::Client,
    /// Shared auto-reconnecting connection for plain reads
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client.clone())
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { client, conn })
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn node_key(id: NodeId) -> String {
    format!("{}{}", redis_keys::NODE_PREFIX, id)
}

fn children_key(parent: Option<NodeId>) -> String {
    match parent {
        Some(id) => format!("{}{}", redis_keys::CHILDREN_PREFIX, id),
        None => redis_keys::ROOT_CHILDREN.to_string(),
    }
}

fn encode_node(node: &Node) -> [(&'static str, String); 3] {
    [
        ("parent", node.parent.map(|p| p.to_string()).unwrap_or_default()),
        ("segment", node.segment.clone()),
        ("url", node.url.clone().unwrap_or_default()),
    ]
}

fn decode_node(id: NodeId, mut fields: HashMap<String, String>) -> StoreResult<Option<Node>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let segment = fields
        .remove("segment")
        .ok_or_else(|| StoreError::Backend(format!("node {id} has no segment")))?;

    let parent = match fields.remove("parent").as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<NodeId>()
                .map_err(|e| StoreError::Backend(format!("node {id} has a corrupt parent: {e}")))?,
        ),
    };

    let url = fields.remove("url").filter(|url| !url.is_empty());

    Ok(Some(Node {
        id,
        parent,
        segment,
        url,
    }))
}

async fn fetch_node<C>(conn: &mut C, id: NodeId) -> StoreResult<Option<Node>>
where
    C: ConnectionLike + Send,
{
    let fields: HashMap<String, String> = conn.hgetall(node_key(id)).await.map_err(backend)?;
    decode_node(id, fields)
}

async fn lookup_child<C>(conn: &mut C, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<NodeId>>
where
    C: ConnectionLike + Send,
{
    let id: Option<u64> = conn
        .hget(children_key(parent), segment)
        .await
        .map_err(backend)?;
    Ok(id.map(NodeId::new))
}

async fn fetch_children<C>(conn: &mut C, parent: Option<NodeId>) -> StoreResult<Vec<Node>>
where
    C: ConnectionLike + Send,
{
    let index: HashMap<String, u64> = conn.hgetall(children_key(parent)).await.map_err(backend)?;

    let mut ids: Vec<NodeId> = index.into_values().map(NodeId::new).collect();
    ids.sort();

    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        // An index entry without a record is skipped rather than failing the listing
        match fetch_node(conn, id).await? {
            Some(node) => nodes.push(node),
            None => tracing::warn!(node_id = %id, "Sibling index points at a missing node"),
        }
    }
    Ok(nodes)
}

#[async_trait]
impl NodeStore for RedisStore {
    async fn find_node(&self, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<Node>> {
        let mut conn = self.conn.clone();
        match lookup_child(&mut conn, parent, segment).await? {
            Some(id) => fetch_node(&mut conn, id).await,
            None => Ok(None),
        }
    }

    async fn get_node(&self, id: NodeId) -> StoreResult<Option<Node>> {
        let mut conn = self.conn.clone();
        fetch_node(&mut conn, id).await
    }

    async fn list_root_nodes(&self) -> StoreResult<Vec<Node>> {
        let mut conn = self.conn.clone();
        fetch_children(&mut conn, None).await
    }

    async fn list_children(&self, parent: NodeId) -> StoreResult<Vec<Node>> {
        let mut conn = self.conn.clone();
        fetch_children(&mut conn, Some(parent)).await
    }

    /// Opens a dedicated connection for the unit of work.
    ///
    /// WATCH state lives on the connection, so the shared manager cannot be
    /// used here. The connection closes when the transaction is dropped, so
    /// each in-flight link submission holds exactly one extra socket.
    async fn begin(&self) -> StoreResult<Box<dyn NodeTransaction>> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;

        Ok(Box::new(RedisTransaction {
            conn,
            watched: HashSet::new(),
            created: Vec::new(),
            url_updates: HashMap::new(),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

struct RedisTransaction {
    conn: MultiplexedConnection,
    watched: HashSet<String>,
    created: Vec<Node>,
    url_updates: HashMap<NodeId, String>,
}

impl RedisTransaction {
    async fn watch(&mut self, key: String) -> StoreResult<()> {
        if self.watched.contains(&key) {
            return Ok(());
        }
        let _: () = redis::cmd("WATCH")
            .arg(&key)
            .query_async(&mut self.conn)
            .await
            .map_err(backend)?;
        self.watched.insert(key);
        Ok(())
    }

    fn staged(&self, parent: Option<NodeId>, segment: &str) -> Option<&Node> {
        self.created
            .iter()
            .find(|node| node.parent == parent && node.segment == segment)
    }
}

#[async_trait]
impl NodeTransaction for RedisTransaction {
    async fn find_node(&mut self, parent: Option<NodeId>, segment: &str) -> StoreResult<Option<Node>> {
        if let Some(node) = self.staged(parent, segment) {
            return Ok(Some(node.clone()));
        }

        self.watch(children_key(parent)).await?;
        let Some(id) = lookup_child(&mut self.conn, parent, segment).await? else {
            return Ok(None);
        };

        self.watch(node_key(id)).await?;
        let node = fetch_node(&mut self.conn, id).await?;
        Ok(node.map(|mut node| {
            if let Some(url) = self.url_updates.get(&node.id) {
                node.url = Some(url.clone());
            }
            node
        }))
    }

    async fn create_node(&mut self, parent: Option<NodeId>, segment: &str) -> StoreResult<Node> {
        let violation = || StoreError::UniqueViolation {
            parent,
            segment: segment.to_string(),
        };

        if self.staged(parent, segment).is_some() {
            return Err(violation());
        }

        self.watch(children_key(parent)).await?;
        if lookup_child(&mut self.conn, parent, segment).await?.is_some() {
            return Err(violation());
        }

        // Ids burnt by rolled back transactions are simply skipped
        let id: u64 = self
            .conn
            .incr(redis_keys::NEXT_NODE_ID, 1)
            .await
            .map_err(backend)?;

        let node = Node {
            id: NodeId::new(id),
            parent,
            segment: segment.to_string(),
            url: None,
        };
        self.created.push(node.clone());
        Ok(node)
    }

    async fn set_url(&mut self, id: NodeId, url: &str) -> StoreResult<()> {
        if let Some(node) = self.created.iter_mut().find(|node| node.id == id) {
            node.url = Some(url.to_string());
            return Ok(());
        }

        self.watch(node_key(id)).await?;
        if fetch_node(&mut self.conn, id).await?.is_none() {
            return Err(StoreError::MissingNode(id));
        }
        self.url_updates.insert(id, url.to_string());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let created = std::mem::take(&mut self.created);
        let url_updates = std::mem::take(&mut self.url_updates);

        if created.is_empty() && url_updates.is_empty() {
            let _: () = redis::cmd("UNWATCH")
                .query_async(&mut self.conn)
                .await
                .map_err(backend)?;
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for node in &created {
            pipe.hset_multiple(node_key(node.id), &encode_node(node)).ignore();
            pipe.hset(children_key(node.parent), &node.segment, node.id.value())
                .ignore();
        }
        for (id, url) in &url_updates {
            pipe.hset(node_key(*id), "url", url).ignore();
        }

        // EXEC replies nil when a watched key changed underneath us
        let applied: Option<()> = pipe.query_async(&mut self.conn).await.map_err(backend)?;
        match applied {
            Some(()) => Ok(()),
            None => {
                tracing::warn!(
                    created = created.len(),
                    url_updates = url_updates.len(),
                    "Redis transaction aborted by concurrent writer"
                );
                Err(StoreError::Conflict)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(node_key(NodeId::new(7)), "shortpath:node:7");
        assert_eq!(children_key(Some(NodeId::new(7))), "shortpath:children:7");
        assert_eq!(children_key(None), "shortpath:children:root");
    }

    #[test]
    fn test_encode_decode_node() {
        let node = Node {
            id: NodeId::new(3),
            parent: Some(NodeId::new(1)),
            segment: "bar".to_string(),
            url: None,
        };

        let fields: HashMap<String, String> = encode_node(&node)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(fields["url"], "");

        assert_eq!(decode_node(node.id, fields).unwrap(), Some(node));
    }

    #[test]
    fn test_decode_missing_and_corrupt() {
        assert_eq!(decode_node(NodeId::new(1), HashMap::new()).unwrap(), None);

        let corrupt = HashMap::from([
            ("segment".to_string(), "foo".to_string()),
            ("parent".to_string(), "not-a-number".to_string()),
        ]);
        assert!(matches!(
            decode_node(NodeId::new(1), corrupt),
            Err(StoreError::Backend(_))
        ));
    }

    /// Needs a disposable Redis instance: `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_live_unit_of_work() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let store = RedisStore::connect(&url).await.unwrap();
        store.ping().await.unwrap();

        let segment = format!("it-{}", std::process::id());

        let mut tx = store.begin().await.unwrap();
        let root = tx.create_node(None, &segment).await.unwrap();
        let leaf = tx.create_node(Some(root.id), "leaf").await.unwrap();
        tx.set_url(leaf.id, "https://example.com/").await.unwrap();
        tx.commit().await.unwrap();

        let found = store.find_node(Some(root.id), "leaf").await.unwrap().unwrap();
        assert_eq!(found.url.as_deref(), Some("https://example.com/"));
        assert_eq!(store.list_children(root.id).await.unwrap(), vec![found]);

        // A second writer racing on the same slot loses at EXEC time
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.create_node(Some(root.id), "race").await.unwrap();
        second.create_node(Some(root.id), "race").await.unwrap();
        first.commit().await.unwrap();
        assert_eq!(second.commit().await.unwrap_err(), StoreError::Conflict);
    }
}
