use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::btree::Node;
use crate::core::errors::{BTreeError, ProviderError};

use super::Provider;

/// In-memory node arena keyed by `u64` ids.
///
/// `load` hands out clones, so a node changed by the caller is only visible to
/// other readers once it has been saved back.
#[derive(Debug)]
pub struct MemoryProvider<K, V> {
    nodes: Mutex<HashMap<u64, Node<K, V, u64>>>,
    next_id: AtomicU64,
}

impl<K, V> Default for MemoryProvider<K, V> {
    fn default() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<K, V> MemoryProvider<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.nodes.lock().contains_key(&id)
    }
}

fn missing_node(id: u64) -> BTreeError {
    ProviderError(format!("node {id} not found")).into()
}

#[async_trait]
impl<K, V> Provider<K, V> for MemoryProvider<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Id = u64;

    async fn create_node(&self, parent: Option<&u64>) -> Result<Node<K, V, u64>, BTreeError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let node = Node::new(id, parent.copied());
        self.nodes.lock().insert(id, node.clone());
        Ok(node)
    }

    async fn load(&self, id: &u64) -> Result<Node<K, V, u64>, BTreeError> {
        self.nodes
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| missing_node(*id))
    }

    async fn save(&self, node: &Node<K, V, u64>) -> Result<(), BTreeError> {
        let mut nodes = self.nodes.lock();
        let slot = nodes.get_mut(&node.id).ok_or_else(|| missing_node(node.id))?;
        *slot = node.clone();
        Ok(())
    }

    async fn set_child(&self, child_id: &u64, node: &Node<K, V, u64>) -> Result<(), BTreeError> {
        if *child_id != node.id {
            return Err(ProviderError(format!(
                "cannot install node {} at slot of node {child_id}",
                node.id
            ))
            .into());
        }
        self.nodes.lock().insert(*child_id, node.clone());
        Ok(())
    }
}
