use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::errors::BTreeError;
use crate::storage::Provider;

use super::node::{Entry, Node};

/// A `(node, slot)` position in the tree.
///
/// Nodes have no sibling links, so moving forward climbs through parent ids
/// and descends through child ids, resolving each node through the provider:
///
/// ```text
/// leaf exhausted
///   -> climb until the node we came from is not its parent's last child
///   -> the separator right of that child is next
/// on an internal slot
///   -> descend leftmost into the child right of the slot
/// ```
///
/// A cursor is only valid until the node it points at is changed by a later
/// insert or split. Nothing detects that; keeping cursors and writers apart is
/// up to the caller.
pub struct Cursor<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    provider: Arc<P>,
    node_id: P::Id,
    slot: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, P> Clone for Cursor<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            node_id: self.node_id.clone(),
            slot: self.slot,
            _marker: PhantomData,
        }
    }
}

impl<K, V, P> fmt::Debug for Cursor<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("node_id", &self.node_id)
            .field("slot", &self.slot)
            .finish()
    }
}

impl<K, V, P> Cursor<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    pub(crate) fn new(provider: Arc<P>, node_id: P::Id, slot: usize) -> Self {
        Self {
            provider,
            node_id,
            slot,
            _marker: PhantomData,
        }
    }

    pub fn node_id(&self) -> &P::Id {
        &self.node_id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The entry under the cursor.
    pub async fn get_data(&self) -> Result<Entry<K, V>, BTreeError>
    where
        K: Clone,
        V: Clone,
    {
        let node = self.provider.load(&self.node_id).await?;
        node.entries.get(self.slot).cloned().ok_or_else(|| {
            BTreeError::InvariantViolation(format!(
                "cursor slot {} out of range for node {:?} ({} entries)",
                self.slot,
                self.node_id,
                node.entries.len()
            ))
        })
    }

    /// The in-order successor, or `None` past the last entry.
    pub async fn move_next(&self) -> Result<Option<Self>, BTreeError> {
        let node = self.provider.load(&self.node_id).await?;
        if !node.is_leaf() {
            let child_id = node.children.get(self.slot + 1).ok_or_else(|| {
                BTreeError::InvariantViolation(format!(
                    "cursor slot {} out of range for node {:?}",
                    self.slot, self.node_id
                ))
            })?;
            let child = self.provider.load(child_id).await?;
            return get_first(self.provider.clone(), child).await.map(Some);
        }

        if self.slot + 1 < node.entries.len() {
            return Ok(Some(self.at(node.id, self.slot + 1)));
        }

        let mut current = node;
        while let Some(parent_id) = current.parent.take() {
            let parent = self.provider.load(&parent_id).await?;
            let index = parent
                .children
                .iter()
                .position(|id| *id == current.id)
                .ok_or_else(|| {
                    BTreeError::InvariantViolation(format!(
                        "node {:?} is missing from the children of its parent {:?}",
                        current.id, parent.id
                    ))
                })?;
            if index + 1 < parent.children.len() {
                return Ok(Some(self.at(parent.id, index)));
            }
            current = parent;
        }
        Ok(None)
    }

    fn at(&self, node_id: P::Id, slot: usize) -> Self {
        Self::new(Arc::clone(&self.provider), node_id, slot)
    }
}

/// Cursor at the smallest entry of the subtree rooted at `node`.
pub(crate) async fn get_first<K, V, P>(
    provider: Arc<P>,
    mut node: Node<K, V, P::Id>,
) -> Result<Cursor<K, V, P>, BTreeError>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    while !node.is_leaf() {
        node = provider.load(&node.children[0]).await?;
    }
    Ok(Cursor::new(provider, node.id, 0))
}
