use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BTreeConfig;
use crate::core::errors::BTreeError;
use crate::storage::Provider;

/// A `(key, payload)` pair stored in sorted order within a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<K, V> {
    pub key: K,
    pub payload: V,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, payload: V) -> Self {
        Self { key, payload }
    }
}

/// A B-tree node as seen through a [`Provider`].
///
/// Parent and children are ids, not references; they are only resolved by
/// loading them through the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node<K, V, Id> {
    pub(crate) id: Id,
    pub(crate) entries: Vec<Entry<K, V>>,
    pub(crate) children: Vec<Id>,
    pub(crate) parent: Option<Id>,
}

impl<K, V, Id> Node<K, V, Id> {
    /// Empty leaf, as handed out by [`Provider::create_node`].
    pub fn new(id: Id, parent: Option<Id>) -> Self {
        Self {
            id,
            entries: Vec::new(),
            children: Vec::new(),
            parent,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn entries(&self) -> &[Entry<K, V>] {
        &self.entries
    }

    pub fn children(&self) -> &[Id] {
        &self.children
    }

    pub fn parent(&self) -> Option<&Id> {
        self.parent.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of children this node has (or would have, for a leaf).
    pub fn degree(&self) -> usize {
        self.entries.len() + 1
    }

    pub fn is_full(&self, min_degree: usize) -> bool {
        self.degree() == min_degree * 2
    }

    /// Checks that an internal node has exactly one more child than entries.
    pub(crate) fn check_child_count(&self) -> Result<(), BTreeError>
    where
        Id: std::fmt::Debug,
    {
        if !self.is_leaf() && self.children.len() != self.degree() {
            return Err(BTreeError::InvariantViolation(format!(
                "node {:?} has {} entries but {} children",
                self.id,
                self.entries.len(),
                self.children.len()
            )));
        }
        Ok(())
    }
}

/// Inserts into the subtree rooted at `node`, which must not be full.
///
/// Full children are split before descending into them, so every node the
/// loop visits is non-full. Equal keys descend right and land after existing
/// equal entries, which keeps duplicates in insertion order.
pub(crate) async fn insert_non_full<K, V, P>(
    provider: &P,
    config: &BTreeConfig,
    mut node: Node<K, V, P::Id>,
    key: K,
    payload: V,
) -> Result<(), BTreeError>
where
    K: Ord + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    let t = config.min_degree;
    loop {
        if node.is_full(t) {
            return Err(BTreeError::InvariantViolation(format!(
                "insert reached full node {:?}",
                node.id
            )));
        }
        node.check_child_count()?;

        let mut i = node.entries.partition_point(|e| e.key <= key);
        if node.is_leaf() {
            node.entries.insert(i, Entry::new(key, payload));
            return provider.save(&node).await;
        }

        let child = provider.load(&node.children[i]).await?;
        if !child.is_full(t) {
            node = child;
            continue;
        }

        split_child(provider, config, &mut node, i, child).await?;
        if key >= node.entries[i].key {
            i += 1;
        }
        provider.save(&node).await?;
        node = provider.load(&node.children[i]).await?;
    }
}

/// Splits the full child `left` sitting at `parent.children[i]`.
///
/// The child's median entry moves up into `parent` at position `i` and a new
/// right sibling takes the upper half. The child, the sibling and any
/// grandchildren re-parented to the sibling are written here; writing `parent`
/// is left to the caller holding it.
pub(crate) async fn split_child<K, V, P>(
    provider: &P,
    config: &BTreeConfig,
    parent: &mut Node<K, V, P::Id>,
    i: usize,
    mut left: Node<K, V, P::Id>,
) -> Result<(), BTreeError>
where
    K: Ord + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    let t = config.min_degree;
    if !left.is_full(t) {
        return Err(BTreeError::InvariantViolation(format!(
            "split of non-full child {:?} (degree {})",
            left.id,
            left.degree()
        )));
    }
    if parent.children.get(i) != Some(&left.id) {
        return Err(BTreeError::InvariantViolation(format!(
            "child {:?} is not at slot {i} of {:?}",
            left.id, parent.id
        )));
    }

    let mut right = provider.create_node(Some(&parent.id)).await?;
    let right_id = provider.get_id(&right)?;

    right.entries = left.entries.split_off(t);
    let median = left.entries.pop().ok_or_else(|| {
        BTreeError::InvariantViolation(format!("child {:?} lost its median", left.id))
    })?;
    parent.entries.insert(i, median);
    parent.children.insert(i + 1, right_id.clone());

    if !left.is_leaf() {
        right.children = left.children.split_off(t);
        for child_id in &right.children {
            let mut moved = provider.load(child_id).await?;
            moved.parent = Some(right_id.clone());
            provider.save(&moved).await?;
        }
    }

    if config.verify_splits {
        for half in [&left, &right] {
            half.check_child_count()?;
            if half.degree() != t {
                return Err(BTreeError::InvariantViolation(format!(
                    "split left node {:?} with degree {}, expected {t}",
                    half.id,
                    half.degree()
                )));
            }
        }
    }

    provider.save(&left).await?;
    provider.set_child(&right_id, &right).await?;
    debug!(
        parent = ?parent.id,
        left = ?left.id,
        right = ?right_id,
        slot = i,
        "split child"
    );
    Ok(())
}
