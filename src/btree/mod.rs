use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

pub mod cursor;
pub mod node;
mod verify;

pub use cursor::Cursor;
pub use node::{Entry, Node};
pub use verify::TreeStats;

use self::cursor::get_first;
use self::node::{insert_non_full, split_child};
use crate::config::BTreeConfig;
use crate::core::errors::BTreeError;
use crate::storage::Provider;

/// A B-tree with duplicate keys whose nodes are resolved through a [`Provider`].
///
/// Writers must be serialized by the caller (`insert` takes `&mut self`). A
/// reader running while an insert is suspended on the provider can observe a
/// half-finished split.
pub struct BTree<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    config: BTreeConfig,
    provider: Arc<P>,
    root_id: P::Id,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, P> std::fmt::Debug for BTree<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree")
            .field("config", &self.config)
            .field("root_id", &self.root_id)
            .finish()
    }
}

impl<K, V, P> BTree<K, V, P>
where
    K: Ord + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    /// Create an empty tree whose root is a fresh leaf.
    pub async fn create(config: BTreeConfig, provider: Arc<P>) -> Result<Self, BTreeError> {
        config.validate()?;
        let root = provider.create_node(None).await?;
        provider.save(&root).await?;
        let root_id = provider.get_id(&root)?;
        Ok(Self {
            config,
            provider,
            root_id,
            _marker: PhantomData,
        })
    }

    /// Attach to a tree that already lives in `provider`.
    pub async fn open(
        config: BTreeConfig,
        provider: Arc<P>,
        root_id: P::Id,
    ) -> Result<Self, BTreeError> {
        config.validate()?;
        let root = provider.load(&root_id).await?;
        if let Some(parent) = root.parent() {
            return Err(BTreeError::InvariantViolation(format!(
                "root {root_id:?} has parent {parent:?}"
            )));
        }
        Ok(Self {
            config,
            provider,
            root_id,
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn root_id(&self) -> &P::Id {
        &self.root_id
    }

    pub fn min_degree(&self) -> usize {
        self.config.min_degree
    }

    /// Current value of the root node.
    pub async fn root(&self) -> Result<Node<K, V, P::Id>, BTreeError> {
        self.provider.load(&self.root_id).await
    }

    /// Insert an entry. Equal keys are kept, after the entries already present.
    ///
    /// A full root is split first, which is the only way the tree grows taller.
    pub async fn insert(&mut self, key: K, payload: V) -> Result<(), BTreeError> {
        let root = self.provider.load(&self.root_id).await?;
        if !root.is_full(self.config.min_degree) {
            return insert_non_full(self.provider.as_ref(), &self.config, root, key, payload)
                .await;
        }

        let mut new_root = self.provider.create_node(None).await?;
        let new_root_id = self.provider.get_id(&new_root)?;
        let mut old_root = root;
        old_root.parent = Some(new_root_id.clone());
        new_root.children.push(old_root.id.clone());
        self.provider.save(&old_root).await?;
        self.root_id = new_root_id;

        split_child(self.provider.as_ref(), &self.config, &mut new_root, 0, old_root).await?;
        self.provider.save(&new_root).await?;
        debug!(root = ?self.root_id, "grew tree by one level");

        insert_non_full(self.provider.as_ref(), &self.config, new_root, key, payload).await
    }

    /// Find an entry equal to `key`.
    ///
    /// Stops at the first match met on the way down, which is not necessarily
    /// the first of several duplicates; use [`BTree::search_first`] for that.
    pub async fn search(&self, key: &K) -> Result<Option<Cursor<K, V, P>>, BTreeError> {
        let mut node = self.provider.load(&self.root_id).await?;
        loop {
            node.check_child_count()?;
            let i = node.entries.partition_point(|e| e.key < *key);
            if node.entries.get(i).is_some_and(|e| e.key == *key) {
                return Ok(Some(self.cursor(node.id, i)));
            }
            if node.is_leaf() {
                return Ok(None);
            }
            node = self.provider.load(&node.children[i]).await?;
        }
    }

    /// Find the first entry, in order, whose key equals `key`.
    pub async fn search_first(&self, key: &K) -> Result<Option<Cursor<K, V, P>>, BTreeError> {
        self.search_first_map(|k| k.cmp(key)).await
    }

    /// Find the first entry, in order, whose transformed key equals `key`.
    ///
    /// `transform` is applied to every stored key before comparing, which lets
    /// the tree be searched by a derived key (a prefix of a composite key, say).
    /// It has to preserve the order of stored keys; otherwise the descent can
    /// pick the wrong subtree.
    pub async fn search_first_by<Q, F>(
        &self,
        key: &Q,
        transform: F,
    ) -> Result<Option<Cursor<K, V, P>>, BTreeError>
    where
        Q: Ord + Sync,
        F: Fn(&K) -> Q + Send + Sync,
    {
        self.search_first_map(|k| transform(k).cmp(key)).await
    }

    /// The deepest match wins: a match in a child lies left of the separator
    /// that matched above it, so the shallower match is only kept as a
    /// fallback when nothing below matches.
    async fn search_first_map<C>(&self, compare: C) -> Result<Option<Cursor<K, V, P>>, BTreeError>
    where
        C: Fn(&K) -> std::cmp::Ordering + Send + Sync,
    {
        use std::cmp::Ordering::{Equal, Less};

        let mut node = self.provider.load(&self.root_id).await?;
        let mut found = None;
        loop {
            node.check_child_count()?;
            let i = node
                .entries
                .iter()
                .rposition(|e| compare(&e.key) == Less)
                .map_or(0, |last_smaller| last_smaller + 1);
            if node.entries.get(i).is_some_and(|e| compare(&e.key) == Equal) {
                found = Some((node.id.clone(), i));
            }
            if node.is_leaf() {
                return Ok(found.map(|(id, slot)| self.cursor(id, slot)));
            }
            node = self.provider.load(&node.children[i]).await?;
        }
    }

    /// Cursor at the smallest entry, or `None` when the tree is empty.
    pub async fn first(&self) -> Result<Option<Cursor<K, V, P>>, BTreeError> {
        let root = self.provider.load(&self.root_id).await?;
        if root.entries.is_empty() {
            return Ok(None);
        }
        get_first(Arc::clone(&self.provider), root).await.map(Some)
    }

    fn cursor(&self, node_id: P::Id, slot: usize) -> Cursor<K, V, P> {
        Cursor::new(Arc::clone(&self.provider), node_id, slot)
    }
}
