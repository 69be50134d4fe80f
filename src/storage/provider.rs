use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::btree::Node;
use crate::core::errors::BTreeError;

/// Storage capability that maps opaque node ids to node values.
///
/// Every node the tree touches is materialized through a provider, so a node
/// never holds another node directly: parent and child links are ids that get
/// resolved with [`Provider::load`].
///
/// # Contract
///
/// - `create_node` returns a node that is already resolvable by `load`.
/// - `load` returns the value recorded by the latest `save`/`set_child` for that
///   id. Providers must not serve a snapshot older than the last write.
/// - Any failure aborts the enclosing tree operation as-is. The tree never
///   retries and never rolls back nodes that were already written, so atomicity
///   across several writes has to come from the provider itself.
#[async_trait]
pub trait Provider<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Extract the identity of a node.
    fn get_id(&self, node: &Node<K, V, Self::Id>) -> Result<Self::Id, BTreeError> {
        Ok(node.id().clone())
    }

    /// Allocate a new empty node with the given parent.
    async fn create_node(
        &self,
        parent: Option<&Self::Id>,
    ) -> Result<Node<K, V, Self::Id>, BTreeError>;

    /// Resolve an id to its latest saved value.
    async fn load(&self, id: &Self::Id) -> Result<Node<K, V, Self::Id>, BTreeError>;

    /// Record the current state of a node under its own id.
    async fn save(&self, node: &Node<K, V, Self::Id>) -> Result<(), BTreeError>;

    /// Install `node` as the value located at `child_id`.
    ///
    /// Used for the fresh right sibling produced by a split, before its parent
    /// is written.
    async fn set_child(
        &self,
        child_id: &Self::Id,
        node: &Node<K, V, Self::Id>,
    ) -> Result<(), BTreeError>;
}
