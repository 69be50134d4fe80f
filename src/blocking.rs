//! Synchronous wrappers over the async tree.
//!
//! Each call drives the matching async operation to completion on a private
//! current-thread runtime. Calling these from inside another tokio runtime
//! panics, as `Runtime::block_on` does.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::btree::{BTree, Cursor, Entry, TreeStats};
use crate::config::BTreeConfig;
use crate::core::errors::BTreeError;
use crate::storage::Provider;

pub struct BlockingBTree<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    runtime: Arc<Runtime>,
    inner: BTree<K, V, P>,
}

pub struct BlockingCursor<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    runtime: Arc<Runtime>,
    inner: Cursor<K, V, P>,
}

fn current_thread_runtime() -> Result<Arc<Runtime>, BTreeError> {
    Ok(Arc::new(Builder::new_current_thread().enable_all().build()?))
}

impl<K, V, P> BlockingBTree<K, V, P>
where
    K: Ord + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    pub fn create(config: BTreeConfig, provider: Arc<P>) -> Result<Self, BTreeError> {
        let runtime = current_thread_runtime()?;
        let inner = runtime.block_on(BTree::create(config, provider))?;
        Ok(Self { runtime, inner })
    }

    pub fn open(config: BTreeConfig, provider: Arc<P>, root_id: P::Id) -> Result<Self, BTreeError> {
        let runtime = current_thread_runtime()?;
        let inner = runtime.block_on(BTree::open(config, provider, root_id))?;
        Ok(Self { runtime, inner })
    }

    pub fn inner(&self) -> &BTree<K, V, P> {
        &self.inner
    }

    pub fn root_id(&self) -> &P::Id {
        self.inner.root_id()
    }

    pub fn insert(&mut self, key: K, payload: V) -> Result<(), BTreeError> {
        self.runtime.block_on(self.inner.insert(key, payload))
    }

    pub fn search(&self, key: &K) -> Result<Option<BlockingCursor<K, V, P>>, BTreeError> {
        let found = self.runtime.block_on(self.inner.search(key))?;
        Ok(found.map(|c| self.wrap(c)))
    }

    pub fn search_first(&self, key: &K) -> Result<Option<BlockingCursor<K, V, P>>, BTreeError> {
        let found = self.runtime.block_on(self.inner.search_first(key))?;
        Ok(found.map(|c| self.wrap(c)))
    }

    pub fn search_first_by<Q, F>(
        &self,
        key: &Q,
        transform: F,
    ) -> Result<Option<BlockingCursor<K, V, P>>, BTreeError>
    where
        Q: Ord + Sync,
        F: Fn(&K) -> Q + Send + Sync,
    {
        let found = self
            .runtime
            .block_on(self.inner.search_first_by(key, transform))?;
        Ok(found.map(|c| self.wrap(c)))
    }

    pub fn first(&self) -> Result<Option<BlockingCursor<K, V, P>>, BTreeError> {
        let found = self.runtime.block_on(self.inner.first())?;
        Ok(found.map(|c| self.wrap(c)))
    }

    pub fn verify(&self) -> Result<TreeStats, BTreeError>
    where
        K: Clone,
    {
        self.runtime.block_on(self.inner.verify())
    }

    fn wrap(&self, inner: Cursor<K, V, P>) -> BlockingCursor<K, V, P> {
        BlockingCursor {
            runtime: Arc::clone(&self.runtime),
            inner,
        }
    }
}

impl<K, V, P> BlockingCursor<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    pub fn inner(&self) -> &Cursor<K, V, P> {
        &self.inner
    }

    pub fn get_data(&self) -> Result<Entry<K, V>, BTreeError>
    where
        K: Clone,
        V: Clone,
    {
        self.runtime.block_on(self.inner.get_data())
    }

    pub fn move_next(&self) -> Result<Option<Self>, BTreeError> {
        let next = self.runtime.block_on(self.inner.move_next())?;
        Ok(next.map(|inner| Self {
            runtime: Arc::clone(&self.runtime),
            inner,
        }))
    }
}
