//! Provider failures must surface unchanged from tree operations.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use provtree::{BTree, BTreeConfig, BTreeError, MemoryProvider, Node, Provider, ProviderError};

/// Wraps a memory provider and fails writes once a budget is used up.
#[derive(Default)]
struct FaultyProvider {
    inner: MemoryProvider<u32, u32>,
    writes_left: AtomicUsize,
    fail_loads: AtomicBool,
    calls: parking_lot::Mutex<Vec<&'static str>>,
}

impl FaultyProvider {
    fn with_write_budget(writes: usize) -> Self {
        let provider = Self::default();
        provider.writes_left.store(writes, Ordering::SeqCst);
        provider
    }

    fn spend_write(&self) -> Result<(), BTreeError> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(ProviderError("injected write failure".into()).into());
        }
        self.writes_left.store(left - 1, Ordering::SeqCst);
        Ok(())
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Provider<u32, u32> for FaultyProvider {
    type Id = u64;

    async fn create_node(&self, parent: Option<&u64>) -> Result<Node<u32, u32, u64>, BTreeError> {
        self.record("create_node");
        self.spend_write()?;
        self.inner.create_node(parent).await
    }

    async fn load(&self, id: &u64) -> Result<Node<u32, u32, u64>, BTreeError> {
        self.record("load");
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(ProviderError(format!("injected load failure for {id}")).into());
        }
        self.inner.load(id).await
    }

    async fn save(&self, node: &Node<u32, u32, u64>) -> Result<(), BTreeError> {
        self.record("save");
        self.spend_write()?;
        self.inner.save(node).await
    }

    async fn set_child(&self, child_id: &u64, node: &Node<u32, u32, u64>) -> Result<(), BTreeError> {
        self.record("set_child");
        self.spend_write()?;
        self.inner.set_child(child_id, node).await
    }
}

#[tokio::test]
async fn failed_save_aborts_insert() {
    // create_node + save for the root, then one save for the first insert.
    let provider = Arc::new(FaultyProvider::with_write_budget(3));
    let mut tree = BTree::create(BTreeConfig::new(), Arc::clone(&provider))
        .await
        .unwrap();
    tree.insert(1, 1).await.unwrap();

    let err = tree.insert(2, 2).await.unwrap_err();
    match err {
        BTreeError::Provider(ProviderError(msg)) => assert_eq!(msg, "injected write failure"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_load_aborts_search_and_cursor_moves() {
    let provider = Arc::new(FaultyProvider::with_write_budget(usize::MAX));
    let mut tree = BTree::create(BTreeConfig::new(), Arc::clone(&provider))
        .await
        .unwrap();
    for k in 0..20u32 {
        tree.insert(k, k).await.unwrap();
    }
    let cursor = tree.search(&5).await.unwrap().unwrap();

    provider.fail_loads.store(true, Ordering::SeqCst);
    assert!(matches!(
        tree.search(&5).await.unwrap_err(),
        BTreeError::Provider(_)
    ));
    assert!(matches!(
        tree.search_first(&5).await.unwrap_err(),
        BTreeError::Provider(_)
    ));
    assert!(matches!(
        cursor.move_next().await.unwrap_err(),
        BTreeError::Provider(_)
    ));
    assert!(matches!(
        cursor.get_data().await.unwrap_err(),
        BTreeError::Provider(_)
    ));
}

#[tokio::test]
async fn root_split_touches_provider_in_order() {
    let provider = Arc::new(FaultyProvider::with_write_budget(usize::MAX));
    let mut tree = BTree::create(BTreeConfig::new().min_degree(2), Arc::clone(&provider))
        .await
        .unwrap();
    for k in 0..3u32 {
        tree.insert(k, k).await.unwrap();
    }
    provider.calls.lock().clear();

    tree.insert(3, 3).await.unwrap();

    let calls = provider.calls.lock().clone();
    assert_eq!(
        calls,
        vec![
            "load",        // root, found full
            "create_node", // new root
            "save",        // old root now points at the new root
            "create_node", // right sibling
            "save",        // split child
            "set_child",   // right sibling installed
            "save",        // new root with the promoted separator
            "load",        // right child
            "save",        // leaf insert
        ]
    );
    tree.verify().await.unwrap();
}

#[tokio::test]
async fn write_failure_mid_split_is_not_rolled_back() {
    let provider = Arc::new(FaultyProvider::with_write_budget(usize::MAX));
    let mut tree = BTree::create(BTreeConfig::new().min_degree(2), Arc::clone(&provider))
        .await
        .unwrap();
    for k in 0..3u32 {
        tree.insert(k, k).await.unwrap();
    }
    // Allow the new root and the old-root relink, fail on the sibling.
    provider.writes_left.store(2, Ordering::SeqCst);

    assert!(tree.insert(3, 3).await.is_err());
    let relinked = provider.inner.load(&1).await.unwrap();
    assert!(relinked.parent().is_some());
}
