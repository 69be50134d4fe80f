use std::sync::Arc;

use tempfile::tempdir;

use provtree::{BTree, BTreeConfig, BTreeError, FileProvider, FileProviderConfig, Provider};

#[tokio::test]
async fn tree_survives_reopen_from_disk() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("tree");
    let config = BTreeConfig::new().min_degree(3);

    {
        let provider = Arc::new(
            FileProvider::<String, u64>::open(&dir, FileProviderConfig::new())
                .await
                .unwrap(),
        );
        let mut tree = BTree::create(config.clone(), Arc::clone(&provider))
            .await
            .unwrap();
        for i in 0..200u64 {
            tree.insert(format!("k{i:04}"), i).await.unwrap();
        }
        provider.store_root(*tree.root_id()).await.unwrap();
    }

    let provider = Arc::new(
        FileProvider::<String, u64>::open(&dir, FileProviderConfig::new().sync_on_save(true))
            .await
            .unwrap(),
    );
    let root_id = provider.load_root().await.unwrap().expect("root recorded");
    let mut tree = BTree::open(config, Arc::clone(&provider), root_id)
        .await
        .unwrap();

    let stats = tree.verify().await.unwrap();
    assert_eq!(stats.entry_count, 200);

    let cursor = tree.search(&"k0123".to_string()).await.unwrap().unwrap();
    assert_eq!(cursor.get_data().await.unwrap().payload, 123);

    // New nodes must not collide with the ones already on disk.
    for i in 200..400u64 {
        tree.insert(format!("k{i:04}"), i).await.unwrap();
    }
    assert_eq!(tree.verify().await.unwrap().entry_count, 400);
}

#[tokio::test]
async fn missing_root_is_a_provider_error() {
    let tmp = tempdir().unwrap();
    let provider = Arc::new(
        FileProvider::<u32, u32>::open(tmp.path(), FileProviderConfig::new())
            .await
            .unwrap(),
    );
    assert_eq!(provider.load_root().await.unwrap(), None);

    let err = BTree::<u32, u32, _>::open(BTreeConfig::new(), provider, 77).await.unwrap_err();
    assert!(matches!(err, BTreeError::Provider(_)));
    assert!(err.to_string().contains("node 77 not found"));
}

#[tokio::test]
async fn open_rejects_a_non_root_node() {
    let tmp = tempdir().unwrap();
    let provider = Arc::new(
        FileProvider::<u32, u32>::open(tmp.path(), FileProviderConfig::new())
            .await
            .unwrap(),
    );
    let mut tree = BTree::create(BTreeConfig::new(), Arc::clone(&provider))
        .await
        .unwrap();
    for k in 0..10u32 {
        tree.insert(k, k).await.unwrap();
    }
    let root = provider.load(tree.root_id()).await.unwrap();
    let child = root.children()[0];

    let err = BTree::<u32, u32, _>::open(BTreeConfig::new(), provider, child)
        .await
        .unwrap_err();
    assert!(matches!(err, BTreeError::InvariantViolation(_)));
}
