//! End-to-end behaviour of workspaces and resource stores on a local
//! directory.

use std::sync::Arc;

use strata_blob::{BlobStore, FsBlobStore};
use strata_resource::{
    Attributes, BlobStorage, Compression, GraphStore, KeyValueStore, StateManager, VectorStore,
};
use strata_workspace::{Checkpoint, StorageError, Workspace, WorkspaceConfig};

fn fs_store(dir: &tempfile::TempDir) -> Arc<FsBlobStore> {
    Arc::new(FsBlobStore::open(dir.path()).unwrap())
}

async fn open(store: &Arc<FsBlobStore>, retention: usize) -> Arc<Workspace> {
    Workspace::open(store.clone(), "idx", Checkpoint::LIVE, retention)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Persistence across workspaces
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inserted_state_is_visible_to_the_next_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let store = fs_store(&dir);

    let ws = open(&store, 2).await;
    let manager = StateManager::new(ws.clone());
    let mut vectors = VectorStore::new(ws.namespace("docs")).with_compression(Compression::Zstd(3));
    let mut table: KeyValueStore<String> = KeyValueStore::new(ws.namespace("docs"));
    let mut summary: BlobStorage<String> = BlobStorage::new(ws.namespace("docs"));

    manager
        .insert_start(&mut [&mut vectors, &mut table, &mut summary])
        .await
        .unwrap();
    vectors
        .data_mut()
        .unwrap()
        .upsert("chunk-1", vec![0.1, 0.2, 0.3])
        .unwrap();
    let index = table
        .data_mut()
        .unwrap()
        .upsert("chunk-1", "hello world".to_string());
    summary.data_mut().unwrap().set("one chunk".to_string());
    manager
        .insert_done(&mut [&mut vectors, &mut table, &mut summary])
        .await
        .unwrap();
    let saved = ws.save_checkpoint().unwrap();
    assert!(!saved.is_live());
    assert!(store
        .exists(&format!("idx/{saved}/.committed"))
        .await
        .unwrap());
    assert!(ws.close().await.failures == 0);

    let ws = open(&store, 2).await;
    assert_eq!(ws.discovered_checkpoints(), &[saved]);
    let manager = StateManager::new(ws.clone());
    let mut vectors = VectorStore::new(ws.namespace("docs"));
    let mut table: KeyValueStore<String> = KeyValueStore::new(ws.namespace("docs"));
    let mut summary: BlobStorage<String> = BlobStorage::new(ws.namespace("docs"));
    manager
        .query_start(&mut [&mut vectors, &mut table, &mut summary])
        .await
        .unwrap();

    assert_eq!(
        vectors.data().unwrap().get("chunk-1"),
        Some([0.1, 0.2, 0.3].as_slice())
    );
    assert_eq!(table.data().unwrap().index_of("chunk-1"), Some(index));
    assert_eq!(
        summary.data().unwrap().get().map(String::as_str),
        Some("one chunk")
    );
    manager
        .query_done(&mut [&mut vectors, &mut table, &mut summary])
        .await
        .unwrap();
    ws.close().await;
}

#[tokio::test]
async fn live_mode_overwrites_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let store = fs_store(&dir);

    for round in 0..3 {
        let ws = open(&store, 0).await;
        assert_eq!(ws.save_path().unwrap(), "idx");
        let mut graph = GraphStore::new(ws.namespace("kg"));
        graph.insert_start().await.unwrap();
        graph
            .data_mut()
            .unwrap()
            .upsert_node(format!("n{round}"), Attributes::new());
        graph.insert_done().await.unwrap();
        ws.close().await;
    }

    assert_eq!(store.list("idx").await.unwrap(), vec!["idx/kg_graph.bin"]);
    let ws = open(&store, 0).await;
    let mut graph = GraphStore::new(ws.namespace("kg"));
    graph.query_start().await.unwrap();
    assert_eq!(graph.data().unwrap().node_count(), 3);
}

// ---------------------------------------------------------------------------
// Recovery and teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupt_checkpoint_is_skipped_and_marked() {
    let dir = tempfile::tempdir().unwrap();
    let store = fs_store(&dir);
    for cp in [100u64, 200] {
        let ws = open(&store, 0).await;
        let ns = ws.namespace("kg");
        let mut graph = GraphStore::new(ns.clone());
        graph.insert_start().await.unwrap();
        graph
            .data_mut()
            .unwrap()
            .upsert_node(format!("from-{cp}"), Attributes::new());
        graph.insert_done().await.unwrap();
        ws.close().await;
        // Live saves land in the root; move them into a versioned directory.
        store
            .rename("idx/kg_graph.bin", &format!("idx/{cp}/kg_graph.bin"))
            .await
            .unwrap();
        store
            .write(&format!("idx/{cp}/.committed"), b"")
            .await
            .unwrap();
    }
    store.write("idx/200/kg_graph.bin", b"STRA\x01").await.unwrap();

    let ws = open(&store, 1).await;
    let mut graph = GraphStore::new(ws.namespace("kg"));
    StateManager::new(ws.clone())
        .query_start(&mut [&mut graph])
        .await
        .unwrap();
    assert!(graph.data().unwrap().contains_node("from-100"));
    assert_eq!(ws.failed_checkpoints(), vec![Checkpoint::new(200)]);

    let report = ws.close().await;
    assert_eq!(report.marked, vec![Checkpoint::new(200)]);
    assert!(store.exists("idx/0__err_200/kg_graph.bin").await.unwrap());

    let ws = open(&store, 1).await;
    assert_eq!(ws.discovered_checkpoints(), &[Checkpoint::new(100)]);
}

#[tokio::test]
async fn retention_keeps_the_newest_generations() {
    let dir = tempfile::tempdir().unwrap();
    let store = fs_store(&dir);
    for cp in [1u64, 2, 3, 4] {
        store
            .write(&format!("idx/{cp}/kg_graph.bin"), b"x")
            .await
            .unwrap();
    }
    let config = WorkspaceConfig::new("idx").with_retention(1);
    Workspace::scoped(store.clone(), &config, |_ws| async { Ok(()) })
        .await
        .unwrap();

    let ws = open(&store, 1).await;
    assert_eq!(
        ws.discovered_checkpoints(),
        &[Checkpoint::new(4), Checkpoint::new(3)]
    );
    assert!(!dir.path().join("idx").join("1").exists());
}

#[tokio::test]
async fn unrecoverable_root_reports_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let store = fs_store(&dir);
    store.write("idx/5/kg_graph.bin", b"junk").await.unwrap();
    store.write("idx/3/kg_graph.bin", b"junk").await.unwrap();

    let ws = open(&store, 0).await;
    let mut graph = GraphStore::new(ws.namespace("kg"));
    let err = StateManager::new(ws.clone())
        .insert_start(&mut [&mut graph])
        .await
        .unwrap_err();
    match err {
        StorageError::RecoveryExhausted { failed, .. } => {
            assert_eq!(failed, vec![Checkpoint::new(5), Checkpoint::new(3)]);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}
