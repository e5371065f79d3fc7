//! Integration tests for the embedding store and conversation memory

use ragbuddy::memory::{ConversationMemory, EmbeddingStore, HashingEmbedder};
use ragbuddy::types::{Chunk, Turn, TurnRole};
use ragbuddy::RagError;
use std::sync::Arc;
use tempfile::TempDir;

fn hashing_store() -> Arc<EmbeddingStore> {
    Arc::new(EmbeddingStore::new(Arc::new(HashingEmbedder::new(64).unwrap())))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_lose_nothing() {
    let store = hashing_store();

    let handles: Vec<_> = (0..16)
        .map(|writer| {
            let store = store.clone();
            tokio::spawn(async move {
                let chunks = (0..5)
                    .map(|i| Chunk::new(format!("writer {} chunk {}", writer, i)))
                    .collect();
                store.add(chunks).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 5);
    }
    assert_eq!(store.len().await, 80);

    let snapshot = store.snapshot().await;
    let mut ids: Vec<_> = snapshot.records.iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_run_alongside_writes() {
    let store = hashing_store();
    store
        .add(vec![Chunk::new("Jupiter is the largest planet")])
        .await
        .unwrap();

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                store
                    .add(vec![Chunk::new(format!("filler document {}", i))])
                    .await
                    .unwrap();
            }
        })
    };
    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                let hits = store.search("largest planet", 1).await.unwrap();
                assert_eq!(hits[0].chunk.text, "Jupiter is the largest planet");
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(store.len().await, 21);
}

#[tokio::test]
async fn test_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index").join("store.json");
    let embedder = Arc::new(HashingEmbedder::new(64).unwrap());

    {
        let store = EmbeddingStore::open(&path, embedder.clone()).await.unwrap();
        assert!(store.is_empty().await);
        store
            .replace_all(vec![
                Chunk::new("Rocky is a golden retriever").with_metadata("source", "dogs"),
                Chunk::new("Bella is a beagle").with_metadata("source", "dogs"),
            ])
            .await
            .unwrap();
        store.save(&path).await.unwrap();
    }

    let reopened = EmbeddingStore::open(&path, embedder).await.unwrap();
    assert_eq!(reopened.len().await, 2);
    let hits = reopened.search("beagle", 1).await.unwrap();
    assert_eq!(hits[0].chunk.text, "Bella is a beagle");
    assert_eq!(
        hits[0].chunk.get("source").and_then(|v| v.as_str()),
        Some("dogs")
    );
}

#[tokio::test]
async fn test_reopen_with_other_model_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    let store = EmbeddingStore::new(Arc::new(HashingEmbedder::new(64).unwrap()));
    store.add(vec![Chunk::new("hello")]).await.unwrap();
    store.save(&path).await.unwrap();

    let err = EmbeddingStore::open(&path, Arc::new(HashingEmbedder::new(32).unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingFailure(_)));
}

#[test]
fn test_sessions_are_isolated() {
    let memory = Arc::new(ConversationMemory::new());

    tokio_test::block_on(async {
        memory
            .append_exchange("alice", Turn::user("my policy is H001"), Turn::assistant("noted"))
            .await;
        memory
            .append_exchange("bob", Turn::user("my policy is H002"), Turn::assistant("ok"))
            .await;
        memory.append("alice", Turn::user("what was it?")).await;

        let alice = memory.recent("alice", 10).await;
        assert_eq!(alice.len(), 3);
        assert!(alice.iter().all(|t| !t.content.contains("H002")));
        assert_eq!(alice[2].role, TurnRole::User);

        memory.clear("alice").await;
        assert_eq!(memory.len("alice").await, 0);
        assert_eq!(memory.len("bob").await, 2);
        assert_eq!(memory.sessions().await, vec!["bob".to_string()]);
    });
}
