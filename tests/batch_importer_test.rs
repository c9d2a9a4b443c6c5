// ==========================================
// BatchImporter 集成测试
// ==========================================
// 测试目标: 冲突策略语义与连接错误重试
// ==========================================


use async_trait::async_trait;
use graphrag_dgraph_import::domain::category::{DOCUMENT_SPEC, RELATIONSHIP_SPEC};
use graphrag_dgraph_import::domain::{Category, ConflictStrategy, GraphRecord};
use graphrag_dgraph_import::importer::BatchImporter;
use graphrag_dgraph_import::logging;
use graphrag_dgraph_import::repository::{
    GraphStore, Mutation, SqliteGraphStore, StoreBackend, StoreError, StoreResult,
};
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use test_helpers::{create_test_store, uid_of};

fn doc(id: &str, title: &str) -> GraphRecord {
    let mut fields = Map::new();
    fields.insert("id".to_string(), json!(id));
    fields.insert("title".to_string(), json!(title));
    fields.insert("text".to_string(), json!(format!("{} body", title)));
    GraphRecord {
        category: Category::Document,
        id: id.to_string(),
        row_number: 1,
        fields,
    }
}

fn rel(id: &str, source: &str, target: &str) -> GraphRecord {
    let mut fields = Map::new();
    fields.insert("id".to_string(), json!(id));
    fields.insert("source".to_string(), json!(source));
    fields.insert("target".to_string(), json!(target));
    GraphRecord {
        category: Category::Relationship,
        id: id.to_string(),
        row_number: 1,
        fields,
    }
}

fn docs(title: &str) -> Vec<GraphRecord> {
    vec![doc("d1", title), doc("d2", title)]
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    logging::init_test();
    let (_dir, store) = create_test_store().unwrap();
    let importer = BatchImporter::new(&store, ConflictStrategy::Upsert, 0, 1);

    let first = importer.import_batch(&DOCUMENT_SPEC, 1, docs("v1")).await;
    assert_eq!((first.inserted, first.updated), (2, 0));
    assert_eq!(first.written.len(), 2);

    let second = importer.import_batch(&DOCUMENT_SPEC, 2, docs("v2")).await;
    assert_eq!((second.inserted, second.updated), (0, 2));
    assert_eq!(store.count("Document").await.unwrap(), 2);

    let uid = uid_of(&store, "Document", "d1").await.unwrap();
    let body = store.node_body(&uid).unwrap().unwrap();
    assert_eq!(body["title"], json!("v2"));
}

#[tokio::test]
async fn test_insert_duplicates_and_skip_keeps_existing() {
    let (_dir, store) = create_test_store().unwrap();

    let insert = BatchImporter::new(&store, ConflictStrategy::Insert, 0, 1);
    insert.import_batch(&DOCUMENT_SPEC, 1, docs("v1")).await;
    insert.import_batch(&DOCUMENT_SPEC, 2, docs("v1")).await;
    assert_eq!(store.count("Document").await.unwrap(), 4);

    let (_dir2, fresh) = create_test_store().unwrap();
    let skip = BatchImporter::new(&fresh, ConflictStrategy::Skip, 0, 1);
    skip.import_batch(&DOCUMENT_SPEC, 1, docs("v1")).await;
    let outcome = skip
        .import_batch(&DOCUMENT_SPEC, 2, vec![doc("d1", "v2"), doc("d3", "v2")])
        .await;
    assert_eq!((outcome.inserted, outcome.skipped), (1, 1));
    assert_eq!(fresh.count("Document").await.unwrap(), 3);

    let uid = uid_of(&fresh, "Document", "d1").await.unwrap();
    assert_eq!(fresh.node_body(&uid).unwrap().unwrap()["title"], json!("v1"));
}

#[tokio::test]
async fn test_duplicate_ids_within_batch() {
    let (_dir, store) = create_test_store().unwrap();
    let importer = BatchImporter::new(&store, ConflictStrategy::Upsert, 0, 1);

    let outcome = importer
        .import_batch(&DOCUMENT_SPEC, 1, vec![doc("d1", "first"), doc("d1", "last")])
        .await;
    assert_eq!((outcome.inserted, outcome.updated), (1, 1));
    assert_eq!(store.count("Document").await.unwrap(), 1);

    let uid = uid_of(&store, "Document", "d1").await.unwrap();
    assert_eq!(store.node_body(&uid).unwrap().unwrap()["title"], json!("last"));
}

#[tokio::test]
async fn test_skip_treats_same_source_target_as_existing() {
    let (_dir, store) = create_test_store().unwrap();
    let importer = BatchImporter::new(&store, ConflictStrategy::Skip, 0, 1);

    let first = importer
        .import_batch(
            &RELATIONSHIP_SPEC,
            1,
            vec![rel("r1", "ALICE", "BOB"), rel("r2", "BOB", "ACME")],
        )
        .await;
    assert_eq!(first.inserted, 2);

    // 重新生成 id 后再次导入：同一 (source, target) 跳过，交叉组合不算重复
    let rerun = importer
        .import_batch(
            &RELATIONSHIP_SPEC,
            2,
            vec![
                rel("r10", "ALICE", "BOB"),
                rel("r11", "BOB", "ALICE"),
                rel("r12", "ACME", "ALICE"),
                rel("r13", "ACME", "ALICE"),
            ],
        )
        .await;
    assert!(!rerun.is_failed());
    assert_eq!((rerun.inserted, rerun.skipped), (2, 2));
    assert_eq!(store.count("Relationship").await.unwrap(), 4);
    assert!(uid_of(&store, "Relationship", "r10").await.is_none());
    assert!(uid_of(&store, "Relationship", "r13").await.is_none());
}

#[tokio::test]
async fn test_upsert_ignores_composite_key() {
    let (_dir, store) = create_test_store().unwrap();
    let importer = BatchImporter::new(&store, ConflictStrategy::Upsert, 0, 1);

    importer
        .import_batch(&RELATIONSHIP_SPEC, 1, vec![rel("r1", "ALICE", "BOB")])
        .await;
    let outcome = importer
        .import_batch(&RELATIONSHIP_SPEC, 2, vec![rel("r2", "ALICE", "BOB")])
        .await;
    assert_eq!((outcome.inserted, outcome.skipped), (1, 0));
    assert_eq!(store.count("Relationship").await.unwrap(), 2);
}

// ==========================================
// 故障注入存储
// ==========================================

/// 前 failures 次 commit 返回指定错误，其余委托给本地图存储
struct FlakyStore {
    inner: SqliteGraphStore,
    failures: usize,
    retryable: bool,
    commits: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize, retryable: bool) -> Self {
        Self {
            inner: SqliteGraphStore::in_memory().unwrap(),
            failures,
            retryable,
            commits: AtomicUsize::new(0),
        }
    }

    fn attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for FlakyStore {
    fn backend(&self) -> StoreBackend {
        self.inner.backend()
    }

    async fn health(&self) -> StoreResult<()> {
        self.inner.health().await
    }

    async fn alter_schema(&self, schema: &str) -> StoreResult<()> {
        self.inner.alter_schema(schema).await
    }

    async fn drop_all(&self) -> StoreResult<()> {
        self.inner.drop_all().await
    }

    async fn find_uids(
        &self,
        dgraph_type: &str,
        predicate: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, Vec<String>>> {
        self.inner.find_uids(dgraph_type, predicate, keys).await
    }

    async fn commit(&self, mutation: Mutation) -> StoreResult<HashMap<String, String>> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(if self.retryable {
                StoreError::Connectivity("connection reset".to_string())
            } else {
                StoreError::Rejected("schema mismatch".to_string())
            });
        }
        self.inner.commit(mutation).await
    }

    async fn count(&self, dgraph_type: &str) -> StoreResult<usize> {
        self.inner.count(dgraph_type).await
    }

    async fn edges_from(&self, uid: &str, predicate: &str) -> StoreResult<Vec<String>> {
        self.inner.edges_from(uid, predicate).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_connectivity_failure_within_budget_is_transparent() {
    let store = FlakyStore::new(2, true);
    let importer = BatchImporter::new(&store, ConflictStrategy::Upsert, 2, 1);

    let outcome = importer.import_batch(&DOCUMENT_SPEC, 1, docs("v1")).await;
    assert!(!outcome.is_failed());
    assert_eq!(outcome.inserted, 2);
    assert_eq!(store.attempts(), 3);
    assert_eq!(store.count("Document").await.unwrap(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion_fails_whole_batch() {
    let store = FlakyStore::new(10, true);
    let importer = BatchImporter::new(&store, ConflictStrategy::Upsert, 2, 1);

    let outcome = importer.import_batch(&DOCUMENT_SPEC, 1, docs("v1")).await;
    assert!(outcome.is_failed());
    assert_eq!(outcome.failed, 2);
    assert!(outcome.written.is_empty());
    assert!(outcome.error.unwrap().contains("connection reset"));
    assert_eq!(store.attempts(), 3);
    assert_eq!(store.count("Document").await.unwrap(), 0);
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let store = FlakyStore::new(1, false);
    let importer = BatchImporter::new(&store, ConflictStrategy::Insert, 5, 1);

    let outcome = importer.import_batch(&DOCUMENT_SPEC, 1, docs("v1")).await;
    assert_eq!(outcome.failed, 2);
    assert_eq!(store.attempts(), 1);
}
