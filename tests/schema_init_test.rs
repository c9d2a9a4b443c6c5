// ==========================================
// Schema 初始化集成测试
// ==========================================


use async_trait::async_trait;
use graphrag_dgraph_import::importer::ImportError;
use graphrag_dgraph_import::repository::{
    GraphStore, Mutation, SqliteGraphStore, StoreBackend, StoreError, StoreResult,
};
use graphrag_dgraph_import::schema;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use test_helpers::create_test_store;

#[tokio::test]
async fn test_complete_schema_defines_all_types() {
    let (_dir, store) = create_test_store().unwrap();
    schema::initialize(&store, "complete", false).await.unwrap();

    assert_eq!(
        store.schema_types().unwrap(),
        vec![
            "Community",
            "CommunityReport",
            "Document",
            "Entity",
            "Relationship",
            "TextUnit"
        ]
    );
    let predicates = store.schema_predicates().unwrap();
    assert!(predicates
        .iter()
        .any(|(name, decl)| name == "entity_type" && decl == "string @index(exact)"));
    assert!(predicates
        .iter()
        .any(|(name, decl)| name == "community" && decl == "int @index(int)"));
    assert!(!predicates.iter().any(|(name, _)| name == "type"));
}

#[tokio::test]
async fn test_single_category_and_drop_existing() {
    let (_dir, store) = create_test_store().unwrap();
    schema::initialize(&store, "complete", false).await.unwrap();

    schema::initialize(&store, "entity", true).await.unwrap();
    assert_eq!(store.schema_types().unwrap(), vec!["Entity"]);
}

#[tokio::test]
async fn test_unknown_schema_type() {
    let (_dir, store) = create_test_store().unwrap();
    let err = schema::initialize(&store, "covariate", false).await.unwrap_err();
    assert!(matches!(err, ImportError::Schema { .. }));
    assert!(err.to_string().contains("complete"));
    assert!(store.schema_types().unwrap().is_empty());
}

// ===== 拒绝 Entity 类型的存储 =====

struct EntityRejectingStore {
    inner: SqliteGraphStore,
    alters: AtomicUsize,
}

impl EntityRejectingStore {
    fn new() -> Self {
        Self {
            inner: SqliteGraphStore::in_memory().unwrap(),
            alters: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GraphStore for EntityRejectingStore {
    fn backend(&self) -> StoreBackend {
        self.inner.backend()
    }

    async fn health(&self) -> StoreResult<()> {
        self.inner.health().await
    }

    async fn alter_schema(&self, schema: &str) -> StoreResult<()> {
        self.alters.fetch_add(1, Ordering::SeqCst);
        if schema.contains("type Entity {") {
            return Err(StoreError::Rejected(
                "type Entity: unsupported tokenizer".to_string(),
            ));
        }
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
async fn test_complete_schema_failure_applies_nothing_and_names_category() {
    let store = EntityRejectingStore::new();
    let err = schema::initialize(&store, "complete", false)
        .await
        .unwrap_err();

    match &err {
        ImportError::Schema { category, message } => {
            assert_eq!(category, "entity");
            assert!(message.contains("unsupported tokenizer"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("entity"));
    assert_eq!(store.alters.load(Ordering::SeqCst), 1);
    assert!(store.inner.schema_types().unwrap().is_empty());
    assert!(store.inner.schema_predicates().unwrap().is_empty());
}

#[tokio::test]
async fn test_single_category_failure_leaves_other_types_untouched() {
    let store = EntityRejectingStore::new();
    schema::initialize(&store, "document", false).await.unwrap();

    let err = schema::initialize(&store, "entity", false).await.unwrap_err();
    assert!(matches!(err, ImportError::Schema { ref category, .. } if category == "entity"));
    assert_eq!(store.inner.schema_types().unwrap(), vec!["Document"]);
}
