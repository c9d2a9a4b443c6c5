// ==========================================
// 导入流程端到端测试
// ==========================================
// 测试目标: run_import 在本地图存储上的完整行为
// - 依赖顺序与引用边
// - 缺失文件 / 格式错误 / fail-fast
// ==========================================


use async_trait::async_trait;
use graphrag_dgraph_import::config::{CategorySelection, ImportConfig};
use graphrag_dgraph_import::domain::{Category, CategoryState, GraphRecord};
use graphrag_dgraph_import::importer::{
    ImportError, ImportOrchestrator, ImportResult, PostProcessReport, PostProcessor,
};
use graphrag_dgraph_import::logging;
use graphrag_dgraph_import::repository::GraphStore;
use graphrag_dgraph_import::run_import;
use std::path::Path;
use test_helpers::*;

fn config_for(dir: &Path, categories: &[&str]) -> ImportConfig {
    ImportConfig {
        data_dir: dir.to_path_buf(),
        categories: CategorySelection::parse(categories).unwrap(),
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_import_links_every_category() {
    logging::init_test();
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_full_output(data.path()).unwrap();

    let report = run_import(&store, &config_for(data.path(), &["all"])).await.unwrap();
    assert!(!report.has_failures(), "{:?}", report.summary_lines());
    for category in Category::ORDER {
        assert_eq!(report.get(category).unwrap().state, CategoryState::Done);
    }
    assert_eq!(store.count("Document").await.unwrap(), 2);
    assert_eq!(store.count("TextUnit").await.unwrap(), 3);

    // text_unit → document 及反向边
    let text_units = report.get(Category::TextUnit).unwrap();
    assert_eq!(text_units.inserted, 3);
    assert_eq!(text_units.edges_created, 6);
    assert_eq!(text_units.unresolved_references, 0);

    let d1 = uid_of(&store, "Document", "d1").await.unwrap();
    let t1 = uid_of(&store, "TextUnit", "t1").await.unwrap();
    let t2 = uid_of(&store, "TextUnit", "t2").await.unwrap();
    let mut linked = store.edges_from(&d1, "text_units").await.unwrap();
    linked.sort();
    let mut expected = vec![t1.clone(), t2];
    expected.sort();
    assert_eq!(linked, expected);
    assert_eq!(store.edges_from(&t1, "documents").await.unwrap(), vec![d1]);

    // 关系端点按 title 解析
    let r1 = uid_of(&store, "Relationship", "r1").await.unwrap();
    let e1 = uid_of(&store, "Entity", "e1").await.unwrap();
    let e2 = uid_of(&store, "Entity", "e2").await.unwrap();
    assert_eq!(store.edges_from(&r1, "source_entity").await.unwrap(), vec![e1.clone()]);
    assert_eq!(store.edges_from(&r1, "target_entity").await.unwrap(), vec![e2.clone()]);
    assert_eq!(store.edges_from(&e1, "related_entities").await.unwrap(), vec![e2]);
    assert_eq!(report.get(Category::Relationship).unwrap().unresolved_references, 0);

    // 社区层级
    let c0 = uid_of(&store, "Community", "c0").await.unwrap();
    let c1 = uid_of(&store, "Community", "c1").await.unwrap();
    assert_eq!(store.edges_from(&c1, "parent_community").await.unwrap(), vec![c0.clone()]);
    assert_eq!(store.edges_from(&c0, "child_communities").await.unwrap(), vec![c1.clone()]);
    assert_eq!(store.edges_from(&c0, "entities").await.unwrap().len(), 3);

    // 报告 → 社区（按编号）
    let cr1 = uid_of(&store, "CommunityReport", "cr1").await.unwrap();
    assert_eq!(store.edges_from(&cr1, "community_rel").await.unwrap(), vec![c1.clone()]);
    assert_eq!(store.edges_from(&c1, "reports").await.unwrap(), vec![cr1]);
}

#[tokio::test]
async fn test_rerun_with_upsert_does_not_duplicate() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_full_output(data.path()).unwrap();
    let config = config_for(data.path(), &["all"]);

    run_import(&store, &config).await.unwrap();
    let second = run_import(&store, &config).await.unwrap();

    assert!(!second.has_failures());
    let entities = second.get(Category::Entity).unwrap();
    assert_eq!((entities.inserted, entities.updated), (0, 3));
    assert_eq!(store.count("Entity").await.unwrap(), 3);
    assert_eq!(store.count("Community").await.unwrap(), 2);
}

#[tokio::test]
async fn test_relationships_without_entities_are_unresolved() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_relationships(data.path()).unwrap();

    let report = run_import(&store, &config_for(data.path(), &["relationship"]))
        .await
        .unwrap();
    let relationships = report.get(Category::Relationship).unwrap();
    assert_eq!(relationships.state, CategoryState::Done);
    assert_eq!(relationships.inserted, 2);
    assert_eq!(relationships.edges_created, 0);
    // 4 个端点 + 2 个 text_unit 引用
    assert_eq!(relationships.unresolved_references, 6);
    assert_eq!(store.count("Relationship").await.unwrap(), 2);
}

#[tokio::test]
async fn test_reports_without_communities_are_unresolved_not_fatal() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_community_reports(data.path()).unwrap();

    let report = run_import(&store, &config_for(data.path(), &["community_report"]))
        .await
        .unwrap();
    assert!(!report.has_failures(), "{:?}", report.summary_lines());
    let reports = report.get(Category::CommunityReport).unwrap();
    assert_eq!(reports.state, CategoryState::Done);
    assert_eq!(reports.inserted, 1);
    assert_eq!(reports.edges_created, 0);
    // community 1 + 实体 e1 / e2
    assert_eq!(reports.unresolved_references, 3);
    assert_eq!(store.count("CommunityReport").await.unwrap(), 1);
}

/// 后处理阶段存储写入失败
struct RefusingLinker;

#[async_trait]
impl PostProcessor for RefusingLinker {
    fn name(&self) -> &'static str {
        "refusing_linker"
    }

    fn applies_to(&self, category: Category) -> bool {
        category == Category::Document
    }

    async fn process(
        &self,
        _store: &dyn GraphStore,
        _category: Category,
        _written: &[(GraphRecord, String)],
    ) -> ImportResult<PostProcessReport> {
        Err(ImportError::Store("edge write refused".to_string()))
    }
}

#[tokio::test]
async fn test_post_processor_error_fails_category() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_documents(data.path()).unwrap();
    write_text_units(data.path()).unwrap();

    let mut config = config_for(data.path(), &["all"]);
    config.fail_fast = true;
    let report = ImportOrchestrator::new(&store, &config)
        .with_processors(vec![Box::new(RefusingLinker)])
        .run()
        .await
        .unwrap();

    let documents = report.get(Category::Document).unwrap();
    assert_eq!(documents.state, CategoryState::Failed);
    assert_eq!(documents.inserted, 2);
    assert!(documents
        .errors
        .iter()
        .any(|e| e.contains("refusing_linker") && e.contains("edge write refused")));
    assert!(report.has_failures());

    // fail-fast 在 all 下中止后续类别
    assert!(report.halted_by_fail_fast);
    assert_eq!(report.get(Category::TextUnit).unwrap().state, CategoryState::Pending);
    assert_eq!(store.count("TextUnit").await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_source_file() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_documents(data.path()).unwrap();

    // 显式请求 → failed
    let report = run_import(&store, &config_for(data.path(), &["entity", "document"]))
        .await
        .unwrap();
    assert_eq!(report.get(Category::Document).unwrap().state, CategoryState::Done);
    let entities = report.get(Category::Entity).unwrap();
    assert_eq!(entities.state, CategoryState::Failed);
    assert!(entities.missing_source);
    assert!(report.has_failures());

    // all → 空类别视为完成
    let report = run_import(&store, &config_for(data.path(), &["all"])).await.unwrap();
    assert!(!report.has_failures());
    assert!(report.get(Category::Community).unwrap().missing_source);
    assert_eq!(report.get(Category::Community).unwrap().state, CategoryState::Done);
}

#[tokio::test]
async fn test_format_error_keeps_reading_other_files() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_csv(data.path(), "a_documents.csv", &["id,text", "dx,no title column"]).unwrap();
    write_csv(
        data.path(),
        "b_documents.csv",
        &["id,title,text", "d1,One,first", "d2,,second", "d3,Three,third"],
    )
    .unwrap();

    let report = run_import(&store, &config_for(data.path(), &["document"]))
        .await
        .unwrap();
    let documents = report.get(Category::Document).unwrap();
    assert_eq!(documents.state, CategoryState::Failed);
    assert_eq!(documents.files.len(), 2);
    assert_eq!(documents.inserted, 2);
    // d2 缺少 title
    assert_eq!(documents.failed, 1);
    assert!(documents.errors.iter().any(|e| e.contains("title")));
    assert_eq!(store.count("Document").await.unwrap(), 2);
}

#[tokio::test]
async fn test_validation_failures_do_not_fail_category() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_csv(
        data.path(),
        "text_units.csv",
        &["id,text,n_tokens", "t1,hello,12", "t2,,3", "t3,world,abc"],
    )
    .unwrap();

    let report = run_import(&store, &config_for(data.path(), &["text_unit"]))
        .await
        .unwrap();
    let text_units = report.get(Category::TextUnit).unwrap();
    assert_eq!(text_units.state, CategoryState::Done);
    assert_eq!(text_units.rows_read, 3);
    assert_eq!(text_units.inserted, 2);
    assert_eq!(text_units.failed, 1);
    assert_eq!(text_units.errors.len(), 1);
}

#[tokio::test]
async fn test_fail_fast_only_applies_to_all() {
    let (_db, store) = create_test_store().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_csv(data.path(), "documents.parquet", &["this is not parquet"]).unwrap();
    write_text_units(data.path()).unwrap();

    let mut config = config_for(data.path(), &["all"]);
    config.fail_fast = true;
    let report = run_import(&store, &config).await.unwrap();
    assert!(report.halted_by_fail_fast);
    assert_eq!(report.get(Category::Document).unwrap().state, CategoryState::Failed);
    assert_eq!(report.get(Category::TextUnit).unwrap().state, CategoryState::Pending);
    assert_eq!(store.count("TextUnit").await.unwrap(), 0);

    // 显式类别列表下 fail-fast 不生效
    let mut config = config_for(data.path(), &["document", "text_unit"]);
    config.fail_fast = true;
    let report = run_import(&store, &config).await.unwrap();
    assert!(!report.halted_by_fail_fast);
    let text_units = report.get(Category::TextUnit).unwrap();
    assert_eq!(text_units.state, CategoryState::Done);
    assert_eq!(text_units.unresolved_references, 3);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (_db, store) = create_test_store().unwrap();
    let mut config = ImportConfig::new("/nonexistent");
    config.batch_size = 0;
    assert!(run_import(&store, &config).await.is_err());
}
