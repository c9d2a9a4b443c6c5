// ==========================================
// GraphRAG DGraph 导入工具 - 关系后处理器
// ==========================================
// 阶段 4: 类别导入完成后建立跨类别 uid 边
// - ReferenceLinker: 按 CategorySpec.relations 解析 *_ids 引用
// - RelationshipEdgeBuilder: 关系两端实体（id 优先，title 兜底）
// - CommunityHierarchyLinker: 社区父子层级
// 红线: 未解析引用只告警并跳过，不中断导入
// ==========================================

use crate::domain::category::{Category, RefKey, RelationSpec};
use crate::domain::models::{Community, Relationship};
use crate::domain::record::GraphRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::graph_store::{EdgeWrite, GraphStore, Mutation};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 单次提交的最大边数
const EDGE_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostProcessReport {
    pub edges_created: usize,
    pub unresolved: usize,
}

impl PostProcessReport {
    pub fn merge(&mut self, other: PostProcessReport) {
        self.edges_created += other.edges_created;
        self.unresolved += other.unresolved;
    }
}

// ==========================================
// PostProcessor Trait
// ==========================================
#[async_trait]
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, category: Category) -> bool;

    /// 处理一个类别已写入的记录
    ///
    /// # 参数
    /// - store: 图存储
    /// - category: 刚完成导入的类别
    /// - written: (记录, uid) 列表
    ///
    /// # 返回
    /// - Err: 仅存储层错误（未解析引用计入 unresolved）
    async fn process(
        &self,
        store: &dyn GraphStore,
        category: Category,
        written: &[(GraphRecord, String)],
    ) -> ImportResult<PostProcessReport>;
}

/// 默认后处理器链
pub fn default_processors() -> Vec<Box<dyn PostProcessor>> {
    vec![
        Box::new(ReferenceLinker),
        Box::new(RelationshipEdgeBuilder),
        Box::new(CommunityHierarchyLinker),
    ]
}

// ===== 公共辅助 =====

fn lookup_predicate(key: RefKey) -> &'static str {
    match key {
        RefKey::Id => "id",
        RefKey::CommunityNumber => "community",
    }
}

fn report_unresolved(category: Category, field: &str, target: Category, key: &str) {
    let err = ImportError::Reference {
        category: category.to_string(),
        field: field.to_string(),
        target: target.to_string(),
        key: key.to_string(),
    };
    warn!(category = %category, field, "{}", err);
}

/// 去重后分块提交边
///
/// # 返回
/// - 实际提交的边数
async fn commit_edges(store: &dyn GraphStore, edges: Vec<EdgeWrite>) -> ImportResult<usize> {
    let mut seen = HashSet::new();
    let unique: Vec<EdgeWrite> = edges.into_iter().filter(|e| seen.insert(e.clone())).collect();

    for chunk in unique.chunks(EDGE_CHUNK_SIZE) {
        store
            .commit(Mutation {
                set_edges: chunk.to_vec(),
                ..Default::default()
            })
            .await?;
    }
    Ok(unique.len())
}

async fn resolve(
    store: &dyn GraphStore,
    target: Category,
    predicate: &str,
    keys: &[String],
) -> ImportResult<HashMap<String, Vec<String>>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(store.find_uids(target.dgraph_type(), predicate, keys).await?)
}

fn distinct(keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.into_iter().collect();
    keys.sort();
    keys.dedup();
    keys
}

// ==========================================
// ReferenceLinker - 声明式引用
// ==========================================
pub struct ReferenceLinker;

impl ReferenceLinker {
    async fn link_relation(
        &self,
        store: &dyn GraphStore,
        category: Category,
        relation: &RelationSpec,
        written: &[(GraphRecord, String)],
    ) -> ImportResult<PostProcessReport> {
        let keys = distinct(
            written
                .iter()
                .flat_map(|(record, _)| record.get_list(relation.field)),
        );
        let targets = resolve(store, relation.target, lookup_predicate(relation.key), &keys).await?;

        let mut report = PostProcessReport::default();
        let mut edges = Vec::new();
        for (record, uid) in written {
            for key in record.get_list(relation.field) {
                match targets.get(&key) {
                    Some(target_uids) => {
                        for target_uid in target_uids {
                            edges.push(EdgeWrite::new(uid, relation.predicate, target_uid));
                            if let Some(inverse) = relation.inverse {
                                edges.push(EdgeWrite::new(target_uid, inverse, uid));
                            }
                        }
                    }
                    None => {
                        report.unresolved += 1;
                        report_unresolved(category, relation.field, relation.target, &key);
                    }
                }
            }
        }

        report.edges_created = commit_edges(store, edges).await?;
        debug!(
            category = %category,
            predicate = relation.predicate,
            edges = report.edges_created,
            unresolved = report.unresolved,
            "引用边已建立"
        );
        Ok(report)
    }
}

#[async_trait]
impl PostProcessor for ReferenceLinker {
    fn name(&self) -> &'static str {
        "reference_linker"
    }

    fn applies_to(&self, category: Category) -> bool {
        !category.spec().relations.is_empty()
    }

    async fn process(
        &self,
        store: &dyn GraphStore,
        category: Category,
        written: &[(GraphRecord, String)],
    ) -> ImportResult<PostProcessReport> {
        let mut report = PostProcessReport::default();
        for relation in category.spec().relations {
            report.merge(self.link_relation(store, category, relation, written).await?);
        }
        Ok(report)
    }
}

// ==========================================
// RelationshipEdgeBuilder - 关系端点
// ==========================================
pub struct RelationshipEdgeBuilder;

#[async_trait]
impl PostProcessor for RelationshipEdgeBuilder {
    fn name(&self) -> &'static str {
        "relationship_edge_builder"
    }

    fn applies_to(&self, category: Category) -> bool {
        category == Category::Relationship
    }

    async fn process(
        &self,
        store: &dyn GraphStore,
        category: Category,
        written: &[(GraphRecord, String)],
    ) -> ImportResult<PostProcessReport> {
        let mut pairs: Vec<(&str, Relationship)> = Vec::with_capacity(written.len());
        for (record, uid) in written {
            match record.decode::<Relationship>() {
                Ok(relationship) => pairs.push((uid.as_str(), relationship)),
                Err(e) => warn!(id = %record.id, error = %e, "关系记录解码失败，跳过端点解析"),
            }
        }

        let keys = distinct(
            pairs
                .iter()
                .flat_map(|(_, r)| [r.source.clone(), r.target.clone()]),
        );
        let mut endpoints = resolve(store, Category::Entity, "id", &keys).await?;
        let by_title: Vec<String> = keys
            .iter()
            .filter(|k| !endpoints.contains_key(*k))
            .cloned()
            .collect();
        endpoints.extend(resolve(store, Category::Entity, "title", &by_title).await?);

        let mut report = PostProcessReport::default();
        let mut edges = Vec::new();
        for (uid, relationship) in &pairs {
            let source = endpoints.get(&relationship.source);
            let target = endpoints.get(&relationship.target);
            if source.is_none() {
                report.unresolved += 1;
                report_unresolved(category, "source", Category::Entity, &relationship.source);
            }
            if target.is_none() {
                report.unresolved += 1;
                report_unresolved(category, "target", Category::Entity, &relationship.target);
            }
            for source_uid in source.into_iter().flatten() {
                edges.push(EdgeWrite::new(uid, "source_entity", source_uid));
            }
            for target_uid in target.into_iter().flatten() {
                edges.push(EdgeWrite::new(uid, "target_entity", target_uid));
            }
            if let (Some(sources), Some(targets)) = (source, target) {
                for source_uid in sources {
                    for target_uid in targets {
                        edges.push(EdgeWrite::new(source_uid, "related_entities", target_uid));
                    }
                }
            }
        }

        report.edges_created = commit_edges(store, edges).await?;
        info!(
            relationships = pairs.len(),
            edges = report.edges_created,
            unresolved = report.unresolved,
            "关系端点解析完成"
        );
        Ok(report)
    }
}

// ==========================================
// CommunityHierarchyLinker - 社区层级
// ==========================================
pub struct CommunityHierarchyLinker;

#[async_trait]
impl PostProcessor for CommunityHierarchyLinker {
    fn name(&self) -> &'static str {
        "community_hierarchy_linker"
    }

    fn applies_to(&self, category: Category) -> bool {
        category == Category::Community
    }

    async fn process(
        &self,
        store: &dyn GraphStore,
        category: Category,
        written: &[(GraphRecord, String)],
    ) -> ImportResult<PostProcessReport> {
        let mut children: Vec<(&str, i64)> = Vec::new();
        for (record, uid) in written {
            match record.decode::<Community>() {
                Ok(community) => {
                    if let Some(parent) = community.parent_number() {
                        children.push((uid.as_str(), parent));
                    }
                }
                Err(e) => warn!(id = %record.id, error = %e, "社区记录解码失败，跳过层级解析"),
            }
        }

        let keys = distinct(children.iter().map(|(_, parent)| parent.to_string()));
        let parents = resolve(store, Category::Community, "community", &keys).await?;

        let mut report = PostProcessReport::default();
        let mut edges = Vec::new();
        for (child_uid, parent) in &children {
            let key = parent.to_string();
            match parents.get(&key) {
                Some(parent_uids) => {
                    for parent_uid in parent_uids {
                        edges.push(EdgeWrite::new(child_uid, "parent_community", parent_uid));
                        edges.push(EdgeWrite::new(parent_uid, "child_communities", child_uid));
                    }
                }
                None => {
                    report.unresolved += 1;
                    report_unresolved(category, "parent", Category::Community, &key);
                }
            }
        }

        report.edges_created = commit_edges(store, edges).await?;
        Ok(report)
    }
}
