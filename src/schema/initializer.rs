// ==========================================
// GraphRAG DGraph 导入工具 - Schema 初始化
// ==========================================
// 职责: 按 schema_type 向图存储下发类别 schema
// 红线: 全部类别合并为一次下发（原子），失败时错误中标明类别
// ==========================================

use crate::domain::category::Category;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::graph_store::GraphStore;
use crate::schema::definitions::{
    check_consistency, complete_schema, render_schemas, schema_for, TypeSchema,
};
use std::collections::HashSet;
use tracing::{error, info, warn};

pub const COMPLETE: &str = "complete";

/// 可用的 schema_type 取值
pub fn valid_schema_types() -> Vec<&'static str> {
    let mut types = vec![COMPLETE];
    types.extend(Category::ORDER.iter().map(|c| c.as_str()));
    types
}

/// schema_type → 待下发的类别 schema
pub fn resolve_schema_type(schema_type: &str) -> ImportResult<Vec<&'static TypeSchema>> {
    let normalized = schema_type.trim().to_ascii_lowercase();
    if normalized == COMPLETE {
        return Ok(complete_schema());
    }
    match normalized.parse::<Category>() {
        Ok(category) => Ok(vec![schema_for(category)]),
        Err(_) => Err(ImportError::Schema {
            category: schema_type.to_string(),
            message: format!(
                "未知的 schema 类型（可用: {}）",
                valid_schema_types().join(", ")
            ),
        }),
    }
}

/// 初始化 schema
///
/// # 参数
/// - store: 图存储
/// - schema_type: `complete` 或单个类别名
/// - drop_existing: 是否先清空全部 schema 与数据
///
/// # 返回
/// - Err(ImportError::Schema): 类型未知、谓词冲突或某类别下发失败
pub async fn initialize(
    store: &dyn GraphStore,
    schema_type: &str,
    drop_existing: bool,
) -> ImportResult<()> {
    let schemas = resolve_schema_type(schema_type)?;
    check_consistency(&schemas)?;

    let document = render_schemas(&schemas);

    if drop_existing {
        warn!(backend = %store.backend(), "清空现有 schema 与全部数据");
        store.drop_all().await?;
    }

    // 整份文档一次下发，任一类别出错则全部不生效
    if let Err(e) = store.alter_schema(&document).await {
        let message = e.to_string();
        let category = failing_category(&schemas, &message)
            .map(|c| c.to_string())
            .unwrap_or_else(|| schema_type.to_string());
        error!(schema_type, category = %category, error = %message, "schema 下发失败");
        return Err(ImportError::Schema { category, message });
    }

    for schema in &schemas {
        info!(
            category = %schema.category,
            dgraph_type = schema.type_name(),
            predicates = schema.predicates.len(),
            "schema 已应用"
        );
    }
    info!(schema_type, categories = schemas.len(), "schema 初始化完成");
    Ok(())
}

/// 按错误信息中出现的类型名或独有谓词定位出错类别
fn failing_category(schemas: &[&TypeSchema], message: &str) -> Option<Category> {
    let tokens: HashSet<&str> = message
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(schema) = schemas.iter().find(|s| tokens.contains(s.type_name())) {
        return Some(schema.category);
    }
    schemas
        .iter()
        .find(|schema| {
            schema.predicates.iter().any(|p| {
                tokens.contains(p.name)
                    && schemas
                        .iter()
                        .filter(|other| other.predicates.iter().any(|q| q.name == p.name))
                        .count()
                        == 1
            })
        })
        .map(|schema| schema.category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_schema_type() {
        assert_eq!(resolve_schema_type("complete").unwrap().len(), 6);
        let single = resolve_schema_type("Entity").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].category, Category::Entity);

        let err = resolve_schema_type("covariate").unwrap_err();
        assert!(err.to_string().contains("community_report"));
    }

    #[test]
    fn test_failing_category_from_store_message() {
        let schemas = complete_schema();
        assert_eq!(
            failing_category(&schemas, "line 40: type Entity: bad index"),
            Some(Category::Entity)
        );
        assert_eq!(
            failing_category(&schemas, "CommunityReport rejected"),
            Some(Category::CommunityReport)
        );
        assert_eq!(
            failing_category(&schemas, "predicate full_content: bad tokenizer"),
            Some(Category::CommunityReport)
        );
        assert_eq!(failing_category(&schemas, "title: bad index"), None);
    }
}
