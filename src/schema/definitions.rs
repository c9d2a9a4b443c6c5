// ==========================================
// GraphRAG DGraph 导入工具 - Schema 定义
// ==========================================
// 职责: 各类别的 DGraph 谓词与类型声明
// 红线: DGraph 谓词全局共享，同名谓词在各类别中的声明必须一致
// ==========================================

use crate::domain::category::Category;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::{HashMap, HashSet};

/// 谓词声明（`name: declaration .`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateDef {
    pub name: &'static str,
    pub declaration: &'static str,
}

const fn pred(name: &'static str, declaration: &'static str) -> PredicateDef {
    PredicateDef { name, declaration }
}

// ===== 共享谓词 =====
const ID: PredicateDef = pred("id", "string @index(exact)");
const HUMAN_READABLE_ID: PredicateDef = pred("human_readable_id", "int");
const TITLE: PredicateDef = pred("title", "string @index(exact, term)");
const TEXT: PredicateDef = pred("text", "string @index(fulltext)");
const DESCRIPTION: PredicateDef = pred("description", "string @index(fulltext)");
const COMMUNITY: PredicateDef = pred("community", "int @index(int)");
const LEVEL: PredicateDef = pred("level", "int");
const PERIOD: PredicateDef = pred("period", "datetime");
const DOCUMENT_IDS: PredicateDef = pred("document_ids", "[string] @index(exact)");
const TEXT_UNIT_IDS: PredicateDef = pred("text_unit_ids", "[string] @index(exact)");
const ENTITY_IDS: PredicateDef = pred("entity_ids", "[string] @index(exact)");
const RELATIONSHIP_IDS: PredicateDef = pred("relationship_ids", "[string] @index(exact)");
const DOCUMENTS: PredicateDef = pred("documents", "[uid] @reverse");
const TEXT_UNITS: PredicateDef = pred("text_units", "[uid] @reverse");
const ENTITIES: PredicateDef = pred("entities", "[uid] @reverse");
const RELATIONSHIPS: PredicateDef = pred("relationships", "[uid] @reverse");

// ==========================================
// TypeSchema - 单类别 schema
// ==========================================
#[derive(Debug)]
pub struct TypeSchema {
    pub category: Category,
    pub predicates: &'static [PredicateDef],
}

impl TypeSchema {
    pub fn type_name(&self) -> &'static str {
        self.category.dgraph_type()
    }
}

/// 渲染为单份 DGraph schema 文档（共享谓词只声明一次，类型块在后）
pub fn render_schemas(schemas: &[&TypeSchema]) -> String {
    let mut seen = HashSet::new();
    let mut out = String::new();
    for schema in schemas {
        for predicate in schema.predicates {
            if seen.insert(predicate.name) {
                out.push_str(&format!("{}: {} .\n", predicate.name, predicate.declaration));
            }
        }
    }
    for schema in schemas {
        out.push_str(&format!("type {} {{\n", schema.type_name()));
        for predicate in schema.predicates {
            out.push_str(&format!("    {}\n", predicate.name));
        }
        out.push_str("}\n");
    }
    out
}

pub static DOCUMENT_SCHEMA: TypeSchema = TypeSchema {
    category: Category::Document,
    predicates: &[
        ID,
        HUMAN_READABLE_ID,
        TITLE,
        TEXT,
        TEXT_UNIT_IDS,
        pred("creation_date", "datetime"),
        pred("metadata", "string"),
        TEXT_UNITS,
    ],
};

pub static TEXT_UNIT_SCHEMA: TypeSchema = TypeSchema {
    category: Category::TextUnit,
    predicates: &[
        ID,
        HUMAN_READABLE_ID,
        TEXT,
        pred("n_tokens", "int"),
        DOCUMENT_IDS,
        ENTITY_IDS,
        RELATIONSHIP_IDS,
        pred("covariate_ids", "[string] @index(exact)"),
        DOCUMENTS,
    ],
};

pub static ENTITY_SCHEMA: TypeSchema = TypeSchema {
    category: Category::Entity,
    predicates: &[
        ID,
        HUMAN_READABLE_ID,
        TITLE,
        pred("entity_type", "string @index(exact)"),
        DESCRIPTION,
        TEXT_UNIT_IDS,
        pred("frequency", "int"),
        pred("degree", "int"),
        pred("x", "float"),
        pred("y", "float"),
        TEXT_UNITS,
        pred("related_entities", "[uid] @reverse"),
    ],
};

pub static RELATIONSHIP_SCHEMA: TypeSchema = TypeSchema {
    category: Category::Relationship,
    predicates: &[
        ID,
        HUMAN_READABLE_ID,
        pred("source", "string @index(exact)"),
        pred("target", "string @index(exact)"),
        DESCRIPTION,
        pred("relationship_type", "string @index(exact)"),
        pred("weight", "float"),
        pred("combined_degree", "int"),
        TEXT_UNIT_IDS,
        TEXT_UNITS,
        pred("source_entity", "uid"),
        pred("target_entity", "uid"),
    ],
};

pub static COMMUNITY_SCHEMA: TypeSchema = TypeSchema {
    category: Category::Community,
    predicates: &[
        ID,
        HUMAN_READABLE_ID,
        TITLE,
        COMMUNITY,
        LEVEL,
        pred("parent", "int"),
        pred("children", "[int]"),
        ENTITY_IDS,
        RELATIONSHIP_IDS,
        TEXT_UNIT_IDS,
        PERIOD,
        pred("size", "int"),
        ENTITIES,
        RELATIONSHIPS,
        TEXT_UNITS,
        pred("parent_community", "uid"),
        pred("child_communities", "[uid] @reverse"),
        pred("reports", "[uid] @reverse"),
    ],
};

pub static COMMUNITY_REPORT_SCHEMA: TypeSchema = TypeSchema {
    category: Category::CommunityReport,
    predicates: &[
        ID,
        HUMAN_READABLE_ID,
        COMMUNITY,
        TITLE,
        pred("summary", "string @index(fulltext)"),
        pred("full_content", "string @index(fulltext)"),
        pred("findings", "string"),
        pred("explanation", "string @index(fulltext)"),
        pred("rank", "float"),
        pred("rating", "int"),
        LEVEL,
        PERIOD,
        pred("create_time", "datetime"),
        ENTITY_IDS,
        TEXT_UNIT_IDS,
        pred("full_content_json", "string"),
        pred("community_rel", "uid"),
        ENTITIES,
    ],
};

pub fn schema_for(category: Category) -> &'static TypeSchema {
    match category {
        Category::Document => &DOCUMENT_SCHEMA,
        Category::TextUnit => &TEXT_UNIT_SCHEMA,
        Category::Entity => &ENTITY_SCHEMA,
        Category::Relationship => &RELATIONSHIP_SCHEMA,
        Category::Community => &COMMUNITY_SCHEMA,
        Category::CommunityReport => &COMMUNITY_REPORT_SCHEMA,
    }
}

/// 全部类别（固定顺序）
pub fn complete_schema() -> Vec<&'static TypeSchema> {
    Category::ORDER.iter().map(|c| schema_for(*c)).collect()
}

/// 跨类别谓词一致性检查
///
/// # 返回
/// - Err(ImportError::Schema): 同名谓词声明不一致，category 为后出现的类别
pub fn check_consistency(schemas: &[&TypeSchema]) -> ImportResult<()> {
    let mut declared: HashMap<&str, (&str, Category)> = HashMap::new();
    for schema in schemas {
        for predicate in schema.predicates {
            match declared.get(predicate.name) {
                Some((declaration, owner)) if *declaration != predicate.declaration => {
                    return Err(ImportError::Schema {
                        category: schema.category.to_string(),
                        message: format!(
                            "谓词 {} 声明冲突: {} 中为 '{}'，此处为 '{}'",
                            predicate.name, owner, declaration, predicate.declaration
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    declared.insert(predicate.name, (predicate.declaration, schema.category));
                }
            }
        }
    }
    Ok(())
}
