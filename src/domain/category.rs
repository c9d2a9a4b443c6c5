// ==========================================
// GraphRAG DGraph 导入工具 - 数据类别与字段规格
// ==========================================
// 职责: 六类 GraphRAG 产物的静态声明式字段规格
// 红线: 只描述字段规则，不包含转换逻辑
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// Category - 数据类别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Document,
    TextUnit,
    Entity,
    Relationship,
    Community,
    CommunityReport,
}

impl Category {
    /// 依赖顺序（后者引用前者导入的 id）
    pub const ORDER: [Category; 6] = [
        Category::Document,
        Category::TextUnit,
        Category::Entity,
        Category::Relationship,
        Category::Community,
        Category::CommunityReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Document => "document",
            Category::TextUnit => "text_unit",
            Category::Entity => "entity",
            Category::Relationship => "relationship",
            Category::Community => "community",
            Category::CommunityReport => "community_report",
        }
    }

    /// 在依赖顺序中的位置
    pub fn rank(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|c| c == self)
            .unwrap_or(Self::ORDER.len())
    }

    pub fn spec(&self) -> &'static CategorySpec {
        match self {
            Category::Document => &DOCUMENT_SPEC,
            Category::TextUnit => &TEXT_UNIT_SPEC,
            Category::Entity => &ENTITY_SPEC,
            Category::Relationship => &RELATIONSHIP_SPEC,
            Category::Community => &COMMUNITY_SPEC,
            Category::CommunityReport => &COMMUNITY_REPORT_SPEC,
        }
    }

    /// DGraph 中的类型名（dgraph.type）
    pub fn dgraph_type(&self) -> &'static str {
        self.spec().dgraph_type
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Category::ORDER
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "未知的数据类型: {}（可用: {}）",
                    s,
                    Category::ORDER.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

// ==========================================
// 字段规则类型
// ==========================================

/// 数值字段的目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Int,
    Float,
}

/// ID 格式约束（存储层）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// 十六进制哈希（≥32 位）
    Hash,
    Uuid,
    Unchecked,
}

/// 引用解析时使用的目标键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKey {
    /// 按目标记录的 id 匹配
    Id,
    /// 按目标记录的 community 编号匹配
    CommunityNumber,
}

/// 跨类别引用（由后处理器建立边）
#[derive(Debug, Clone, Copy)]
pub struct RelationSpec {
    /// 源节点上的 uid 谓词
    pub predicate: &'static str,
    /// 记录中保存引用值的字段
    pub field: &'static str,
    pub target: Category,
    pub key: RefKey,
    /// 目标节点上的反向谓词（可选）
    pub inverse: Option<&'static str>,
}

// ==========================================
// CategorySpec - 类别字段规格
// ==========================================
#[derive(Debug)]
pub struct CategorySpec {
    pub category: Category,
    pub dgraph_type: &'static str,
    pub file_pattern: &'static str,
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub list_fields: &'static [&'static str],
    /// 数值字段；若同时是列表字段，则对每个元素转换
    pub numeric_fields: &'static [(&'static str, NumericKind)],
    pub json_fields: &'static [&'static str],
    pub date_fields: &'static [&'static str],
    pub text_fields: &'static [&'static str],
    /// 字段最大长度（字符数）
    pub max_lengths: &'static [(&'static str, usize)],
    /// 列表字段最少元素数
    pub min_list_lengths: &'static [(&'static str, usize)],
    pub id_format: IdFormat,
    /// 字段名 → DGraph 谓词名（`type` 在 DGraph schema 中是保留字）
    pub predicate_renames: &'static [(&'static str, &'static str)],
    /// 复合唯一键（skip 策略下同键记录视为已存在）
    pub composite_key: Option<&'static [&'static str]>,
    pub relations: &'static [RelationSpec],
}

impl CategorySpec {
    pub fn all_fields(&self) -> impl Iterator<Item = &'static str> {
        self.required_fields
            .iter()
            .chain(self.optional_fields.iter())
            .copied()
    }

    pub fn is_known_field(&self, field: &str) -> bool {
        self.all_fields().any(|f| f == field)
    }

    pub fn numeric_kind(&self, field: &str) -> Option<NumericKind> {
        self.numeric_fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, kind)| *kind)
    }

    pub fn is_list_field(&self, field: &str) -> bool {
        self.list_fields.contains(&field)
    }

    pub fn is_json_field(&self, field: &str) -> bool {
        self.json_fields.contains(&field)
    }

    pub fn is_date_field(&self, field: &str) -> bool {
        self.date_fields.contains(&field)
    }

    pub fn is_text_field(&self, field: &str) -> bool {
        self.text_fields.contains(&field)
    }

    pub fn max_length(&self, field: &str) -> Option<usize> {
        self.max_lengths
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, max)| *max)
    }

    /// 字段写入 DGraph 时使用的谓词名
    pub fn predicate_for<'a>(&self, field: &'a str) -> &'a str {
        match self.predicate_renames.iter().find(|(name, _)| *name == field) {
            Some((_, predicate)) => predicate,
            None => field,
        }
    }
}

// ==========================================
// 各类别静态规格
// ==========================================

pub static DOCUMENT_SPEC: CategorySpec = CategorySpec {
    category: Category::Document,
    dgraph_type: "Document",
    file_pattern: "*documents*",
    required_fields: &["id", "title", "text"],
    optional_fields: &["human_readable_id", "creation_date", "metadata", "text_unit_ids"],
    list_fields: &["text_unit_ids"],
    numeric_fields: &[("human_readable_id", NumericKind::Int)],
    json_fields: &["metadata"],
    date_fields: &["creation_date"],
    text_fields: &["title", "text"],
    max_lengths: &[],
    min_list_lengths: &[],
    id_format: IdFormat::Hash,
    predicate_renames: &[],
    composite_key: None,
    relations: &[],
};

pub static TEXT_UNIT_SPEC: CategorySpec = CategorySpec {
    category: Category::TextUnit,
    dgraph_type: "TextUnit",
    file_pattern: "*text_units*",
    required_fields: &["id", "text"],
    optional_fields: &[
        "human_readable_id",
        "n_tokens",
        "document_ids",
        "entity_ids",
        "relationship_ids",
        "covariate_ids",
    ],
    list_fields: &["document_ids", "entity_ids", "relationship_ids", "covariate_ids"],
    numeric_fields: &[
        ("human_readable_id", NumericKind::Int),
        ("n_tokens", NumericKind::Int),
    ],
    json_fields: &[],
    date_fields: &[],
    text_fields: &["text"],
    max_lengths: &[("text", 10_000)],
    min_list_lengths: &[],
    id_format: IdFormat::Hash,
    predicate_renames: &[],
    composite_key: None,
    relations: &[RelationSpec {
        predicate: "documents",
        field: "document_ids",
        target: Category::Document,
        key: RefKey::Id,
        inverse: Some("text_units"),
    }],
};

pub static ENTITY_SPEC: CategorySpec = CategorySpec {
    category: Category::Entity,
    dgraph_type: "Entity",
    file_pattern: "*entities*",
    required_fields: &["id", "title", "type", "description"],
    optional_fields: &[
        "human_readable_id",
        "frequency",
        "degree",
        "x",
        "y",
        "text_unit_ids",
    ],
    list_fields: &["text_unit_ids"],
    numeric_fields: &[
        ("human_readable_id", NumericKind::Int),
        ("frequency", NumericKind::Int),
        ("degree", NumericKind::Int),
        ("x", NumericKind::Float),
        ("y", NumericKind::Float),
    ],
    json_fields: &[],
    date_fields: &[],
    text_fields: &["title", "description", "type"],
    max_lengths: &[],
    min_list_lengths: &[],
    id_format: IdFormat::Uuid,
    predicate_renames: &[("type", "entity_type")],
    composite_key: None,
    relations: &[RelationSpec {
        predicate: "text_units",
        field: "text_unit_ids",
        target: Category::TextUnit,
        key: RefKey::Id,
        inverse: None,
    }],
};

pub static RELATIONSHIP_SPEC: CategorySpec = CategorySpec {
    category: Category::Relationship,
    dgraph_type: "Relationship",
    file_pattern: "*relationships*",
    required_fields: &["id", "source", "target"],
    optional_fields: &[
        "human_readable_id",
        "description",
        "weight",
        "combined_degree",
        "text_unit_ids",
        "type",
    ],
    list_fields: &["text_unit_ids"],
    numeric_fields: &[
        ("human_readable_id", NumericKind::Int),
        ("weight", NumericKind::Float),
        ("combined_degree", NumericKind::Int),
    ],
    json_fields: &[],
    date_fields: &[],
    text_fields: &["source", "target", "description", "type"],
    max_lengths: &[],
    min_list_lengths: &[],
    id_format: IdFormat::Unchecked,
    predicate_renames: &[("type", "relationship_type")],
    composite_key: Some(&["source", "target"]),
    relations: &[RelationSpec {
        predicate: "text_units",
        field: "text_unit_ids",
        target: Category::TextUnit,
        key: RefKey::Id,
        inverse: None,
    }],
};

pub static COMMUNITY_SPEC: CategorySpec = CategorySpec {
    category: Category::Community,
    dgraph_type: "Community",
    file_pattern: "*communities*",
    required_fields: &["id", "community", "level", "title"],
    optional_fields: &[
        "human_readable_id",
        "parent",
        "children",
        "entity_ids",
        "relationship_ids",
        "text_unit_ids",
        "period",
        "size",
    ],
    list_fields: &["children", "entity_ids", "relationship_ids", "text_unit_ids"],
    numeric_fields: &[
        ("human_readable_id", NumericKind::Int),
        ("community", NumericKind::Int),
        ("level", NumericKind::Int),
        ("parent", NumericKind::Int),
        ("size", NumericKind::Int),
        ("children", NumericKind::Int), // 列表元素逐个转换
    ],
    json_fields: &[],
    date_fields: &["period"],
    text_fields: &["title"],
    max_lengths: &[],
    min_list_lengths: &[("entity_ids", 1)],
    id_format: IdFormat::Uuid,
    predicate_renames: &[],
    composite_key: None,
    relations: &[
        RelationSpec {
            predicate: "entities",
            field: "entity_ids",
            target: Category::Entity,
            key: RefKey::Id,
            inverse: None,
        },
        RelationSpec {
            predicate: "relationships",
            field: "relationship_ids",
            target: Category::Relationship,
            key: RefKey::Id,
            inverse: None,
        },
        RelationSpec {
            predicate: "text_units",
            field: "text_unit_ids",
            target: Category::TextUnit,
            key: RefKey::Id,
            inverse: None,
        },
    ],
};

pub static COMMUNITY_REPORT_SPEC: CategorySpec = CategorySpec {
    category: Category::CommunityReport,
    dgraph_type: "CommunityReport",
    file_pattern: "*community_reports*",
    required_fields: &["id", "community", "full_content_json"],
    optional_fields: &[
        "human_readable_id",
        "title",
        "summary",
        "full_content",
        "findings",
        "rank",
        "rating",
        "explanation",
        "level",
        "period",
        "create_time",
        "entity_ids",
        "text_unit_ids",
    ],
    list_fields: &["entity_ids", "text_unit_ids"],
    numeric_fields: &[
        ("human_readable_id", NumericKind::Int),
        ("community", NumericKind::Int),
        ("level", NumericKind::Int),
        ("rating", NumericKind::Int),
        ("rank", NumericKind::Float),
    ],
    json_fields: &["full_content_json", "findings"],
    date_fields: &["period", "create_time"],
    text_fields: &["title", "summary", "full_content", "explanation"],
    max_lengths: &[],
    min_list_lengths: &[],
    id_format: IdFormat::Uuid,
    predicate_renames: &[],
    composite_key: None,
    relations: &[
        RelationSpec {
            predicate: "community_rel",
            field: "community",
            target: Category::Community,
            key: RefKey::CommunityNumber,
            inverse: Some("reports"),
        },
        RelationSpec {
            predicate: "entities",
            field: "entity_ids",
            target: Category::Entity,
            key: RefKey::Id,
            inverse: None,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_accepts_dash_and_case() {
        assert_eq!("text-unit".parse::<Category>().unwrap(), Category::TextUnit);
        assert_eq!(
            "Community_Report".parse::<Category>().unwrap(),
            Category::CommunityReport
        );
        assert!("covariate".parse::<Category>().is_err());
    }

    #[test]
    fn test_order_is_dependency_order() {
        assert_eq!(Category::Document.rank(), 0);
        assert_eq!(Category::CommunityReport.rank(), 5);
        for category in Category::ORDER {
            // 引用目标必须排在自身之前（社区层级属于同类自引用，由专门后处理器处理）
            for relation in category.spec().relations {
                assert!(relation.target.rank() < category.rank());
            }
        }
    }

    #[test]
    fn test_required_fields_are_known_fields() {
        for category in Category::ORDER {
            let spec = category.spec();
            assert_eq!(spec.category, category);
            assert!(spec.required_fields.contains(&"id"));
            for field in spec.list_fields {
                assert!(spec.is_known_field(field), "{}: {}", category, field);
            }
            for (field, _) in spec.numeric_fields {
                assert!(spec.is_known_field(field), "{}: {}", category, field);
            }
        }
    }

    #[test]
    fn test_predicate_rename_for_type() {
        assert_eq!(ENTITY_SPEC.predicate_for("type"), "entity_type");
        assert_eq!(ENTITY_SPEC.predicate_for("title"), "title");
        assert_eq!(DOCUMENT_SPEC.predicate_for("type"), "type");
    }
}
