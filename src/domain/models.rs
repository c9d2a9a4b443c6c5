// ==========================================
// GraphRAG DGraph 导入工具 - 类型化领域模型
// ==========================================
// 对齐: GraphRAG 索引输出 parquet 列
// 用途: GraphRecord::decode 的目标类型，后处理器按类型读取引用字段
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==========================================
// Document - 文档
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String, // 原始文本
    #[serde(default)]
    pub human_readable_id: Option<i64>,
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
    #[serde(default)]
    pub creation_date: Option<String>, // ISO 8601
    #[serde(default)]
    pub metadata: Option<Value>,
}

// ==========================================
// TextUnit - 文本单元
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub human_readable_id: Option<i64>, // 在文档中的位置序号
    #[serde(default)]
    pub n_tokens: Option<i64>,
    #[serde(default)]
    pub document_ids: Vec<String>, // 所属文档
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub relationship_ids: Vec<String>,
}

// ==========================================
// Entity - 实体
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    #[serde(default)]
    pub human_readable_id: Option<i64>,
    #[serde(default)]
    pub frequency: Option<i64>,
    #[serde(default)]
    pub degree: Option<i64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
}

// ==========================================
// Relationship - 实体关系
// ==========================================
// source/target: 实体 id 或实体 title（GraphRAG 输出使用 title）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub combined_degree: Option<i64>,
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
}

// ==========================================
// Community - 社区
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub community: i64, // 社区编号
    pub level: i64,
    pub title: String,
    #[serde(default)]
    pub parent: Option<i64>, // 父社区编号（<0 表示根）
    #[serde(default)]
    pub children: Vec<i64>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub relationship_ids: Vec<String>,
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

impl Community {
    /// 父社区编号（根社区返回 None）
    pub fn parent_number(&self) -> Option<i64> {
        self.parent.filter(|p| *p >= 0 && *p != self.community)
    }
}

// ==========================================
// CommunityReport - 社区报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityReport {
    pub id: String,
    pub community: i64, // 所属社区编号
    pub full_content_json: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub rank: Option<f64>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}
