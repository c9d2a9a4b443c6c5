// ==========================================
// GraphRAG DGraph 导入工具 - 图存储 Trait
// ==========================================
// 职责: 定义导入管道所需的图存储访问接口（不包含业务逻辑）
// 红线: 存储层不做字段转换，不做冲突决策
// ==========================================

use crate::repository::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// StoreBackend - 存储后端
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// DGraph Alpha HTTP 接口
    #[default]
    Dgraph,
    /// 本地 SQLite 图存储（离线导入/测试）
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Dgraph => f.write_str("dgraph"),
            StoreBackend::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dgraph" => Ok(StoreBackend::Dgraph),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("未知的存储后端: {}（可用: dgraph, sqlite）", other)),
        }
    }
}

// ==========================================
// 变更描述
// ==========================================

/// 新建节点
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWrite {
    /// 批次内临时标签（DGraph 空白节点 `_:label`）
    pub label: String,
    pub dgraph_type: String,
    /// 外部 id（记录的 id 字段）
    pub xid: String,
    /// 谓词 → 值（已完成谓词重命名）
    pub payload: Map<String, Value>,
}

/// 新建 uid 边
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeWrite {
    pub from_uid: String,
    pub predicate: String,
    pub to_uid: String,
}

impl EdgeWrite {
    pub fn new(from_uid: &str, predicate: &str, to_uid: &str) -> Self {
        Self {
            from_uid: from_uid.to_string(),
            predicate: predicate.to_string(),
            to_uid: to_uid.to_string(),
        }
    }
}

/// 单次原子提交（先删除，再写入节点与边）
#[derive(Debug, Clone, Default)]
pub struct Mutation {
    pub delete_uids: Vec<String>,
    pub set_nodes: Vec<NodeWrite>,
    pub set_edges: Vec<EdgeWrite>,
}

impl Mutation {
    pub fn is_empty(&self) -> bool {
        self.delete_uids.is_empty() && self.set_nodes.is_empty() && self.set_edges.is_empty()
    }
}

// ==========================================
// GraphStore Trait
// ==========================================
// 实现者: DgraphStore（reqwest）/ SqliteGraphStore（rusqlite）
#[async_trait]
pub trait GraphStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    /// 连通性检查
    async fn health(&self) -> StoreResult<()>;

    /// 应用 schema 定义（DGraph schema 语法）
    async fn alter_schema(&self, schema: &str) -> StoreResult<()>;

    /// 清空全部 schema 与数据
    async fn drop_all(&self) -> StoreResult<()>;

    /// 按谓词值查找节点
    ///
    /// # 参数
    /// - dgraph_type: 节点类型
    /// - predicate: 匹配的谓词（`id`、`title`、`community` 等）
    /// - keys: 待查找的值（字符串化）
    ///
    /// # 返回
    /// - 值 → 匹配到的 uid 列表（未命中的值不出现）
    async fn find_uids(
        &self,
        dgraph_type: &str,
        predicate: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, Vec<String>>>;

    /// 原子提交一次变更
    ///
    /// # 返回
    /// - 节点标签 → 新分配的 uid
    async fn commit(&self, mutation: Mutation) -> StoreResult<HashMap<String, String>>;

    /// 某类型的节点数
    async fn count(&self, dgraph_type: &str) -> StoreResult<usize>;

    /// 某节点某谓词指向的 uid
    async fn edges_from(&self, uid: &str, predicate: &str) -> StoreResult<Vec<String>>;

    async fn close(&self) -> StoreResult<()>;
}
