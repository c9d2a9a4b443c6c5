// ==========================================
// GraphRAG DGraph 导入工具 - 核心库
// ==========================================
// 职责: GraphRAG 索引产物（parquet/CSV）→ DGraph 图数据库
// 技术栈: Tokio + reqwest (DGraph HTTP) + rusqlite (本地图存储) + polars
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 类别规格、记录与报告
pub mod domain;

// 存储层 - GraphStore 及其实现
pub mod repository;

// 导入层 - 读取、转换、写入、后处理、编排
pub mod importer;

// Schema 层 - 谓词与类型定义
pub mod schema;

// 配置层
pub mod config;

// 数据库基础设施（本地图存储的连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{AppConfig, CategorySelection, ImportConfig, StoreConfig};
pub use domain::{
    Category, CategoryReport, CategorySpec, CategoryState, ConflictStrategy, GraphRecord,
    ImportReport,
};
pub use importer::{run_import, ImportError, ImportResult};
pub use repository::{open_store, DgraphStore, GraphStore, SqliteGraphStore, StoreBackend};

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
