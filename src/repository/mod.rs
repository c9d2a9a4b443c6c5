// ==========================================
// GraphRAG DGraph 导入工具 - 图存储层
// ==========================================
// 红线: 存储层不含导入规则
// ==========================================
// 职责: 提供图存储访问接口，屏蔽 DGraph / SQLite 细节
// 约束: SQLite 查询全部参数化；DQL 字面量统一转义
// ==========================================

pub mod dgraph_store;
pub mod error;
pub mod graph_store;
pub mod sqlite_store;

// 重导出核心类型
pub use dgraph_store::DgraphStore;
pub use error::{StoreError, StoreResult};
pub use graph_store::{EdgeWrite, GraphStore, Mutation, NodeWrite, StoreBackend};
pub use sqlite_store::SqliteGraphStore;

use crate::config::StoreConfig;
use std::time::Duration;
use tracing::info;

/// 按配置打开图存储
///
/// # 返回
/// - Ok(Box<dyn GraphStore>): 已通过健康检查的存储
/// - Err: 连接/打开失败
pub async fn open_store(config: &StoreConfig) -> StoreResult<Box<dyn GraphStore>> {
    let store: Box<dyn GraphStore> = match config.backend {
        StoreBackend::Dgraph => Box::new(DgraphStore::new(
            &config.host,
            config.port,
            Duration::from_secs(config.timeout_secs),
        )?),
        StoreBackend::Sqlite => Box::new(SqliteGraphStore::new(&config.sqlite_path)?),
    };
    store.health().await?;

    info!(
        backend = %config.backend,
        host = %config.host,
        port = config.port,
        "图存储连接成功"
    );
    Ok(store)
}
