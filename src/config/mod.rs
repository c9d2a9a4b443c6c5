// ==========================================
// GraphRAG DGraph 导入工具 - 配置层
// ==========================================
// 职责: 应用配置（TOML）与导入参数
// 覆写: 默认值 < 配置文件 < 命令行
// ==========================================

pub mod app_config;
pub mod import_config;

// 重导出核心配置
pub use app_config::{
    default_config_path, AppConfig, LoggingConfig, SchemaConfig, StoreConfig,
};
pub use import_config::{CategorySelection, ImportConfig};
