// ==========================================
// GraphRAG DGraph 导入工具 - 应用配置
// ==========================================
// 职责: TOML 配置文件加载（所有字段均有默认值）
// 覆写顺序: 默认值 < 配置文件 < 命令行参数
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::graph_store::StoreBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// 默认配置目录名（位于系统配置目录下）
pub const CONFIG_DIR_NAME: &str = "graphrag-dgraph-import";

/// 默认配置文件名
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ==========================================
// StoreConfig - 图存储连接
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub host: String,
    /// DGraph Alpha HTTP 端口
    pub port: u16,
    pub sqlite_path: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Dgraph,
            host: "localhost".to_string(),
            port: 8080,
            sqlite_path: "graphrag_graph.db".to_string(),
            timeout_secs: 30,
        }
    }
}

// ==========================================
// SchemaConfig - schema 初始化
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// 导入前初始化 schema
    pub init_schema: bool,
    /// 单个类别名或 complete
    pub schema_type: String,
    /// 初始化前清空数据与 schema
    pub drop_existing: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            init_schema: false,
            schema_type: "complete".to_string(),
            drop_existing: false,
        }
    }
}

// ==========================================
// LoggingConfig - 日志输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// RUST_LOG 未设置时使用的过滤级别
    pub level: String,
    /// JSON 格式输出
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ==========================================
// AppConfig - 顶层配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub import: ImportConfig,
    pub schema: SchemaConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> ImportResult<Self> {
        toml::from_str(text).map_err(|e| ImportError::Config(format!("配置文件解析失败: {}", e)))
    }

    /// 从指定文件加载
    ///
    /// # 返回
    /// - Err(ImportError::Config): 文件不存在或格式错误
    pub fn from_file(path: &Path) -> ImportResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "已加载配置文件");
        Ok(config)
    }

    /// 加载配置
    ///
    /// # 参数
    /// - explicit: 命令行指定的配置文件（必须存在）
    ///
    /// # 逻辑
    /// 1. 指定了文件 → 读取该文件
    /// 2. 否则若默认位置存在配置文件 → 读取
    /// 3. 否则使用默认值
    pub fn load(explicit: Option<&Path>) -> ImportResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// 默认配置文件位置
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
