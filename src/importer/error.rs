// ==========================================
// GraphRAG DGraph 导入工具 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 存储层连接错误保持为 Connectivity，供批次重试判断
// ==========================================

use crate::repository::error::StoreError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("未找到数据文件: {0}")]
    NotFound(String),

    #[error("文件格式错误: {0}")]
    Format(String),

    #[error("文件读取失败: {0}")]
    Io(String),

    // ===== 记录校验错误 =====
    #[error("必填字段缺失 ({category} 行 {row}): {}", .fields.join(", "))]
    MissingFields {
        category: String,
        row: usize,
        fields: Vec<String>,
    },

    #[error("字段值非法 ({category} 行 {row}, 字段 {field}): {message}")]
    InvalidField {
        category: String,
        row: usize,
        field: String,
        message: String,
    },

    // ===== 图存储错误 =====
    #[error("图数据库连接失败: {0}")]
    Connectivity(String),

    #[error("引用无法解析 ({category}.{field} → {target}): {key}")]
    Reference {
        category: String,
        field: String,
        target: String,
        key: String,
    },

    #[error("schema 错误 ({category}): {message}")]
    Schema { category: String, message: String },

    #[error("图存储错误: {0}")]
    Store(String),

    // ===== 配置错误 =====
    #[error("配置错误: {0}")]
    Config(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为记录级校验错误（跳过该记录，不中断类别）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ImportError::MissingFields { .. } | ImportError::InvalidField { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ImportError::Connectivity(_))
    }
}

// 实现 From<StoreError>（连接错误保持可重试语义）
impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connectivity(msg) => ImportError::Connectivity(msg),
            other => ImportError::Store(other.to_string()),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ImportError::NotFound(err.to_string()),
            _ => ImportError::Io(err.to_string()),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Format(format!("CSV 解析失败: {}", err))
    }
}

// 实现 From<polars::error::PolarsError>
impl From<polars::error::PolarsError> for ImportError {
    fn from(err: polars::error::PolarsError) -> Self {
        ImportError::Format(format!("parquet 解析失败: {}", err))
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::from(err).into()
    }
}

// 实现 From<reqwest::Error>
impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::from(err).into()
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Format(format!("JSON 解析失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
