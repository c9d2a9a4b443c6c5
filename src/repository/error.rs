// ==========================================
// GraphRAG DGraph 导入工具 - 图存储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: Connectivity 为唯一可重试错误
// ==========================================

use thiserror::Error;

/// 图存储层错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    // ===== 可重试 =====
    #[error("图存储连接失败: {0}")]
    Connectivity(String),

    // ===== 不可重试 =====
    #[error("图存储拒绝请求: {0}")]
    Rejected(String),

    #[error("图存储响应解析失败: {0}")]
    Decode(String),

    #[error("存储锁获取失败: {0}")]
    Lock(String),

    #[error("SQLite 错误: {0}")]
    Sqlite(String),
}

impl StoreError {
    /// 是否值得重试（仅连接类错误）
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connectivity(_))
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Connectivity(err.to_string())
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) => StoreError::Sqlite(msg.clone()),
            _ => StoreError::Sqlite(err.to_string()),
        }
    }
}

// 实现 From<reqwest::Error>
impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return StoreError::Connectivity(err.to_string());
        }
        if err.is_decode() {
            return StoreError::Decode(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() => StoreError::Connectivity(err.to_string()),
            _ => StoreError::Rejected(err.to_string()),
        }
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Result 类型别名
pub type StoreResult<T> = Result<T, StoreError>;
