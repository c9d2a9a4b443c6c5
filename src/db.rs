// ==========================================
// GraphRAG DGraph 导入工具 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一本地图存储 Connection::open 的 PRAGMA 行为（边表依赖外键级联）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前本地图存储的表结构版本
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 本地图存储表结构
///
/// - nodes: 节点（uid 自增，body 为谓词 JSON）
/// - edges: uid 边（两端节点删除时级联删除）
/// - schema_predicate / schema_type: alter_schema 写入的定义
const GRAPH_TABLES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS nodes (
    uid INTEGER PRIMARY KEY AUTOINCREMENT,
    dgraph_type TEXT NOT NULL,
    xid TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_type_xid ON nodes(dgraph_type, xid);

CREATE TABLE IF NOT EXISTS edges (
    src_uid INTEGER NOT NULL REFERENCES nodes(uid) ON DELETE CASCADE,
    predicate TEXT NOT NULL,
    dst_uid INTEGER NOT NULL REFERENCES nodes(uid) ON DELETE CASCADE,
    UNIQUE(src_uid, predicate, dst_uid)
);
CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst_uid);

CREATE TABLE IF NOT EXISTS schema_predicate (
    name TEXT PRIMARY KEY,
    declaration TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_type (
    name TEXT PRIMARY KEY,
    fields TEXT NOT NULL
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等），首次建库时写入 schema_version
pub fn ensure_graph_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(GRAPH_TABLES_DDL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_graph_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_graph_tables(&conn).unwrap();
        ensure_graph_tables(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
