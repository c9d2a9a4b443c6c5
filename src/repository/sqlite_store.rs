// ==========================================
// GraphRAG DGraph 导入工具 - SQLite 本地图存储
// ==========================================
// 职责: 以 nodes/edges 两张表模拟 DGraph 的节点与 uid 边（使用 rusqlite）
// 用途: 离线导入、集成测试
// 红线: 只做数据存取，不含导入规则
// ==========================================

use crate::db::{ensure_graph_tables, open_sqlite_connection};
use crate::domain::record::scalar_key;
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::graph_store::{GraphStore, Mutation, StoreBackend};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// uid 渲染为 DGraph 风格的十六进制
pub fn format_uid(uid: i64) -> String {
    format!("0x{:x}", uid)
}

/// 解析 `0x..` 形式的 uid
pub fn parse_uid(uid: &str) -> StoreResult<i64> {
    let digits = uid.trim().trim_start_matches("0x");
    i64::from_str_radix(digits, 16).map_err(|_| StoreError::Rejected(format!("非法 uid: {}", uid)))
}

// ==========================================
// SqliteGraphStore
// ==========================================
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGraphStore {
    /// 打开（或创建）本地图存储
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_graph_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存库（测试用）
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::configure_sqlite_connection(&conn)?;
        ensure_graph_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 获取数据库连接
    fn get_conn(&self) -> StoreResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// 读取节点谓词（不存在返回 None）
    pub fn node_body(&self, uid: &str) -> StoreResult<Option<Map<String, Value>>> {
        let conn = self.get_conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM nodes WHERE uid = ?1",
                params![parse_uid(uid)?],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            None => Ok(None),
            Some(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => Ok(Some(map)),
                other => Err(StoreError::Decode(format!("节点 body 不是对象: {}", other))),
            },
        }
    }

    /// 已定义的谓词（名称, 声明）
    pub fn schema_predicates(&self) -> StoreResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT name, declaration FROM schema_predicate ORDER BY name")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut predicates = Vec::new();
        for row in rows {
            predicates.push(row?);
        }
        Ok(predicates)
    }

    /// 已定义的类型名
    pub fn schema_types(&self) -> StoreResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT name FROM schema_type ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut types = Vec::new();
        for row in rows {
            types.push(row?);
        }
        Ok(types)
    }
}

/// schema 文本解析结果
#[derive(Debug, Default, PartialEq)]
struct ParsedSchema {
    predicates: Vec<(String, String)>,
    types: Vec<(String, Vec<String>)>,
}

/// 解析 DGraph schema 文本（`name: decl .` 与 `type T { ... }`）
fn parse_schema_text(schema: &str) -> StoreResult<ParsedSchema> {
    let mut parsed = ParsedSchema::default();
    let mut current_type: Option<(String, Vec<String>)> = None;

    for raw in schema.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((name, mut fields)) = current_type.take() {
            if line == "}" {
                parsed.types.push((name, fields));
            } else {
                fields.push(line.to_string());
                current_type = Some((name, fields));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("type ") {
            let name = rest.trim_end_matches('{').trim();
            if name.is_empty() {
                return Err(StoreError::Rejected(format!("schema 类型声明缺少名称: {}", line)));
            }
            current_type = Some((name.to_string(), Vec::new()));
            continue;
        }

        let body = line
            .strip_suffix('.')
            .ok_or_else(|| StoreError::Rejected(format!("schema 行缺少结尾 '.': {}", line)))?;
        let (name, declaration) = body
            .split_once(':')
            .ok_or_else(|| StoreError::Rejected(format!("无法解析 schema 行: {}", line)))?;
        parsed
            .predicates
            .push((name.trim().to_string(), declaration.trim().to_string()));
    }

    if let Some((name, _)) = current_type {
        return Err(StoreError::Rejected(format!("类型 {} 缺少结尾 '}}'", name)));
    }
    Ok(parsed)
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    async fn health(&self) -> StoreResult<()> {
        let conn = self.get_conn()?;
        conn.query_row("SELECT 1", [], |_row| Ok(()))?;
        Ok(())
    }

    async fn alter_schema(&self, schema: &str) -> StoreResult<()> {
        let parsed = parse_schema_text(schema)?;
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for (name, declaration) in &parsed.predicates {
            tx.execute(
                "INSERT OR REPLACE INTO schema_predicate (name, declaration) VALUES (?1, ?2)",
                params![name, declaration],
            )?;
        }
        for (name, fields) in &parsed.types {
            tx.execute(
                "INSERT OR REPLACE INTO schema_type (name, fields) VALUES (?1, ?2)",
                params![name, fields.join(",")],
            )?;
        }
        tx.commit()?;

        debug!(
            predicates = parsed.predicates.len(),
            types = parsed.types.len(),
            "本地图存储 schema 已更新"
        );
        Ok(())
    }

    async fn drop_all(&self) -> StoreResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "DELETE FROM edges; DELETE FROM nodes; DELETE FROM schema_predicate; DELETE FROM schema_type;",
        )?;
        Ok(())
    }

    async fn find_uids(
        &self,
        dgraph_type: &str,
        predicate: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, Vec<String>>> {
        let conn = self.get_conn()?;
        let mut found: HashMap<String, Vec<String>> = HashMap::new();

        if predicate == "id" {
            let mut stmt = conn.prepare(
                "SELECT uid FROM nodes WHERE dgraph_type = ?1 AND xid = ?2 ORDER BY uid",
            )?;
            for key in keys {
                if found.contains_key(key) {
                    continue;
                }
                let rows = stmt.query_map(params![dgraph_type, key], |row| row.get::<_, i64>(0))?;
                let mut uids = Vec::new();
                for uid in rows {
                    uids.push(format_uid(uid?));
                }
                if !uids.is_empty() {
                    found.insert(key.clone(), uids);
                }
            }
            return Ok(found);
        }

        // 非 id 谓词：比较 body 中的字段值（列表谓词按元素匹配）
        let path = format!("$.{}", predicate);
        let mut stmt = conn.prepare(
            "SELECT uid, json_extract(body, ?2) FROM nodes WHERE dgraph_type = ?1 AND json_extract(body, ?2) IS NOT NULL ORDER BY uid",
        )?;
        let rows = stmt.query_map(params![dgraph_type, path], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, rusqlite::types::Value>(1)?))
        })?;

        for row in rows {
            let (uid, raw) = row?;
            let values: Vec<String> = match raw {
                rusqlite::types::Value::Integer(i) => vec![i.to_string()],
                rusqlite::types::Value::Real(f) => scalar_key(&serde_json::json!(f)).into_iter().collect(),
                rusqlite::types::Value::Text(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(Value::Array(items)) => items.iter().filter_map(scalar_key).collect(),
                    _ => vec![text],
                },
                _ => Vec::new(),
            };
            for value in values {
                if keys.contains(&value) {
                    found.entry(value).or_default().push(format_uid(uid));
                }
            }
        }
        Ok(found)
    }

    async fn commit(&self, mutation: Mutation) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut assigned: HashMap<String, String> = HashMap::new();

        for uid in &mutation.delete_uids {
            tx.execute("DELETE FROM nodes WHERE uid = ?1", params![parse_uid(uid)?])?;
        }

        for node in &mutation.set_nodes {
            let body = serde_json::to_string(&Value::Object(node.payload.clone()))?;
            tx.execute(
                "INSERT INTO nodes (dgraph_type, xid, body) VALUES (?1, ?2, ?3)",
                params![node.dgraph_type, node.xid, body],
            )?;
            assigned.insert(node.label.clone(), format_uid(tx.last_insert_rowid()));
        }

        // 边端点可引用本次提交的空白节点 `_:label`
        let resolve = |uid: &str| -> StoreResult<i64> {
            match uid.strip_prefix("_:") {
                Some(label) => assigned
                    .get(label)
                    .ok_or_else(|| StoreError::Rejected(format!("未知的空白节点: {}", uid)))
                    .and_then(|u| parse_uid(u)),
                None => parse_uid(uid),
            }
        };
        for edge in &mutation.set_edges {
            tx.execute(
                "INSERT OR IGNORE INTO edges (src_uid, predicate, dst_uid) VALUES (?1, ?2, ?3)",
                params![resolve(&edge.from_uid)?, edge.predicate, resolve(&edge.to_uid)?],
            )?;
        }

        tx.commit()?;
        Ok(assigned)
    }

    async fn count(&self, dgraph_type: &str) -> StoreResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE dgraph_type = ?1",
            params![dgraph_type],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    async fn edges_from(&self, uid: &str, predicate: &str) -> StoreResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT dst_uid FROM edges WHERE src_uid = ?1 AND predicate = ?2 ORDER BY dst_uid",
        )?;
        let rows = stmt.query_map(params![parse_uid(uid)?, predicate], |row| row.get::<_, i64>(0))?;
        let mut targets = Vec::new();
        for target in rows {
            targets.push(format_uid(target?));
        }
        Ok(targets)
    }

    async fn close(&self) -> StoreResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch("PRAGMA optimize;")?;
        debug!("本地图存储已关闭");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::graph_store::{EdgeWrite, NodeWrite};
    use serde_json::json;

    fn node(label: &str, dgraph_type: &str, xid: &str, payload: Value) -> NodeWrite {
        NodeWrite {
            label: label.to_string(),
            dgraph_type: dgraph_type.to_string(),
            xid: xid.to_string(),
            payload: payload.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_uid_format_roundtrip() {
        assert_eq!(format_uid(255), "0xff");
        assert_eq!(parse_uid("0xff").unwrap(), 255);
        assert!(parse_uid("xyz").is_err());
    }

    #[test]
    fn test_parse_schema_text() {
        let parsed = parse_schema_text(
            "# comment\nid: string @index(exact) .\ntype Document {\n  id\n}\n",
        )
        .unwrap();
        assert_eq!(
            parsed.predicates,
            vec![("id".to_string(), "string @index(exact)".to_string())]
        );
        assert_eq!(parsed.types, vec![("Document".to_string(), vec!["id".to_string()])]);
        assert!(parse_schema_text("id string").is_err());
    }

    #[tokio::test]
    async fn test_commit_and_lookup() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let mutation = Mutation {
            set_nodes: vec![
                node("n0", "Community", "c1", json!({"id": "c1", "community": 3})),
                node("n1", "Entity", "e1", json!({"id": "e1", "title": "ALICE"})),
            ],
            set_edges: vec![EdgeWrite::new("_:n0", "entities", "_:n1")],
            ..Default::default()
        };
        let uids = store.commit(mutation).await.unwrap();
        assert_eq!(uids.len(), 2);

        let by_number = store
            .find_uids("Community", "community", &["3".to_string(), "4".to_string()])
            .await
            .unwrap();
        assert_eq!(by_number.get("3"), Some(&vec![uids["n0"].clone()]));
        assert!(!by_number.contains_key("4"));

        let by_title = store
            .find_uids("Entity", "title", &["ALICE".to_string()])
            .await
            .unwrap();
        assert_eq!(by_title["ALICE"], vec![uids["n1"].clone()]);

        assert_eq!(
            store.edges_from(&uids["n0"], "entities").await.unwrap(),
            vec![uids["n1"].clone()]
        );
        assert_eq!(store.count("Entity").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_edges() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let uids = store
            .commit(Mutation {
                set_nodes: vec![
                    node("a", "TextUnit", "t1", json!({"id": "t1"})),
                    node("b", "Document", "d1", json!({"id": "d1"})),
                ],
                set_edges: vec![EdgeWrite::new("_:a", "documents", "_:b")],
                ..Default::default()
            })
            .await
            .unwrap();

        store
            .commit(Mutation {
                delete_uids: vec![uids["b"].clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(store.node_body(&uids["b"]).unwrap().is_none());
        assert!(store.edges_from(&uids["a"], "documents").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edge_to_missing_node_is_rejected_atomically() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let result = store
            .commit(Mutation {
                set_nodes: vec![node("a", "Entity", "e1", json!({"id": "e1"}))],
                set_edges: vec![EdgeWrite::new("_:a", "related_entities", "0x999")],
                ..Default::default()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.count("Entity").await.unwrap(), 0);
    }
}
