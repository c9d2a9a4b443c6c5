// ==========================================
// GraphRAG DGraph 导入工具 - DGraph HTTP 存储
// ==========================================
// 接口: DGraph Alpha HTTP（/health /alter /mutate /query）
// 工具: reqwest 异步客户端
// 约定: 连接失败/超时/5xx → Connectivity；响应 errors → Rejected
// ==========================================

use crate::domain::record::scalar_key;
use crate::repository::error::{StoreError, StoreResult};
use crate::repository::graph_store::{GraphStore, Mutation, StoreBackend};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info};

/// 单次 eq() 查询携带的最大键数
const LOOKUP_CHUNK_SIZE: usize = 500;

// ==========================================
// DgraphStore
// ==========================================
pub struct DgraphStore {
    client: Client,
    base_url: String,
}

impl DgraphStore {
    /// 创建 DGraph 客户端
    ///
    /// # 参数
    /// - host: 主机名（可带 http:// 或 https:// 前缀）
    /// - port: Alpha HTTP 端口（默认 8080）
    /// - timeout: 单次请求超时
    pub fn new(host: &str, port: u16, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url(host, port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 发送请求并统一解析 DGraph 响应
    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_response(status, &text)
    }

    async fn query(&self, dql: &str) -> StoreResult<Value> {
        debug!(dql = %dql, "DGraph 查询");
        self.send(
            self.client
                .post(self.url("/query"))
                .header("Content-Type", "application/dql")
                .body(dql.to_string()),
        )
        .await
    }
}

fn base_url(host: &str, port: u16) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

/// 状态码 + 响应体 → JSON 或错误
fn parse_response(status: StatusCode, text: &str) -> StoreResult<Value> {
    if status.is_server_error() {
        return Err(StoreError::Connectivity(format!(
            "DGraph 返回 {}: {}",
            status,
            truncate(text, 200)
        )));
    }

    let body: Value = serde_json::from_str(text).map_err(|e| {
        if status.is_success() {
            StoreError::Decode(format!("{}: {}", e, truncate(text, 200)))
        } else {
            StoreError::Rejected(format!("DGraph 返回 {}: {}", status, truncate(text, 200)))
        }
    })?;

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return Err(StoreError::Rejected(messages.join("; ")));
        }
    }

    if !status.is_success() {
        return Err(StoreError::Rejected(format!("DGraph 返回 {}", status)));
    }
    Ok(body)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// DQL 字符串字面量（JSON 转义与 DQL 兼容）
fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// 按谓词值批量查找的 DQL
pub fn build_lookup_query(dgraph_type: &str, predicate: &str, keys: &[String]) -> String {
    let values: Vec<String> = keys.iter().map(|k| quote(k)).collect();
    format!(
        "{{ q(func: eq(<{pred}>, [{values}])) @filter(type({ty})) {{ uid key: <{pred}> }} }}",
        pred = predicate,
        values = values.join(", "),
        ty = dgraph_type,
    )
}

/// Mutation → /mutate 请求体
pub fn build_mutation_body(mutation: &Mutation) -> Value {
    let mut set: Vec<Value> = Vec::with_capacity(mutation.set_nodes.len() + mutation.set_edges.len());

    for node in &mutation.set_nodes {
        let mut object = Map::new();
        object.insert("uid".to_string(), json!(format!("_:{}", node.label)));
        object.insert("dgraph.type".to_string(), json!(node.dgraph_type));
        for (predicate, value) in &node.payload {
            object.insert(predicate.clone(), value.clone());
        }
        set.push(Value::Object(object));
    }

    for edge in &mutation.set_edges {
        let mut object = Map::new();
        object.insert("uid".to_string(), json!(edge.from_uid));
        object.insert(edge.predicate.clone(), json!({ "uid": edge.to_uid }));
        set.push(Value::Object(object));
    }

    let mut body = Map::new();
    if !set.is_empty() {
        body.insert("set".to_string(), Value::Array(set));
    }
    if !mutation.delete_uids.is_empty() {
        let delete: Vec<Value> = mutation
            .delete_uids
            .iter()
            .map(|uid| json!({ "uid": uid }))
            .collect();
        body.insert("delete".to_string(), Value::Array(delete));
    }
    Value::Object(body)
}

/// 查询结果 data.q 列表
fn result_rows(body: &Value) -> &[Value] {
    body.pointer("/data/q")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[async_trait]
impl GraphStore for DgraphStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Dgraph
    }

    async fn health(&self) -> StoreResult<()> {
        let response = self.client.get(self.url("/health")).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Connectivity(format!(
                "DGraph 健康检查失败: {}",
                response.status()
            )))
        }
    }

    async fn alter_schema(&self, schema: &str) -> StoreResult<()> {
        self.send(self.client.post(self.url("/alter")).body(schema.to_string()))
            .await?;
        Ok(())
    }

    async fn drop_all(&self) -> StoreResult<()> {
        self.send(
            self.client
                .post(self.url("/alter"))
                .json(&json!({ "drop_all": true })),
        )
        .await?;
        info!(url = %self.base_url, "DGraph 数据与 schema 已清空");
        Ok(())
    }

    async fn find_uids(
        &self,
        dgraph_type: &str,
        predicate: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, Vec<String>>> {
        let wanted: BTreeSet<&String> = keys.iter().collect();
        let unique: Vec<String> = wanted.iter().map(|k| (*k).clone()).collect();
        let mut found: HashMap<String, Vec<String>> = HashMap::new();

        for chunk in unique.chunks(LOOKUP_CHUNK_SIZE) {
            let body = self
                .query(&build_lookup_query(dgraph_type, predicate, chunk))
                .await?;
            for row in result_rows(&body) {
                let Some(uid) = row.get("uid").and_then(Value::as_str) else {
                    continue;
                };
                let values: Vec<String> = match row.get("key") {
                    Some(Value::Array(items)) => items.iter().filter_map(scalar_key).collect(),
                    Some(value) => scalar_key(value).into_iter().collect(),
                    None => Vec::new(),
                };
                for value in values {
                    if wanted.contains(&value) {
                        found.entry(value).or_default().push(uid.to_string());
                    }
                }
            }
        }
        Ok(found)
    }

    async fn commit(&self, mutation: Mutation) -> StoreResult<HashMap<String, String>> {
        if mutation.is_empty() {
            return Ok(HashMap::new());
        }
        let body = self
            .send(
                self.client
                    .post(self.url("/mutate?commitNow=true"))
                    .json(&build_mutation_body(&mutation)),
            )
            .await?;

        let mut assigned = HashMap::new();
        if let Some(uids) = body.pointer("/data/uids").and_then(Value::as_object) {
            for (label, uid) in uids {
                if let Some(uid) = uid.as_str() {
                    assigned.insert(label.clone(), uid.to_string());
                }
            }
        }
        for node in &mutation.set_nodes {
            if !assigned.contains_key(&node.label) {
                return Err(StoreError::Decode(format!(
                    "DGraph 未返回节点 {} 的 uid",
                    node.label
                )));
            }
        }
        Ok(assigned)
    }

    async fn count(&self, dgraph_type: &str) -> StoreResult<usize> {
        let dql = format!("{{ q(func: type({})) {{ total: count(uid) }} }}", dgraph_type);
        let body = self.query(&dql).await?;
        Ok(result_rows(&body)
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize)
    }

    async fn edges_from(&self, uid: &str, predicate: &str) -> StoreResult<Vec<String>> {
        let dql = format!("{{ q(func: uid({})) {{ p: <{}> {{ uid }} }} }}", uid, predicate);
        let body = self.query(&dql).await?;
        let targets = match result_rows(&body).first().and_then(|row| row.get("p")) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.get("uid").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
            Some(item) => item
                .get("uid")
                .and_then(Value::as_str)
                .map(|u| vec![u.to_string()])
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(targets)
    }

    async fn close(&self) -> StoreResult<()> {
        debug!(url = %self.base_url, "DGraph 客户端已关闭");
        Ok(())
    }
}
