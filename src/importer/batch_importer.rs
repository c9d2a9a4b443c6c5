// ==========================================
// GraphRAG DGraph 导入工具 - 批量导入器
// ==========================================
// 阶段 3: 按冲突策略写入一个批次（单次原子提交）
// 重试: 仅连接类错误，指数退避 base * 2^attempt
// ==========================================

use crate::config::ImportConfig;
use crate::domain::category::CategorySpec;
use crate::domain::record::GraphRecord;
use crate::domain::report::{BatchOutcome, ConflictStrategy};
use crate::importer::conflict_handler::{
    composite_of, ConflictHandler, ExistingRecords, WritePlan,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::to_store_payload;
use crate::repository::graph_store::{GraphStore, Mutation, NodeWrite};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

pub struct BatchImporter<'a> {
    store: &'a dyn GraphStore,
    handler: ConflictHandler,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl<'a> BatchImporter<'a> {
    /// 创建批量导入器
    ///
    /// # 参数
    /// - store: 图存储
    /// - strategy: 冲突策略
    /// - max_retries: 连接错误最大重试次数
    /// - retry_backoff_ms: 退避基数（毫秒）
    pub fn new(
        store: &'a dyn GraphStore,
        strategy: ConflictStrategy,
        max_retries: u32,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            store,
            handler: ConflictHandler::new(strategy),
            max_retries,
            retry_backoff_ms,
        }
    }

    pub fn from_config(store: &'a dyn GraphStore, config: &ImportConfig) -> Self {
        Self::new(
            store,
            config.conflict_strategy,
            config.max_retries,
            config.retry_backoff_ms,
        )
    }

    /// 导入一个批次
    ///
    /// # 返回
    /// - BatchOutcome: 成功时含写入记录及 uid；重试耗尽或被拒绝时
    ///   全部记录计为 failed，error 为失败原因
    #[instrument(skip(self, spec, records), fields(category = %spec.category, batch = batch_no, size = records.len()))]
    pub async fn import_batch(
        &self,
        spec: &CategorySpec,
        batch_no: usize,
        records: Vec<GraphRecord>,
    ) -> BatchOutcome {
        if records.is_empty() {
            return BatchOutcome::default();
        }

        let total = records.len();
        let mut attempt: u32 = 0;
        loop {
            match self.try_import(spec, &records).await {
                Ok(outcome) => {
                    debug!(
                        inserted = outcome.inserted,
                        updated = outcome.updated,
                        skipped = outcome.skipped,
                        "批次写入完成"
                    );
                    return outcome;
                }
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let wait_ms = self.backoff_ms(attempt);
                    warn!(attempt = attempt + 1, wait_ms, error = %err, "批次写入连接失败，准备重试");
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(attempts = attempt + 1, error = %err, "批次写入失败");
                    return BatchOutcome {
                        failed: total,
                        error: Some(err.to_string()),
                        ..Default::default()
                    };
                }
            }
        }
    }

    fn backoff_ms(&self, attempt: u32) -> u64 {
        self.retry_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt))
    }

    /// 单次尝试：查询已存在 id / 复合键 → 生成计划 → 原子提交
    async fn try_import(
        &self,
        spec: &CategorySpec,
        records: &[GraphRecord],
    ) -> ImportResult<BatchOutcome> {
        let existing = self.find_existing(spec, records).await?;
        let plan = self.handler.plan(records.to_vec(), &existing, spec.composite_key);
        let mutation = build_mutation(&plan, spec);
        let assigned = if mutation.is_empty() {
            HashMap::new()
        } else {
            self.store.commit(mutation).await?
        };

        let mut written = Vec::with_capacity(plan.writes.len());
        for (idx, write) in plan.writes.into_iter().enumerate() {
            let uid = assigned.get(&node_label(idx)).cloned().ok_or_else(|| {
                ImportError::Store(format!("提交结果缺少记录 {} 的 uid", write.record.id))
            })?;
            written.push((write.record, uid));
        }

        Ok(BatchOutcome {
            inserted: plan.inserted,
            updated: plan.updated,
            skipped: plan.skipped,
            failed: 0,
            written,
            error: None,
        })
    }

    /// 查询批次中已入库的 id 与复合键
    async fn find_existing(
        &self,
        spec: &CategorySpec,
        records: &[GraphRecord],
    ) -> ImportResult<ExistingRecords> {
        let mut existing = ExistingRecords::default();

        let keys = self.handler.lookup_keys(records);
        if !keys.is_empty() {
            existing.ids = self.store.find_uids(spec.dgraph_type, "id", &keys).await?;
        }

        let lookups = self.handler.composite_lookups(records, spec.composite_key);
        let Some(fields) = spec.composite_key.filter(|_| !lookups.is_empty()) else {
            return Ok(existing);
        };

        // 每个字段取值 → 命中的 uid 集合，同一 uid 命中全部字段即复合键已存在
        let mut per_field: Vec<HashMap<String, HashSet<String>>> = Vec::with_capacity(lookups.len());
        for (field, values) in &lookups {
            let found = if values.is_empty() {
                HashMap::new()
            } else {
                self.store.find_uids(spec.dgraph_type, field, values).await?
            };
            per_field.push(
                found
                    .into_iter()
                    .map(|(value, uids)| (value, uids.into_iter().collect()))
                    .collect(),
            );
        }

        for record in records {
            let Some(key) = composite_of(record, fields) else {
                continue;
            };
            let mut shared: Option<HashSet<String>> = None;
            for (value, found) in key.iter().zip(&per_field) {
                let uids = found.get(value).cloned().unwrap_or_default();
                shared = Some(match shared {
                    None => uids,
                    Some(prev) => prev.intersection(&uids).cloned().collect(),
                });
            }
            if shared.is_some_and(|uids| !uids.is_empty()) {
                existing.composites.insert(key);
            }
        }
        debug!(
            existing_ids = existing.ids.len(),
            existing_composites = existing.composites.len(),
            "已存在记录查询完成"
        );
        Ok(existing)
    }
}

fn node_label(idx: usize) -> String {
    format!("n{}", idx)
}

/// 写入计划 → 存储变更
fn build_mutation(plan: &WritePlan, spec: &CategorySpec) -> Mutation {
    Mutation {
        delete_uids: plan.delete_uids(),
        set_nodes: plan
            .writes
            .iter()
            .enumerate()
            .map(|(idx, write)| NodeWrite {
                label: node_label(idx),
                dgraph_type: spec.dgraph_type.to_string(),
                xid: write.record.id.clone(),
                payload: to_store_payload(&write.record, spec),
            })
            .collect(),
        set_edges: Vec::new(),
    }
}
