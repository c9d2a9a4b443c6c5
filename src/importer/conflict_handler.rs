// ==========================================
// GraphRAG DGraph 导入工具 - 冲突处理器
// ==========================================
// 职责: 按冲突策略决定批次内每条记录的写入方式
// - 同批次内重复 id（upsert 保留最后一次，skip 保留第一次）
// - 跨批次 / 已入库 id（依据存储查询结果）
// - 复合唯一键（如关系的 source + target），仅 skip 策略生效
// ==========================================

use crate::domain::record::{scalar_key, GraphRecord};
use crate::domain::report::ConflictStrategy;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 单条计划写入
#[derive(Debug, Clone)]
pub struct PlannedWrite {
    pub record: GraphRecord,
    /// 需要先删除的旧节点（upsert 替换）
    pub replaces: Vec<String>,
}

/// 批次写入计划
#[derive(Debug, Clone, Default)]
pub struct WritePlan {
    pub writes: Vec<PlannedWrite>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl WritePlan {
    pub fn delete_uids(&self) -> Vec<String> {
        self.writes
            .iter()
            .flat_map(|w| w.replaces.iter().cloned())
            .collect()
    }
}

/// 存储中已存在的记录
#[derive(Debug, Clone, Default)]
pub struct ExistingRecords {
    /// id → 已入库 uid
    pub ids: HashMap<String, Vec<String>>,
    /// 已入库的复合键取值
    pub composites: HashSet<Vec<String>>,
}

/// 记录的复合键取值（任一字段缺失则为 None）
pub fn composite_of(record: &GraphRecord, fields: &[&str]) -> Option<Vec<String>> {
    fields
        .iter()
        .map(|field| record.get(field).and_then(scalar_key))
        .collect()
}

pub struct ConflictHandler {
    strategy: ConflictStrategy,
}

impl ConflictHandler {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self { strategy }
    }

    /// 需要查询是否已存在的 id（insert 策略无需查询）
    pub fn lookup_keys(&self, records: &[GraphRecord]) -> Vec<String> {
        if !self.strategy.needs_lookup() {
            return Vec::new();
        }
        let mut keys: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// 需要按复合键查询的字段取值（仅 skip 策略）
    ///
    /// # 返回
    /// - Vec<(字段, 去重后的取值)>
    pub fn composite_lookups(
        &self,
        records: &[GraphRecord],
        composite_key: Option<&[&'static str]>,
    ) -> Vec<(&'static str, Vec<String>)> {
        let Some(fields) = composite_key else {
            return Vec::new();
        };
        if self.strategy != ConflictStrategy::Skip {
            return Vec::new();
        }
        fields
            .iter()
            .map(|field| {
                let mut values: Vec<String> = records
                    .iter()
                    .filter_map(|r| r.get(field).and_then(scalar_key))
                    .collect();
                values.sort();
                values.dedup();
                (*field, values)
            })
            .collect()
    }

    /// 生成写入计划
    ///
    /// # 参数
    /// - records: 已转换的批次记录（保持文件顺序）
    /// - existing: 已入库的 id 与复合键（来自存储查询）
    /// - composite_key: 类别的复合唯一键
    pub fn plan(
        &self,
        records: Vec<GraphRecord>,
        existing: &ExistingRecords,
        composite_key: Option<&[&str]>,
    ) -> WritePlan {
        let mut plan = WritePlan::default();

        match self.strategy {
            ConflictStrategy::Insert => {
                plan.inserted = records.len();
                plan.writes = records
                    .into_iter()
                    .map(|record| PlannedWrite {
                        record,
                        replaces: Vec::new(),
                    })
                    .collect();
            }
            ConflictStrategy::Upsert => {
                // 同 id 仅保留最后一次出现
                let mut last_index: HashMap<String, usize> = HashMap::new();
                for (idx, record) in records.iter().enumerate() {
                    last_index.insert(record.id.clone(), idx);
                }
                for (idx, record) in records.into_iter().enumerate() {
                    if last_index.get(&record.id) != Some(&idx) {
                        plan.updated += 1;
                        continue;
                    }
                    let replaces = existing.ids.get(&record.id).cloned().unwrap_or_default();
                    if replaces.is_empty() {
                        plan.inserted += 1;
                    } else {
                        plan.updated += 1;
                    }
                    plan.writes.push(PlannedWrite { record, replaces });
                }
            }
            ConflictStrategy::Skip => {
                let mut seen: HashSet<String> = HashSet::new();
                let mut seen_composites: HashSet<Vec<String>> = HashSet::new();
                for record in records {
                    let exists = existing.ids.get(&record.id).is_some_and(|uids| !uids.is_empty());
                    if exists || !seen.insert(record.id.clone()) {
                        plan.skipped += 1;
                        continue;
                    }
                    if let Some(key) = composite_key.and_then(|fields| composite_of(&record, fields)) {
                        if existing.composites.contains(&key) || !seen_composites.insert(key) {
                            debug!(id = %record.id, row = record.row_number, "跳过违反复合唯一约束的记录");
                            plan.skipped += 1;
                            continue;
                        }
                    }
                    plan.inserted += 1;
                    plan.writes.push(PlannedWrite {
                        record,
                        replaces: Vec::new(),
                    });
                }
            }
        }

        plan
    }
}
