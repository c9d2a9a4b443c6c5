// ==========================================
// GraphRAG DGraph 导入工具 - 导入结果与状态
// ==========================================
// 用途: 批次统计 / 类别状态机 / 运行汇总
// ==========================================

use crate::domain::category::Category;
use crate::domain::record::GraphRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// ConflictStrategy - 冲突处理策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// 存在则删除后重建（替换语义）
    #[default]
    Upsert,
    /// 不检查存在性，直接插入（允许重复）
    Insert,
    /// 存在则跳过
    Skip,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Upsert => "upsert",
            ConflictStrategy::Insert => "insert",
            ConflictStrategy::Skip => "skip",
        }
    }

    pub fn needs_lookup(&self) -> bool {
        !matches!(self, ConflictStrategy::Insert)
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(ConflictStrategy::Upsert),
            "insert" => Ok(ConflictStrategy::Insert),
            "skip" => Ok(ConflictStrategy::Skip),
            other => Err(format!("未知的冲突策略: {}（可用: upsert, insert, skip）", other)),
        }
    }
}

// ==========================================
// BatchOutcome - 单批次导入结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 本批次写入的记录及其新 uid（供后处理使用）
    pub written: Vec<(GraphRecord, String)>,
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

// ==========================================
// CategoryState - 类别导入状态机
// ==========================================
// pending → reading → converting → importing → post_processing → done | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    Pending,
    Reading,
    Converting,
    Importing,
    PostProcessing,
    Done,
    Failed,
}

impl CategoryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CategoryState::Done | CategoryState::Failed)
    }

    /// 合法转换（failed 可从任一非终态进入）
    pub fn can_transition_to(&self, next: CategoryState) -> bool {
        use CategoryState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Pending, Reading) => true,
            (Reading, Converting) | (Reading, PostProcessing) | (Reading, Done) => true,
            (Converting, Importing) => true,
            (Importing, Reading) | (Importing, Converting) | (Importing, PostProcessing) => true,
            (PostProcessing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CategoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CategoryState::Pending => "pending",
            CategoryState::Reading => "reading",
            CategoryState::Converting => "converting",
            CategoryState::Importing => "importing",
            CategoryState::PostProcessing => "post_processing",
            CategoryState::Done => "done",
            CategoryState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ==========================================
// CategoryReport - 单类别汇总
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub state: CategoryState,
    pub files: Vec<String>,
    pub rows_read: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub edges_created: usize,
    pub unresolved_references: usize,
    /// 未找到源文件（仅在 all 模式下不视为失败）
    pub missing_source: bool,
    /// 错误摘要（最多保留 max_reported_errors 条）
    pub errors: Vec<String>,
    pub errors_truncated: usize,
}

impl CategoryReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            state: CategoryState::Pending,
            files: Vec::new(),
            rows_read: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            edges_created: 0,
            unresolved_references: 0,
            missing_source: false,
            errors: Vec::new(),
            errors_truncated: 0,
        }
    }

    pub fn absorb(&mut self, outcome: &BatchOutcome) {
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.skipped += outcome.skipped;
        self.failed += outcome.failed;
    }

    pub fn push_error(&mut self, message: String, limit: usize) {
        if self.errors.len() < limit {
            self.errors.push(message);
        } else {
            self.errors_truncated += 1;
        }
    }
}

// ==========================================
// ImportReport - 整次运行汇总
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: String,
    pub conflict_strategy: ConflictStrategy,
    pub categories: BTreeMap<Category, CategoryReport>,
    pub halted_by_fail_fast: bool,
    pub elapsed_ms: u128,
}

impl ImportReport {
    pub fn has_failures(&self) -> bool {
        self.categories
            .values()
            .any(|r| r.state == CategoryState::Failed)
    }

    pub fn get(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.get(&category)
    }

    /// 人类可读的汇总表
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{:<17} {:<16} {:>9} {:>9} {:>9} {:>9} {:>8} {:>10}",
            "category", "state", "inserted", "updated", "skipped", "failed", "edges", "unresolved"
        )];
        for report in self.categories.values() {
            lines.push(format!(
                "{:<17} {:<16} {:>9} {:>9} {:>9} {:>9} {:>8} {:>10}",
                report.category.as_str(),
                report.state.to_string(),
                report.inserted,
                report.updated,
                report.skipped,
                report.failed,
                report.edges_created,
                report.unresolved_references,
            ));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use CategoryState::*;
        assert!(Pending.can_transition_to(Reading));
        assert!(Reading.can_transition_to(Converting));
        assert!(Importing.can_transition_to(PostProcessing));
        assert!(PostProcessing.can_transition_to(Done));
        assert!(Converting.can_transition_to(Failed));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Done));
    }

    #[test]
    fn test_conflict_strategy_parse() {
        assert_eq!("UPSERT".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Upsert);
        assert_eq!("skip".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Skip);
        assert!("merge".parse::<ConflictStrategy>().is_err());
        assert!(!ConflictStrategy::Insert.needs_lookup());
    }

    #[test]
    fn test_report_error_limit() {
        let mut report = CategoryReport::new(Category::Entity);
        report.push_error("a".into(), 1);
        report.push_error("b".into(), 1);
        assert_eq!(report.errors, vec!["a".to_string()]);
        assert_eq!(report.errors_truncated, 1);
    }
}
