// ==========================================
// GraphRAG DGraph 导入工具 - 导入配置
// ==========================================
// 职责: 单次导入运行的不可变参数（构建后传入 run_import）
// 红线: 不含 I/O，不含导入逻辑
// ==========================================

use crate::domain::category::Category;
use crate::domain::report::ConflictStrategy;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ==========================================
// CategorySelection - 导入类别选择
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum CategorySelection {
    #[default]
    All,
    Only(Vec<Category>),
}

impl CategorySelection {
    /// 解析 `--types` 参数（`all` 或一个/多个类别名）
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self, String> {
        if values.is_empty() {
            return Err("未指定导入类别".to_string());
        }
        if values.iter().any(|v| v.as_ref().trim().eq_ignore_ascii_case("all")) {
            return Ok(CategorySelection::All);
        }
        let mut categories = Vec::with_capacity(values.len());
        for value in values {
            let category: Category = value.as_ref().parse()?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        Ok(CategorySelection::Only(categories))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CategorySelection::All)
    }

    /// 按依赖顺序排列的待导入类别（与输入顺序无关）
    pub fn ordered(&self) -> Vec<Category> {
        match self {
            CategorySelection::All => Category::ORDER.to_vec(),
            CategorySelection::Only(selected) => Category::ORDER
                .iter()
                .copied()
                .filter(|c| selected.contains(c))
                .collect(),
        }
    }
}

impl TryFrom<Vec<String>> for CategorySelection {
    type Error = String;

    fn try_from(values: Vec<String>) -> Result<Self, Self::Error> {
        CategorySelection::parse(&values)
    }
}

impl From<CategorySelection> for Vec<String> {
    fn from(selection: CategorySelection) -> Self {
        match selection {
            CategorySelection::All => vec!["all".to_string()],
            CategorySelection::Only(categories) => {
                categories.iter().map(|c| c.as_str().to_string()).collect()
            }
        }
    }
}

// ==========================================
// ImportConfig - 导入参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// GraphRAG 输出目录
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub conflict_strategy: ConflictStrategy,
    pub categories: CategorySelection,
    /// 仅在 categories = all 时生效
    pub fail_fast: bool,
    /// 连接类错误的最大重试次数
    pub max_retries: u32,
    /// 重试退避基数（毫秒），第 n 次重试等待 base * 2^n
    pub retry_backoff_ms: u64,
    /// 是否校验存储层 ID 格式
    pub validate_id_format: bool,
    /// 每个类别报告中保留的错误条数
    pub max_reported_errors: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./output"),
            batch_size: 1000,
            conflict_strategy: ConflictStrategy::Upsert,
            categories: CategorySelection::All,
            fail_fast: false,
            max_retries: 3,
            retry_backoff_ms: 500,
            validate_id_format: false,
            max_reported_errors: 20,
        }
    }
}

impl ImportConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// 参数校验
    ///
    /// # 返回
    /// - Err(ImportError::Config): batch_size 为 0 或类别列表为空
    pub fn validate(&self) -> ImportResult<()> {
        if self.batch_size == 0 {
            return Err(ImportError::Config("batch_size 必须为正整数".to_string()));
        }
        if let CategorySelection::Only(categories) = &self.categories {
            if categories.is_empty() {
                return Err(ImportError::Config("导入类别列表为空".to_string()));
            }
        }
        Ok(())
    }
}
