// ==========================================
// GraphRAG DGraph 导入工具 - 数据质量校验器
// ==========================================
// 分层校验:
// - 文件层: 必需列存在
// - 记录层: 必填字段非空
// - 业务层: 文本长度上限、列表最少元素（社区至少一个成员实体）
// - 存储层: ID 格式（可配置开关）
// ==========================================

use crate::domain::category::{CategorySpec, IdFormat};
use crate::domain::record::{GraphRecord, RawRow};
use crate::importer::error::{ImportError, ImportResult};

/// 文件层：列集合必须包含全部必填字段
pub fn check_columns(spec: &CategorySpec, columns: &[String]) -> ImportResult<()> {
    let missing: Vec<&str> = spec
        .required_fields
        .iter()
        .copied()
        .filter(|field| !columns.iter().any(|c| c == field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::Format(format!(
            "{} 文件缺少必需列: {}",
            spec.category,
            missing.join(", ")
        )))
    }
}

/// 记录层：缺失（不存在 / null / 空白）的必填字段
pub fn missing_required(row: &RawRow, spec: &CategorySpec) -> Vec<String> {
    spec.required_fields
        .iter()
        .filter(|field| row.get(field).is_none())
        .map(|field| field.to_string())
        .collect()
}

/// 十六进制哈希 ID（≥32 位）
pub fn is_hash_id(id: &str) -> bool {
    id.len() >= 32 && id.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_uuid_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

// ==========================================
// DqValidator - 业务层 / 存储层校验
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct DqValidator {
    validate_id_format: bool,
}

impl DqValidator {
    pub fn new(validate_id_format: bool) -> Self {
        Self { validate_id_format }
    }

    /// 校验已转换记录
    ///
    /// # 返回
    /// - Err(ImportError::InvalidField): 超长文本、列表元素不足或 ID 格式不符
    pub fn validate(&self, record: &GraphRecord, spec: &CategorySpec) -> ImportResult<()> {
        for (field, max) in spec.max_lengths {
            if let Some(text) = record.get_str(field) {
                let len = text.chars().count();
                if len > *max {
                    return Err(self.invalid(
                        record,
                        field,
                        format!("长度 {} 超过上限 {}", len, max),
                    ));
                }
            }
        }

        for (field, min) in spec.min_list_lengths {
            let len = record.get_list(field).len();
            if len < *min {
                return Err(self.invalid(
                    record,
                    field,
                    format!("至少需要 {} 个元素，实际 {}", min, len),
                ));
            }
        }

        if self.validate_id_format {
            let ok = match spec.id_format {
                IdFormat::Hash => is_hash_id(&record.id),
                IdFormat::Uuid => is_uuid_id(&record.id),
                IdFormat::Unchecked => true,
            };
            if !ok {
                return Err(self.invalid(
                    record,
                    "id",
                    format!("ID 格式不符合 {:?}: {}", spec.id_format, record.id),
                ));
            }
        }
        Ok(())
    }

    fn invalid(&self, record: &GraphRecord, field: &str, message: String) -> ImportError {
        ImportError::InvalidField {
            category: record.category.to_string(),
            row: record.row_number,
            field: field.to_string(),
            message,
        }
    }
}
