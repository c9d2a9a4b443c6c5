// ==========================================
// GraphRAG DGraph 导入工具 - 记录转换器
// ==========================================
// 阶段 2: RawRow → GraphRecord（字段类型归一）
// 职责: 列表 / 数值 / JSON / 日期 / 文本字段转换 + 存储编码
// ==========================================

use crate::domain::category::{CategorySpec, NumericKind};
use crate::domain::record::{scalar_key, GraphRecord, RawRow};
use crate::importer::dq_validator::{missing_required, DqValidator};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

/// 统一输出的日期格式
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ==========================================
// FieldMapper - 转换 + 业务校验
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapper {
    validator: DqValidator,
}

impl FieldMapper {
    pub fn new(validate_id_format: bool) -> Self {
        Self {
            validator: DqValidator::new(validate_id_format),
        }
    }

    /// 转换并执行业务层 / 存储层校验
    pub fn map_row(&self, row: &RawRow, spec: &CategorySpec) -> ImportResult<GraphRecord> {
        let record = convert(row, spec)?;
        self.validator.validate(&record, spec)?;
        Ok(record)
    }
}

/// 原始行 → 类型化记录
///
/// # 返回
/// - Err(ImportError::MissingFields): 列出全部缺失的必填字段
/// - Err(ImportError::InvalidField): 必填数值字段无法转换
///
/// 未声明的列被忽略；可选字段缺失时为 null / 空列表
pub fn convert(row: &RawRow, spec: &CategorySpec) -> ImportResult<GraphRecord> {
    let missing = missing_required(row, spec);
    if !missing.is_empty() {
        return Err(ImportError::MissingFields {
            category: spec.category.to_string(),
            row: row.row_number,
            fields: missing,
        });
    }

    let mut fields = Map::new();
    for field in spec.all_fields() {
        let raw = row.get(field);
        let required = spec.required_fields.contains(&field);

        // ===== 列表字段 =====
        if spec.is_list_field(field) {
            let mut items = parse_list(raw);
            if let Some(kind) = spec.numeric_kind(field) {
                items = items
                    .iter()
                    .filter_map(|item| {
                        let coerced = coerce_numeric(item, kind);
                        if coerced.is_none() {
                            debug!(category = %spec.category, row = row.row_number, field, value = %item, "列表元素无法转换为数值，已丢弃");
                        }
                        coerced
                    })
                    .collect();
            }
            fields.insert(field.to_string(), Value::Array(items));
            continue;
        }

        let Some(value) = raw else {
            fields.insert(field.to_string(), Value::Null);
            continue;
        };

        let converted = if let Some(kind) = spec.numeric_kind(field) {
            match coerce_numeric(value, kind) {
                Some(v) => v,
                None if required => {
                    return Err(ImportError::InvalidField {
                        category: spec.category.to_string(),
                        row: row.row_number,
                        field: field.to_string(),
                        message: format!("无法转换为 {:?}: {}", kind, value),
                    });
                }
                None => {
                    debug!(category = %spec.category, row = row.row_number, field, value = %value, "可选数值字段无法转换，已丢弃");
                    Value::Null
                }
            }
        } else if spec.is_json_field(field) {
            parse_json_field(value)
        } else if spec.is_date_field(field) {
            match normalize_date(value) {
                Some(date) => Value::String(date),
                None => {
                    warn!(category = %spec.category, row = row.row_number, field, value = %value, "日期格式无法识别，已丢弃");
                    Value::Null
                }
            }
        } else if spec.is_text_field(field) || field == "id" {
            Value::String(stringify(value))
        } else {
            value.clone()
        };
        fields.insert(field.to_string(), converted);
    }

    // 必填校验已保证 id 存在
    let id = fields
        .get("id")
        .and_then(scalar_key)
        .ok_or_else(|| ImportError::MissingFields {
            category: spec.category.to_string(),
            row: row.row_number,
            fields: vec!["id".to_string()],
        })?;

    Ok(GraphRecord {
        category: spec.category,
        id,
        row_number: row.row_number,
        fields,
    })
}

/// 列表字段解析
///
/// - 数组: 原样保留（去掉 null）
/// - `[` 开头的字符串: JSON 数组，兼容 numpy 风格 `['a' 'b']`
/// - 其他字符串: 按逗号切分
/// - 缺失: 空列表
pub fn parse_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                match serde_json::from_str::<Vec<Value>>(trimmed) {
                    Ok(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
                    Err(_) => parse_python_list(trimmed)
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                }
            } else {
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect()
            }
        }
        Some(other) => vec![other.clone()],
    }
}

/// numpy / Python repr 风格列表: `['a' 'b']`、`['a', 'b']`、`[1 2 3]`
fn parse_python_list(text: &str) -> Vec<String> {
    let inner = text.trim_start_matches('[').trim_end_matches(']');
    let mut tokens = Vec::new();
    let mut chars = inner.chars().peekable();
    let mut bare = String::new();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let mut quoted = String::new();
                for next in chars.by_ref() {
                    if next == c {
                        break;
                    }
                    quoted.push(next);
                }
                tokens.push(quoted);
            }
            ',' | ' ' | '\n' | '\t' => {
                if !bare.is_empty() {
                    tokens.push(std::mem::take(&mut bare));
                }
            }
            _ => bare.push(c),
        }
    }
    if !bare.is_empty() {
        tokens.push(bare);
    }
    tokens.retain(|t| !t.trim().is_empty());
    tokens
}

/// 数值转换（整数字段截断小数部分）
pub fn coerce_numeric(value: &Value, kind: NumericKind) -> Option<Value> {
    let as_float = match value {
        Value::Number(n) => {
            if kind == NumericKind::Int {
                if let Some(i) = n.as_i64() {
                    return Some(Value::from(i));
                }
            }
            n.as_f64()?
        }
        Value::String(s) => {
            let s = s.trim();
            if kind == NumericKind::Int {
                if let Ok(i) = s.parse::<i64>() {
                    return Some(Value::from(i));
                }
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };

    if !as_float.is_finite() {
        return None;
    }
    match kind {
        NumericKind::Int => Some(Value::from(as_float.trunc() as i64)),
        NumericKind::Float => Number::from_f64(as_float).map(Value::Number),
    }
}

/// JSON 字段：字符串尝试解析，失败保留原文
pub fn parse_json_field(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

/// 日期归一为 `YYYY-MM-DDTHH:MM:SS`
///
/// 支持: RFC 3339 / `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD`
pub fn normalize_date(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc().format(ISO_DATETIME_FORMAT).to_string());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.format(ISO_DATETIME_FORMAT).to_string());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(ISO_DATETIME_FORMAT).to_string())
}

/// 文本化；列表元素以 "; " 连接并丢弃 null
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(stringify)
            .collect::<Vec<_>>()
            .join("; "),
        other => scalar_key(other).unwrap_or_else(|| other.to_string()),
    }
}

/// 记录 → 存储写入的谓词映射
///
/// - 跳过 null、空白字符串、空列表
/// - 对象 / JSON 字段序列化为字符串
/// - 按类别规格重命名谓词（`type` → `entity_type` 等）
pub fn to_store_payload(record: &GraphRecord, spec: &CategorySpec) -> Map<String, Value> {
    let mut payload = Map::new();
    for (field, value) in &record.fields {
        let encoded = match value {
            Value::Null => continue,
            Value::String(s) if s.trim().is_empty() => continue,
            Value::Array(items) if items.is_empty() => continue,
            Value::Array(_) if spec.is_json_field(field) => Value::String(value.to_string()),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Array(_) | Value::Object(_) => Value::String(item.to_string()),
                        scalar => scalar.clone(),
                    })
                    .collect(),
            ),
            Value::Object(_) => Value::String(value.to_string()),
            scalar => scalar.clone(),
        };
        payload.insert(spec.predicate_for(field).to_string(), encoded);
    }
    payload
}
