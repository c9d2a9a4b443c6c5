// ==========================================
// GraphRAG DGraph 导入工具 - 导入记录
// ==========================================
// 用途: 导入管道中间产物（文件读取 → RawRow → GraphRecord）
// 生命周期: 仅在单次导入流程内
// ==========================================

use crate::domain::category::Category;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

// ==========================================
// RawRow - 原始行
// ==========================================
// 列名 → JSON 值（parquet 原生类型已映射为 JSON）
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row_number: usize, // 文件内行号（从 1 开始）
    pub values: Map<String, Value>,
}

impl RawRow {
    pub fn new(row_number: usize, values: Map<String, Value>) -> Self {
        Self { row_number, values }
    }

    /// 取非空值（null 与空白字符串视为缺失）
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self.values.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        }
    }
}

// ==========================================
// GraphRecord - 转换后的类型化记录
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRecord {
    pub category: Category,
    pub id: String,
    pub row_number: usize,
    pub fields: Map<String, Value>, // 含 id
}

impl GraphRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// 列表字段的元素（字符串化，用于引用解析）
    pub fn get_list(&self, field: &str) -> Vec<String> {
        match self.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_key).collect(),
            Some(other) => scalar_key(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// 反序列化为类型化视图（Document / Entity / ...）
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

/// 标量值 → 引用键（字符串原样，数值去掉小数部分）
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(|f| {
                if f.fract() == 0.0 {
                    (f as i64).to_string()
                } else {
                    f.to_string()
                }
            }),
        },
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_row_blank_is_missing() {
        let mut values = Map::new();
        values.insert("title".to_string(), json!("   "));
        values.insert("text".to_string(), Value::Null);
        values.insert("id".to_string(), json!("d1"));
        let row = RawRow::new(1, values);

        assert!(row.get("title").is_none());
        assert!(row.get("text").is_none());
        assert_eq!(row.get("id"), Some(&json!("d1")));
    }

    #[test]
    fn test_get_list_stringifies_numbers() {
        let mut fields = Map::new();
        fields.insert("children".to_string(), json!([1, 2.0, "3"]));
        let record = GraphRecord {
            category: Category::Community,
            id: "c1".to_string(),
            row_number: 1,
            fields,
        };

        assert_eq!(record.get_list("children"), vec!["1", "2", "3"]);
        assert!(record.get_list("entity_ids").is_empty());
    }
}
