// ==========================================
// GraphRAG DGraph 导入工具 - 数据源读取
// ==========================================
// 阶段 1: 文件定位与按批读取
// 支持: Parquet (.parquet) / CSV (.csv)
// ==========================================

use crate::domain::category::Category;
use crate::domain::record::RawRow;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, NaiveDate};
use csv::ReaderBuilder;
use polars::prelude::{
    AnyValue, DataFrame, IdxSize, LazyFrame, PolarsError, ScanArgsParquet, TimeUnit,
};
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Unix 纪元相对公元元年的天数（polars Date 以纪元天数存储）
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ==========================================
// SourceFormat - 支持的文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Parquet,
    Csv,
}

impl SourceFormat {
    pub const EXTENSIONS: [&'static str; 2] = ["parquet", "csv"];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" => Some(SourceFormat::Parquet),
            "csv" => Some(SourceFormat::Csv),
            _ => None,
        }
    }
}

/// 列出某类别的数据文件
///
/// # 参数
/// - directory: GraphRAG 输出目录
/// - category: 数据类别（决定文件名模式）
///
/// # 返回
/// - Ok(Vec<PathBuf>): 按路径排序的匹配文件（仅 parquet / csv）
/// - Err(ImportError::NotFound): 没有匹配文件
pub fn list_files(directory: &Path, category: Category) -> ImportResult<Vec<PathBuf>> {
    let spec = category.spec();
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&directory.to_string_lossy()),
        spec.file_pattern
    );

    let entries = glob::glob(&pattern)
        .map_err(|e| ImportError::Io(format!("非法的文件模式 {}: {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && SourceFormat::from_path(p).is_some())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ImportError::NotFound(format!(
            "{} 下没有匹配 {} 的 {} 文件",
            directory.display(),
            spec.file_pattern,
            SourceFormat::EXTENSIONS.join("/")
        )));
    }

    debug!(category = %category, files = files.len(), "已定位数据文件");
    Ok(files)
}

/// 打开文件并按批读取
///
/// # 返回
/// - Err(ImportError::Format): 扩展名不支持或文件无法按其格式解析
pub fn read_batches(path: &Path, batch_size: usize) -> ImportResult<RowBatches> {
    RowBatches::open(path, batch_size.max(1))
}

// ==========================================
// RowBatches - 有限、惰性的行批次迭代器
// ==========================================
pub struct RowBatches {
    path: PathBuf,
    batch_size: usize,
    columns: Vec<String>,
    source: BatchSource,
    rows_emitted: usize,
}

enum BatchSource {
    /// 惰性扫描，每批只物化 offset 起的一个切片
    Parquet {
        scan: LazyFrame,
        offset: usize,
        exhausted: bool,
    },
    /// 逐条流式读取
    Csv {
        records: csv::StringRecordsIntoIter<File>,
    },
}

impl RowBatches {
    fn open(path: &Path, batch_size: usize) -> ImportResult<Self> {
        let format = SourceFormat::from_path(path).ok_or_else(|| {
            ImportError::Format(format!("不支持的文件格式: {}", path.display()))
        })?;

        let (columns, source) = match format {
            SourceFormat::Parquet => open_parquet(path)?,
            SourceFormat::Csv => open_csv(path)?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            batch_size,
            columns,
            source,
            rows_emitted: 0,
        })
    }

    /// 文件列名
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 从头重新读取同一文件
    pub fn rewind(&mut self) -> ImportResult<()> {
        match &mut self.source {
            BatchSource::Parquet {
                offset, exhausted, ..
            } => {
                *offset = 0;
                *exhausted = false;
            }
            BatchSource::Csv { .. } => {
                let (_, source) = open_csv(&self.path)?;
                self.source = source;
            }
        }
        self.rows_emitted = 0;
        Ok(())
    }

    fn next_parquet(
        path: &Path,
        scan: &LazyFrame,
        offset: &mut usize,
        exhausted: &mut bool,
        size: usize,
    ) -> ImportResult<Vec<Map<String, Value>>> {
        let slice = collect_slice(path, scan, *offset, size)?;
        *offset += slice.height();
        if slice.height() < size {
            *exhausted = true;
        }

        let mut rows = vec![Map::new(); slice.height()];
        for series in slice.get_columns() {
            let name = series.name().to_string();
            for (idx, row) in rows.iter_mut().enumerate() {
                let cell = series.get(idx)?;
                row.insert(name.clone(), any_value_to_json(&cell));
            }
        }
        Ok(rows)
    }

    fn next_csv(
        columns: &[String],
        records: &mut csv::StringRecordsIntoIter<File>,
        size: usize,
    ) -> ImportResult<Vec<Map<String, Value>>> {
        let mut rows = Vec::with_capacity(size);
        while rows.len() < size {
            let Some(record) = records.next() else {
                break;
            };
            let record = record?;

            // 跳过完全空白的行
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            let mut row = Map::new();
            for (header, value) in columns.iter().zip(record.iter()) {
                let cell = if value.trim().is_empty() {
                    Value::Null
                } else {
                    Value::String(value.to_string())
                };
                row.insert(header.clone(), cell);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Iterator for RowBatches {
    type Item = ImportResult<Vec<RawRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = match &mut self.source {
            BatchSource::Parquet {
                scan,
                offset,
                exhausted,
            } => {
                if *exhausted {
                    return None;
                }
                Self::next_parquet(&self.path, scan, offset, exhausted, self.batch_size)
            }
            BatchSource::Csv { records } => Self::next_csv(&self.columns, records, self.batch_size),
        };

        match batch {
            Err(e) => Some(Err(e)),
            Ok(rows) if rows.is_empty() => None,
            Ok(rows) => {
                let start = self.rows_emitted;
                self.rows_emitted += rows.len();
                Some(Ok(rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, values)| RawRow::new(start + i + 1, values))
                    .collect()))
            }
        }
    }
}

fn open_parquet(path: &Path) -> ImportResult<(Vec<String>, BatchSource)> {
    std::fs::metadata(path)?;
    let scan = LazyFrame::scan_parquet(path, ScanArgsParquet::default())
        .map_err(|e| invalid_parquet(path, e))?;

    // 空切片只读取文件元数据，用于列名校验
    let header = collect_slice(path, &scan, 0, 0)?;
    let columns = header
        .get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok((
        columns,
        BatchSource::Parquet {
            scan,
            offset: 0,
            exhausted: false,
        },
    ))
}

fn collect_slice(
    path: &Path,
    scan: &LazyFrame,
    offset: usize,
    size: usize,
) -> ImportResult<DataFrame> {
    let len = IdxSize::try_from(size).unwrap_or(IdxSize::MAX);
    scan.clone()
        .slice(offset as i64, len)
        .collect()
        .map_err(|e| invalid_parquet(path, e))
}

fn invalid_parquet(path: &Path, e: PolarsError) -> ImportError {
    ImportError::Format(format!("{} 不是有效的 parquet 文件: {}", path.display(), e))
}

fn open_csv(path: &Path) -> ImportResult<(Vec<String>, BatchSource)> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // 允许行长度不一致
        .from_reader(file);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::Format(format!("{} 表头解析失败: {}", path.display(), e)))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    Ok((
        columns,
        BatchSource::Csv {
            records: reader.into_records(),
        },
    ))
}

/// parquet 单元格 → JSON 值
pub fn any_value_to_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => float_to_json(*v as f64),
        AnyValue::Float64(v) => float_to_json(*v),
        AnyValue::Date(days) => NaiveDate::from_num_days_from_ce_opt(*days + EPOCH_DAYS_FROM_CE)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        AnyValue::Datetime(ts, unit, _) => datetime_to_json(*ts, *unit),
        AnyValue::List(series) => Value::Array(
            (0..series.len())
                .map(|i| {
                    series
                        .get(i)
                        .map(|v| any_value_to_json(&v))
                        .unwrap_or(Value::Null)
                })
                .collect(),
        ),
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn datetime_to_json(ts: i64, unit: TimeUnit) -> Value {
    let (secs, nanos) = match unit {
        TimeUnit::Nanoseconds => (ts.div_euclid(1_000_000_000), ts.rem_euclid(1_000_000_000)),
        TimeUnit::Microseconds => (ts.div_euclid(1_000_000), ts.rem_euclid(1_000_000) * 1_000),
        TimeUnit::Milliseconds => (ts.div_euclid(1_000), ts.rem_euclid(1_000) * 1_000_000),
    };
    DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()))
        .unwrap_or(Value::Null)
}
