// ==========================================
// GraphRAG DGraph 导入工具 - 导入编排器
// ==========================================
// 用途: 按依赖顺序串行导入各类别并汇总结果
// 顺序: document → text_unit → entity → relationship → community → community_report
// 状态: pending → reading → converting → importing → post_processing → done | failed
// ==========================================

use crate::config::ImportConfig;
use crate::domain::category::{Category, CategorySpec};
use crate::domain::record::{GraphRecord, RawRow};
use crate::domain::report::{CategoryReport, CategoryState, ImportReport};
use crate::importer::batch_importer::BatchImporter;
use crate::importer::dq_validator::check_columns;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{list_files, read_batches};
use crate::importer::post_processor::{default_processors, PostProcessor};
use crate::repository::graph_store::GraphStore;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// 执行一次完整导入
///
/// # 参数
/// - store: 已连接的图存储
/// - config: 导入参数
///
/// # 返回
/// - Ok(ImportReport): 各类别状态与计数（类别失败不会使本函数返回 Err）
/// - Err(ImportError::Config): 参数非法
pub async fn run_import(store: &dyn GraphStore, config: &ImportConfig) -> ImportResult<ImportReport> {
    ImportOrchestrator::new(store, config).run().await
}

// ==========================================
// ImportOrchestrator - 导入编排器
// ==========================================
pub struct ImportOrchestrator<'a> {
    store: &'a dyn GraphStore,
    config: &'a ImportConfig,
    mapper: FieldMapper,
    importer: BatchImporter<'a>,
    processors: Vec<Box<dyn PostProcessor>>,
}

impl<'a> ImportOrchestrator<'a> {
    pub fn new(store: &'a dyn GraphStore, config: &'a ImportConfig) -> Self {
        Self {
            store,
            config,
            mapper: FieldMapper::new(config.validate_id_format),
            importer: BatchImporter::from_config(store, config),
            processors: default_processors(),
        }
    }

    /// 替换后处理器链
    pub fn with_processors(mut self, processors: Vec<Box<dyn PostProcessor>>) -> Self {
        self.processors = processors;
        self
    }

    pub async fn run(&self) -> ImportResult<ImportReport> {
        self.config.validate()?;

        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let selected = self.config.categories.ordered();

        info!(
            run_id = %run_id,
            data_dir = %self.config.data_dir.display(),
            categories = ?selected.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            conflict = %self.config.conflict_strategy,
            batch_size = self.config.batch_size,
            "开始导入"
        );

        let mut categories: BTreeMap<Category, CategoryReport> = selected
            .iter()
            .map(|c| (*c, CategoryReport::new(*c)))
            .collect();
        let mut halted_by_fail_fast = false;

        for category in &selected {
            let Some(report) = categories.get_mut(category) else {
                continue;
            };
            self.import_category(*category, report).await;

            info!(
                category = %category,
                state = %report.state,
                rows = report.rows_read,
                inserted = report.inserted,
                updated = report.updated,
                skipped = report.skipped,
                failed = report.failed,
                edges = report.edges_created,
                unresolved = report.unresolved_references,
                "类别导入结束"
            );

            if report.state == CategoryState::Failed
                && self.config.fail_fast
                && self.config.categories.is_all()
            {
                error!(category = %category, "类别导入失败，fail-fast 已中止后续类别");
                halted_by_fail_fast = true;
                break;
            }
        }

        let report = ImportReport {
            run_id,
            conflict_strategy: self.config.conflict_strategy,
            categories,
            halted_by_fail_fast,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            run_id = %report.run_id,
            elapsed_ms = report.elapsed_ms as u64,
            has_failures = report.has_failures(),
            "导入结束"
        );
        Ok(report)
    }

    // ===== 单类别流程 =====

    async fn import_category(&self, category: Category, report: &mut CategoryReport) {
        let spec = category.spec();
        let limit = self.config.max_reported_errors;
        advance(report, CategoryState::Reading);

        let files = match list_files(&self.config.data_dir, category) {
            Ok(files) => files,
            Err(ImportError::NotFound(message)) => {
                report.missing_source = true;
                if self.config.categories.is_all() {
                    warn!(category = %category, "{}，按空类别处理", message);
                    advance(report, CategoryState::Done);
                } else {
                    error!(category = %category, "{}", message);
                    report.push_error(message, limit);
                    advance(report, CategoryState::Failed);
                }
                return;
            }
            Err(e) => {
                error!(category = %category, error = %e, "源文件定位失败");
                report.push_error(e.to_string(), limit);
                advance(report, CategoryState::Failed);
                return;
            }
        };

        let mut failed = false;
        let mut written: Vec<(GraphRecord, String)> = Vec::new();
        let mut batch_no = 0usize;

        'files: for path in &files {
            advance(report, CategoryState::Reading);
            report.files.push(path.display().to_string());
            info!(category = %category, file = %path.display(), "读取源文件");

            let mut batches = match read_batches(path, self.config.batch_size) {
                Ok(batches) => batches,
                Err(e) => {
                    self.record_file_error(report, path, &e);
                    failed = true;
                    continue;
                }
            };
            if let Err(e) = check_columns(spec, batches.columns()) {
                self.record_file_error(report, path, &e);
                failed = true;
                continue;
            }

            for batch in &mut batches {
                let rows = match batch {
                    Ok(rows) => rows,
                    Err(e) => {
                        self.record_file_error(report, path, &e);
                        failed = true;
                        continue 'files;
                    }
                };

                advance(report, CategoryState::Converting);
                report.rows_read += rows.len();
                let records = self.convert_rows(spec, path, &rows, report);

                advance(report, CategoryState::Importing);
                batch_no += 1;
                let outcome = self.importer.import_batch(spec, batch_no, records).await;
                report.absorb(&outcome);

                if let Some(message) = &outcome.error {
                    report.push_error(
                        format!("{} 批次 {} 写入失败: {}", path.display(), batch_no, message),
                        limit,
                    );
                    failed = true;
                    written.extend(outcome.written);
                    break 'files;
                }
                written.extend(outcome.written);
            }
        }

        // 已写入的记录即使类别失败也建立引用边
        advance(report, CategoryState::PostProcessing);
        for processor in self.processors.iter().filter(|p| p.applies_to(category)) {
            match processor.process(self.store, category, &written).await {
                Ok(result) => {
                    report.edges_created += result.edges_created;
                    report.unresolved_references += result.unresolved;
                }
                Err(e) => {
                    error!(category = %category, processor = processor.name(), error = %e, "后处理失败");
                    report.push_error(format!("{}: {}", processor.name(), e), limit);
                    failed = true;
                }
            }
        }

        advance(
            report,
            if failed {
                CategoryState::Failed
            } else {
                CategoryState::Done
            },
        );
    }

    /// 批次内逐行转换，校验失败的行跳过并计入 failed
    fn convert_rows(
        &self,
        spec: &CategorySpec,
        path: &Path,
        rows: &[RawRow],
        report: &mut CategoryReport,
    ) -> Vec<GraphRecord> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match self.mapper.map_row(row, spec) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(category = %spec.category, row_number = row.row_number, error = %e, "记录校验失败");
                    report.failed += 1;
                    report.push_error(
                        format!("{}: {}", path.display(), e),
                        self.config.max_reported_errors,
                    );
                }
            }
        }
        records
    }

    fn record_file_error(&self, report: &mut CategoryReport, path: &Path, e: &ImportError) {
        error!(category = %report.category, file = %path.display(), error = %e, "源文件读取失败");
        report.push_error(
            format!("{}: {}", path.display(), e),
            self.config.max_reported_errors,
        );
    }
}

/// 状态推进（同态跳过，非法转换忽略）
fn advance(report: &mut CategoryReport, next: CategoryState) {
    if report.state == next {
        return;
    }
    if report.state.can_transition_to(next) {
        debug!(category = %report.category, from = %report.state, to = %next, "状态转换");
        report.state = next;
    } else {
        warn!(category = %report.category, from = %report.state, to = %next, "忽略非法状态转换");
    }
}
