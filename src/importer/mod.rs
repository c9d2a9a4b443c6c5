// ==========================================
// GraphRAG DGraph 导入工具 - 导入层
// ==========================================
// 职责: GraphRAG 产物文件 → 图存储
// 流程: 读取 → 转换/校验 → 批量写入 → 关系后处理
// 支持: Parquet, CSV
// ==========================================

// 模块声明
pub mod batch_importer;
pub mod conflict_handler;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod orchestrator;
pub mod post_processor;

// 重导出核心类型
pub use batch_importer::BatchImporter;
pub use conflict_handler::{ConflictHandler, ExistingRecords, WritePlan};
pub use dq_validator::DqValidator;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{convert, FieldMapper};
pub use file_parser::{list_files, read_batches, RowBatches, SourceFormat};
pub use orchestrator::{run_import, ImportOrchestrator};

// 重导出 Trait 接口
pub use post_processor::{
    default_processors, CommunityHierarchyLinker, PostProcessReport, PostProcessor,
    ReferenceLinker, RelationshipEdgeBuilder,
};
