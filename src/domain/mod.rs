// ==========================================
// GraphRAG DGraph 导入工具 - 领域模型层
// ==========================================
// 职责: 数据类别规格、导入记录、类型化模型、导入结果
// 红线: 不含存储访问逻辑，不含转换逻辑
// ==========================================

pub mod category;
pub mod models;
pub mod record;
pub mod report;

// 重导出核心类型
pub use category::{Category, CategorySpec, IdFormat, NumericKind, RefKey, RelationSpec};
pub use models::{Community, CommunityReport, Document, Entity, Relationship, TextUnit};
pub use record::{scalar_key, GraphRecord, RawRow};
pub use report::{
    BatchOutcome, CategoryReport, CategoryState, ConflictStrategy, ImportReport,
};
