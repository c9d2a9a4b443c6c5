// ==========================================
// GraphRAG DGraph 导入工具 - Schema 层
// ==========================================

pub mod definitions;
pub mod initializer;

pub use definitions::{
    check_consistency, complete_schema, render_schemas, schema_for, PredicateDef, TypeSchema,
};
pub use initializer::{initialize, resolve_schema_type, valid_schema_types, COMPLETE};
