// ==========================================
// 实体表格导入导出 - 列映射层
// ==========================================
// 职责: 实体声明 → 扁平有序列结构；表头 → 列路径反解
// 流程: 契约声明 → JoinSpec 树 → ColumnSchema（每实体一次）→ 导出/导入共用
// ==========================================

pub mod builder;
pub mod cache;
pub mod column;
pub mod error;
pub mod layout;

pub use builder::build_schema;
pub use cache::SchemaCache;
pub use column::{
    ColumnDescriptor, ColumnPath, ColumnSchema, JoinGroup, RelationHop, ResolvedColumn,
    SourceKind,
};
pub use error::{SchemaError, SchemaResult};
pub use layout::{LayoutColumn, RepeatCounts, SheetLayout};
