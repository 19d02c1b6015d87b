// ==========================================
// 实体表格导入导出 - 核心库
// ==========================================
// 职责: 实体声明 → 扁平表格列；导出投影 / 导入对账
// 技术栈: Rust + SQLite + CSV/XLSX
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 声明与值类型
pub mod domain;

// 契约层 - 实体声明与注册
pub mod contract;

// 列映射层
pub mod schema;

// 引擎层 - 导出投影 / 导入对账
pub mod engine;

// 数据仓储层 - 持久化协作方
pub mod repository;

// 表格编解码层
pub mod sheet;

// 配置层
pub mod config;

// API 层 - 异步编排
pub mod api;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use contract::{EntityRegistry, SheetEntity};

pub use domain::{
    CommitSummary, DropdownSpec, EntityGraph, EntityInstance, EntityType, FieldDef, FieldType,
    ImportReport, JoinSpec, LinkMode, Reconciliation, Record, RelationDef, RelationKind, Rule,
    RuleSet, RowViolation, SheetFormat, SheetRow, Value, ViolationKind,
};

pub use schema::{build_schema, ColumnSchema, SchemaCache, SchemaError};

pub use engine::{project, reconcile, EngineError, Projection};

pub use repository::{EntityStore, ForeignLookup, GraphWriter, MemoryEntityStore, SqliteEntityStore};

pub use config::{ConfigManager, SheetConfigReader, StaticSheetConfig};

pub use api::{ApiError, ApiResult, SheetApi};

// ==========================================
// 常量定义
// ==========================================

// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
