// ==========================================
// 实体表格导入导出 - 领域模型层
// ==========================================
// 职责: 定义实体声明、标量值、关联展开、校验规则、导入结果
// 红线: 不含数据访问逻辑，不含引擎逻辑
// ==========================================

pub mod dropdown;
pub mod entity;
pub mod graph;
pub mod join;
pub mod row;
pub mod rule;
pub mod types;
pub mod value;

// 重导出核心类型
pub use dropdown::DropdownSpec;
pub use entity::{EntityInstance, EntityType, FieldDef, Record, RelationDef};
pub use graph::{
    CommitSummary, EntityGraph, ImportReport, Reconciliation, RejectedRow, RelationLink,
    RowOutcome, RowViolation, ViolationKind,
};
pub use join::{JoinSpec, LinkMode};
pub use row::SheetRow;
pub use rule::{FieldRules, Rule, RuleSet};
pub use types::{Cardinality, FieldType, RelationKind, SheetFormat};
pub use value::Value;
