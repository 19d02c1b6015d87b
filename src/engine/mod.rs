// ==========================================
// 实体表格导入导出 - 引擎层
// ==========================================
// 职责: 导出投影 / 导入对账 / 规则求值
// 红线: 引擎同步、无状态；不拼 SQL，不做持久化
// ==========================================

pub mod error;
pub mod projection;
pub mod reconcile;
pub mod rule_eval;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use projection::{project, ExportProjector, ExportRow, Projection};
pub use reconcile::{reconcile, Reconciler};
pub use rule_eval::RuleEvaluator;
