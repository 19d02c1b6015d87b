// ==========================================
// 实体表格导入导出 - API层
// ==========================================
// 职责: 对外异步接口（导出 / 模板 / 导入 / 提交 / 批量导入）
// 红线: 不含列映射与对账逻辑，只做编排
// ==========================================

pub mod error;
pub mod sheet_api;

pub use error::{ApiError, ApiResult};
pub use sheet_api::{ExportSummary, SheetApi};
