// ==========================================
// 实体表格导入导出 - 配置层
// ==========================================
// 职责: 导入导出参数读取，支持 config_kv 覆写
// 存储: config_kv 表（ConfigManager）或进程内结构（StaticSheetConfig）
// ==========================================

pub mod config_manager;
pub mod sheet_config_trait;

pub use config_manager::{config_keys, ConfigManager, StaticSheetConfig};
pub use sheet_config_trait::{ConfigResult, SheetConfigReader};
