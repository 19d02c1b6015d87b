// ==========================================
// 实体表格导入导出 - 表格配置读取 Trait
// ==========================================
// 职责: 定义导入导出所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::SheetFormat;
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果（错误需可跨 await 传递）
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// SheetConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）, StaticSheetConfig（进程内）
#[async_trait]
pub trait SheetConfigReader: Send + Sync {
    /// 导出文件未指定扩展名时使用的格式
    ///
    /// # 默认值
    /// - xlsx
    async fn get_default_export_format(&self) -> ConfigResult<SheetFormat>;

    /// 导入模板中每个 to-many 关联渲染的分组数
    ///
    /// # 默认值
    /// - 1
    async fn get_template_repeat_groups(&self) -> ConfigResult<usize>;

    /// CSV 分隔符（单个 ASCII 字符）
    ///
    /// # 默认值
    /// - ','
    async fn get_csv_delimiter(&self) -> ConfigResult<u8>;

    /// XLSX 工作表名（写出使用；读取时若存在同名工作表则优先）
    ///
    /// # 默认值
    /// - Sheet1
    async fn get_sheet_name(&self) -> ConfigResult<String>;

    /// 单个文件允许导入的最大数据行数（超出视为文件错误，整批不处理）
    ///
    /// # 默认值
    /// - 10000
    async fn get_max_import_rows(&self) -> ConfigResult<usize>;
}
