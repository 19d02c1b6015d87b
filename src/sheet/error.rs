// ==========================================
// 实体表格导入导出 - 表格编解码错误类型
// ==========================================
// 工具: thiserror 派生宏
// 定位: 协作方错误（中止当前导入/导出）
// ==========================================

use thiserror::Error;

/// 表格编解码错误类型
#[derive(Error, Debug)]
pub enum SheetError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("文件写出失败: {0}")]
    FileWriteError(String),

    // ===== 解析错误 =====
    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 写出错误 =====
    #[error("Excel 写出失败: {0}")]
    ExcelWriteError(String),

    #[error("行列数不一致 (行 {row}): 期望 {expected} 列，实际 {actual} 列")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for SheetError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SheetError::FileNotFound(err.to_string()),
            _ => SheetError::FileReadError(err.to_string()),
        }
    }
}

impl From<csv::Error> for SheetError {
    fn from(err: csv::Error) -> Self {
        SheetError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for SheetError {
    fn from(err: calamine::Error) -> Self {
        SheetError::ExcelParseError(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for SheetError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        SheetError::ExcelWriteError(err.to_string())
    }
}

/// Result 类型别名
pub type SheetResult<T> = Result<T, SheetError>;
