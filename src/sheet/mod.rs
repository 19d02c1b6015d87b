// ==========================================
// 实体表格导入导出 - 表格编解码层
// ==========================================
// 职责: 文件 ↔ 表头 + 行（不理解实体语义）
// 支持: Excel (.xlsx/.xls 读, .xlsx 写) / CSV (.csv)
// ==========================================

pub mod error;
pub mod file_parser;
pub mod file_writer;

pub use error::{SheetError, SheetResult};
pub use file_parser::{CsvSheetParser, ExcelSheetParser, SheetReader, UniversalSheetParser};
pub use file_writer::{writer_for, CsvSheetWriter, SheetWriter, XlsxSheetWriter};
