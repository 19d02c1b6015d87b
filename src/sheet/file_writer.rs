// ==========================================
// 实体表格导入导出 - 表格写出器
// ==========================================
// 支持: CSV（纯文本）/ XLSX（数值、布尔按类型写出，其余按文本）
// 红线: 只写表头与数据，不做样式
// ==========================================

use crate::domain::{SheetFormat, Value};
use crate::engine::ExportRow;
use crate::sheet::error::{SheetError, SheetResult};
use csv::WriterBuilder;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::Path;
use tracing::debug;

// ==========================================
// SheetWriter Trait
// ==========================================
pub trait SheetWriter: Send + Sync {
    /// 写出表头与数据行（覆盖已有文件）
    fn write(&self, path: &Path, headers: &[String], rows: &[ExportRow]) -> SheetResult<()>;
}

fn check_width(headers: &[String], rows: &[ExportRow]) -> SheetResult<()> {
    for (idx, row) in rows.iter().enumerate() {
        if row.cells.len() != headers.len() {
            return Err(SheetError::RowWidthMismatch {
                row: idx + 1,
                expected: headers.len(),
                actual: row.cells.len(),
            });
        }
    }
    Ok(())
}

// ==========================================
// CSV 写出器
// ==========================================
pub struct CsvSheetWriter {
    delimiter: u8,
}

impl Default for CsvSheetWriter {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvSheetWriter {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl SheetWriter for CsvSheetWriter {
    fn write(&self, path: &Path, headers: &[String], rows: &[ExportRow]) -> SheetResult<()> {
        check_width(headers, rows)?;

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)
            .map_err(|e| SheetError::FileWriteError(e.to_string()))?;

        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row.to_strings())?;
        }
        writer
            .flush()
            .map_err(|e| SheetError::FileWriteError(e.to_string()))?;

        debug!(path = %path.display(), rows = rows.len(), "CSV 写出完成");
        Ok(())
    }
}

// ==========================================
// XLSX 写出器
// ==========================================
pub struct XlsxSheetWriter {
    sheet_name: String,
}

impl Default for XlsxSheetWriter {
    fn default() -> Self {
        Self {
            sheet_name: "Sheet1".to_string(),
        }
    }
}

impl XlsxSheetWriter {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> SheetResult<()> {
        match value {
            Value::Empty => {}
            Value::Integer(i) => {
                worksheet.write_number(row, col, *i as f64)?;
            }
            Value::Decimal(d) => {
                worksheet.write_number(row, col, *d)?;
            }
            Value::Boolean(b) => {
                worksheet.write_boolean(row, col, *b)?;
            }
            Value::Text(_) | Value::Date(_) | Value::DateTime(_) => {
                worksheet.write_string(row, col, value.to_cell_string())?;
            }
        }
        Ok(())
    }
}

impl SheetWriter for XlsxSheetWriter {
    fn write(&self, path: &Path, headers: &[String], rows: &[ExportRow]) -> SheetResult<()> {
        check_width(headers, rows)?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name)?;

        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }

        for (row_idx, row) in rows.iter().enumerate() {
            let row_num = (row_idx + 1) as u32;
            for (col, value) in row.cells.iter().enumerate() {
                Self::write_cell(worksheet, row_num, col as u16, value)?;
            }
        }

        workbook.save(path)?;
        debug!(path = %path.display(), rows = rows.len(), "XLSX 写出完成");
        Ok(())
    }
}

/// 按格式选择写出器
pub fn writer_for(format: SheetFormat, csv_delimiter: u8, sheet_name: &str) -> Box<dyn SheetWriter> {
    match format {
        SheetFormat::Csv => Box::new(CsvSheetWriter::new(csv_delimiter)),
        SheetFormat::Xlsx => Box::new(XlsxSheetWriter::new(sheet_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::file_parser::{ExcelSheetParser, SheetReader, UniversalSheetParser};
    use tempfile::TempDir;

    fn sample() -> (Vec<String>, Vec<ExportRow>) {
        (
            vec!["name".to_string(), "qty".to_string(), "active".to_string()],
            vec![
                ExportRow {
                    cells: vec![Value::Text("Widget".into()), Value::Integer(2), Value::Boolean(true)],
                },
                ExportRow {
                    cells: vec![Value::Text("Gadget, large".into()), Value::Empty, Value::Empty],
                },
            ],
        )
    }

    #[test]
    fn test_csv_written_rows_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.csv");
        let (headers, rows) = sample();

        CsvSheetWriter::default().write(&path, &headers, &rows).unwrap();
        let read = UniversalSheetParser::default().read_rows(&path).unwrap();

        assert_eq!(read.len(), 2);
        assert_eq!(read[1].get("name"), Some("Gadget, large"));
        assert_eq!(read[0].get("qty"), Some("2"));
    }

    #[test]
    fn test_xlsx_typed_cells_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.xlsx");
        let (headers, rows) = sample();

        XlsxSheetWriter::new("Items").write(&path, &headers, &rows).unwrap();
        let read = ExcelSheetParser::new(Some("Items".into())).read_rows(&path).unwrap();

        assert_eq!(read.len(), 2);
        assert_eq!(read[0].get("qty"), Some("2"));
        assert_eq!(
            Value::parse_cell(read[0].get("active").unwrap(), crate::domain::FieldType::Boolean),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_row_width_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let headers = vec!["name".to_string()];
        let rows = vec![ExportRow { cells: vec![] }];
        assert!(matches!(
            CsvSheetWriter::default().write(&dir.path().join("bad.csv"), &headers, &rows),
            Err(SheetError::RowWidthMismatch { row: 1, .. })
        ));
    }
}
