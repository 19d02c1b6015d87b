// ==========================================
// 实体表格导入导出 - 表格读取器
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 表头 → 去除首尾空白的单元格文本；完全空白的行跳过但保留行号
// ==========================================

use crate::domain::{SheetFormat, SheetRow};
use crate::sheet::error::{SheetError, SheetResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

// ==========================================
// SheetReader Trait
// ==========================================
pub trait SheetReader: Send + Sync {
    /// 读取全部数据行（首行为表头）
    fn read_rows(&self, path: &Path) -> SheetResult<Vec<SheetRow>>;
}

fn ensure_exists(path: &Path) -> SheetResult<()> {
    if !path.exists() {
        return Err(SheetError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// 按表头组装一行；返回 None 表示空白行
fn assemble_row(
    number: usize,
    headers: &[String],
    cells: impl Iterator<Item = String>,
) -> Option<SheetRow> {
    let mut row = SheetRow::new(number);
    for (header, value) in headers.iter().zip(cells) {
        if header.is_empty() {
            continue;
        }
        row.cells.insert(header.clone(), value.trim().to_string());
    }

    if row.is_blank() {
        None
    } else {
        Some(row)
    }
}

// ==========================================
// CSV 读取器
// ==========================================
pub struct CsvSheetParser {
    delimiter: u8,
}

impl Default for CsvSheetParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvSheetParser {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl SheetReader for CsvSheetParser {
    fn read_rows(&self, path: &Path) -> SheetResult<Vec<SheetRow>> {
        ensure_exists(path)?;

        let ext = extension_of(path);
        if ext != "csv" {
            return Err(SheetError::UnsupportedFormat(ext));
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            if let Some(row) = assemble_row(idx + 1, &headers, record.iter().map(str::to_string)) {
                rows.push(row);
            }
        }

        debug!(path = %path.display(), rows = rows.len(), "CSV 读取完成");
        Ok(rows)
    }
}

// ==========================================
// Excel 读取器
// ==========================================
#[derive(Default)]
pub struct ExcelSheetParser {
    /// 优先读取的工作表；None 或不存在时读取第一个工作表
    sheet_name: Option<String>,
}

impl ExcelSheetParser {
    pub fn new(sheet_name: Option<String>) -> Self {
        Self { sheet_name }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

impl SheetReader for ExcelSheetParser {
    fn read_rows(&self, path: &Path) -> SheetResult<Vec<SheetRow>> {
        ensure_exists(path)?;

        let ext = extension_of(path);
        if ext != "xlsx" && ext != "xls" {
            return Err(SheetError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(path)?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = match &self.sheet_name {
            Some(name) if sheet_names.contains(name) => name.clone(),
            _ => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| SheetError::ExcelParseError("Excel 文件无工作表".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）；空工作表视为无数据
        let mut data_rows = range.rows();
        let Some(header_row) = data_rows.next() else {
            return Ok(Vec::new());
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell_text(cell).trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, data_row) in data_rows.enumerate() {
            if let Some(row) = assemble_row(idx + 1, &headers, data_row.iter().map(cell_text)) {
                rows.push(row);
            }
        }

        debug!(path = %path.display(), sheet = %sheet_name, rows = rows.len(), "Excel 读取完成");
        Ok(rows)
    }
}

// ==========================================
// 通用读取器（根据扩展名自动选择）
// ==========================================
#[derive(Default)]
pub struct UniversalSheetParser {
    csv: CsvSheetParser,
    excel: ExcelSheetParser,
}

impl UniversalSheetParser {
    pub fn new(csv_delimiter: u8, sheet_name: Option<String>) -> Self {
        Self {
            csv: CsvSheetParser::new(csv_delimiter),
            excel: ExcelSheetParser::new(sheet_name),
        }
    }

    pub fn format_of(path: &Path) -> SheetResult<SheetFormat> {
        let ext = extension_of(path);
        SheetFormat::from_extension(&ext).ok_or(SheetError::UnsupportedFormat(ext))
    }
}

impl SheetReader for UniversalSheetParser {
    fn read_rows(&self, path: &Path) -> SheetResult<Vec<SheetRow>> {
        match Self::format_of(path)? {
            SheetFormat::Csv => self.csv.read_rows(path),
            SheetFormat::Xlsx => self.excel.read_rows(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_csv_rows_keep_numbers_and_skip_blank() {
        let file = csv_file("customer_id, items.1.name ,items.1.qty\nCustomerA, Widget ,2\n,,\nCustomerB,,\n");
        let rows = CsvSheetParser::default().read_rows(file.path()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].get("items.1.name"), Some("Widget"));
        assert_eq!(rows[1].number, 3);
        assert_eq!(rows[1].get("items.1.qty"), Some(""));
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let file = csv_file("name;qty\nWidget;2\n");
        let rows = CsvSheetParser::new(b';').read_rows(file.path()).unwrap();
        assert_eq!(rows[0].get("qty"), Some("2"));
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let parser = UniversalSheetParser::default();
        assert!(matches!(
            parser.read_rows(Path::new("/nonexistent/orders.csv")),
            Err(SheetError::FileNotFound(_))
        ));

        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            parser.read_rows(file.path()),
            Err(SheetError::UnsupportedFormat(_))
        ));
    }
}
