// ==========================================
// 实体表格导入导出 - 表格原始行
// ==========================================
// 编解码器输出 / 导入对账输入
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SheetRow {
    /// 数据行号（从 1 开始，不含表头行；跳过的空行仍占号）
    pub number: usize,
    /// 表头 → 去除首尾空白后的单元格文本
    pub cells: HashMap<String, String>,
}

impl SheetRow {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            cells: HashMap::new(),
        }
    }

    pub fn with(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.cells.insert(header.into(), value.into());
        self
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}
