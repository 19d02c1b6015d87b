// ==========================================
// 实体表格导入导出 - 领域类型定义
// ==========================================
// 职责: 字段类型、关联基数、列来源、表格格式
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 字段类型 (Field Type)
// ==========================================
// 单元格文本按此类型转换为 Value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,     // 文本
    Integer,  // 整数
    Decimal,  // 小数
    Boolean,  // 布尔
    Date,     // 日期 (YYYY-MM-DD)
    DateTime, // 日期时间 (YYYY-MM-DD HH:MM:SS)
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "TEXT"),
            FieldType::Integer => write!(f, "INTEGER"),
            FieldType::Decimal => write!(f, "DECIMAL"),
            FieldType::Boolean => write!(f, "BOOLEAN"),
            FieldType::Date => write!(f, "DATE"),
            FieldType::DateTime => write!(f, "DATETIME"),
        }
    }
}

// ==========================================
// 关联类型 (Relation Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    ToOne,  // 至多一条关联记录
    ToMany, // 有序多条关联记录
}

impl RelationKind {
    /// 该关联对应的列基数
    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationKind::ToOne => Cardinality::Singular,
            RelationKind::ToMany => Cardinality::Repeated,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::ToOne => write!(f, "TO_ONE"),
            RelationKind::ToMany => write!(f, "TO_MANY"),
        }
    }
}

// ==========================================
// 列基数 (Cardinality)
// ==========================================
// Repeated: 路径上至少经过一次 to-many 关联
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    Singular,
    Repeated,
}

// ==========================================
// 表格文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    /// 根据文件扩展名识别格式（.xls 按 Excel 读取）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SheetFormat::Csv),
            "xlsx" | "xls" => Some(SheetFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SheetFormat::Csv => "csv",
            SheetFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for SheetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SheetFormat::from_extension(s.trim()).ok_or_else(|| format!("未知表格格式: {}", s))
    }
}
