// ==========================================
// 实体表格导入导出 - 标量值
// ==========================================
// 职责: 单元格标量值 + 文本 ↔ 类型化值转换
// 红线: 空单元格统一为 Value::Empty，不区分空串与缺列
// ==========================================

use crate::domain::types::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日期输出格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 日期时间输出格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 单元格标量值
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 渲染为单元格文本（导出 / 比较键值使用）
    pub fn to_cell_string(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    /// 按键语义比较
    ///
    /// - 整数之间精确比较，整数与小数仅在小数为同值整数时相等
    /// - 其余组合比较规范文本：导入时外键以文本 "7" 进入，存储侧为 Integer(7)；
    ///   "007"、"1e3" 不是整数的规范写法，不与 7、1000 匹配
    pub fn matches_key(&self, other: &Value) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Integer(i), Value::Decimal(d)) | (Value::Decimal(d), Value::Integer(i)) => {
                d.fract() == 0.0 && *d == *i as f64 && *d as i64 == *i
            }
            _ => self.to_cell_string().trim() == other.to_cell_string().trim(),
        }
    }

    /// 按字段类型解析单元格文本
    ///
    /// # 返回
    /// - Ok(Value::Empty): 空白单元格
    /// - Ok(Value): 解析成功
    /// - Err(String): 类型不符（错误描述，由调用方归入行级违规）
    pub fn parse_cell(raw: &str, field_type: FieldType) -> Result<Value, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Value::Empty);
        }

        match field_type {
            FieldType::Text => Ok(Value::Text(trimmed.to_string())),
            FieldType::Integer => parse_integer(trimmed)
                .map(Value::Integer)
                .ok_or_else(|| format!("无法解析为整数: {}", trimmed)),
            FieldType::Decimal => trimmed
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Value::Decimal)
                .ok_or_else(|| format!("无法解析为小数: {}", trimmed)),
            FieldType::Boolean => parse_boolean(trimmed)
                .map(Value::Boolean)
                .ok_or_else(|| format!("无法解析为布尔值: {}", trimmed)),
            FieldType::Date => parse_date(trimmed)
                .map(Value::Date)
                .ok_or_else(|| format!("日期格式错误，期望 YYYY-MM-DD: {}", trimmed)),
            FieldType::DateTime => parse_datetime(trimmed)
                .map(Value::DateTime)
                .ok_or_else(|| {
                    format!("日期时间格式错误，期望 YYYY-MM-DD HH:MM:SS: {}", trimmed)
                }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_cell_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Empty)
    }
}

// ==========================================
// 解析辅助函数
// ==========================================

/// 整数解析；Excel 数值单元格可能以 "2.0" 形式出现
fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(i) = value.parse::<i64>() {
        return Some(i);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && d.fract() == 0.0 && d.abs() < i64::MAX as f64)
        .map(|d| d as i64)
}

/// 布尔解析（兼容 1/0、Y/N、是/否）
fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_uppercase().as_str() {
        "TRUE" | "1" | "Y" | "YES" | "是" => Some(true),
        "FALSE" | "0" | "N" | "NO" | "否" => Some(false),
        _ => None,
    }
}

/// 日期解析（YYYY-MM-DD / YYYYMMDD / YYYY/MM/DD）
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y/%m/%d"))
        .ok()
}

/// 日期时间解析（兼容 RFC3339）
fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank_is_empty() {
        assert_eq!(Value::parse_cell("   ", FieldType::Integer), Ok(Value::Empty));
    }

    #[test]
    fn test_parse_integer_accepts_excel_float() {
        assert_eq!(Value::parse_cell("5", FieldType::Integer), Ok(Value::Integer(5)));
        assert_eq!(Value::parse_cell("5.0", FieldType::Integer), Ok(Value::Integer(5)));
        assert!(Value::parse_cell("5.5", FieldType::Integer).is_err());
        assert!(Value::parse_cell("abc", FieldType::Integer).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Value::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(Value::parse_cell("2026-02-01", FieldType::Date), Ok(expected.clone()));
        assert_eq!(Value::parse_cell("20260201", FieldType::Date), Ok(expected));
        assert!(Value::parse_cell("2026-13-01", FieldType::Date).is_err());
    }

    #[test]
    fn test_parse_boolean_aliases() {
        assert_eq!(Value::parse_cell("是", FieldType::Boolean), Ok(Value::Boolean(true)));
        assert_eq!(Value::parse_cell("n", FieldType::Boolean), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_cell_string_round_trip() {
        let values = [
            (Value::Integer(42), FieldType::Integer),
            (Value::Decimal(2.5), FieldType::Decimal),
            (Value::Boolean(true), FieldType::Boolean),
            (Value::Text("Widget".into()), FieldType::Text),
        ];
        for (value, field_type) in values {
            assert_eq!(Value::parse_cell(&value.to_cell_string(), field_type), Ok(value));
        }
    }

    #[test]
    fn test_matches_key_ignores_type() {
        assert!(Value::Integer(7).matches_key(&Value::Text("7".into())));
        assert!(Value::Text("CustomerA".into()).matches_key(&Value::Text(" CustomerA ".into())));
        assert!(Value::Decimal(2.0).matches_key(&Value::Integer(2)));
        assert!(!Value::Empty.matches_key(&Value::Empty));
    }

    #[test]
    fn test_matches_key_requires_canonical_text() {
        assert!(!Value::Text("007".into()).matches_key(&Value::Text("7".into())));
        assert!(!Value::Text("007".into()).matches_key(&Value::Integer(7)));
        assert!(!Value::Text("1e3".into()).matches_key(&Value::Integer(1000)));
        assert!(!Value::Decimal(2.5).matches_key(&Value::Integer(2)));

        let big = 1_i64 << 53;
        assert!(!Value::Integer(big + 1).matches_key(&Value::Integer(big)));
        assert!(!Value::Text((big + 1).to_string()).matches_key(&Value::Integer(big)));
    }
}
