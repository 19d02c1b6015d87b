// ==========================================
// 实体表格导入导出 - 导入规则求值器
// ==========================================
// 职责: 对一行的本实体字段原始文本求值全部声明规则
// 红线: 同一行的全部违规累积返回，不在第一个失败处中断
// 约定: 除 required 外，空值跳过其余规则
// ==========================================

use crate::domain::{FieldRules, FieldType, Rule, RowViolation, Value};
use crate::engine::error::EngineResult;
use crate::repository::entity_store::ForeignLookup;
use crate::schema::{ColumnSchema, SchemaError, SourceKind};
use regex::Regex;
use std::collections::HashMap;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

enum Check {
    Rule(Rule),
    Pattern(Regex),
}

struct CompiledField {
    field: String,
    numeric: bool,
    checks: Vec<Check>,
}

/// 已编译的规则集（每次 reconcile 构建一次，逐行复用）
pub struct RuleEvaluator {
    fields: Vec<CompiledField>,
    email: Regex,
}

impl RuleEvaluator {
    pub fn new(schema: &ColumnSchema) -> EngineResult<Self> {
        let fields = schema
            .rules
            .iter()
            .map(|field_rules| compile_field(schema, field_rules))
            .collect::<EngineResult<Vec<_>>>()?;

        let email = Regex::new(EMAIL_PATTERN).map_err(|e| SchemaError::InvalidRule {
            expression: "email".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { fields, email })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 求值一行
    ///
    /// # 参数
    /// - row_number: 数据行号（写入违规记录）
    /// - raw: 字段名 → 单元格原始文本（缺列视为空）
    /// - lookup: exists 规则的外部实体查找
    ///
    /// # 返回
    /// - Ok(Vec<RowViolation>): 该行全部违规（空 = 通过）
    /// - Err: 查找协作方故障
    pub fn evaluate(
        &self,
        row_number: usize,
        raw: &HashMap<String, String>,
        lookup: &dyn ForeignLookup,
    ) -> EngineResult<Vec<RowViolation>> {
        let mut violations = Vec::new();

        for compiled in &self.fields {
            let value = raw.get(&compiled.field).map(|s| s.trim()).unwrap_or("");

            for check in &compiled.checks {
                if let Some(message) = self.check(compiled, check, value, lookup)? {
                    violations.push(RowViolation::validation(
                        row_number,
                        compiled.field.clone(),
                        message,
                    ));
                }
            }
        }

        Ok(violations)
    }

    fn check(
        &self,
        compiled: &CompiledField,
        check: &Check,
        value: &str,
        lookup: &dyn ForeignLookup,
    ) -> EngineResult<Option<String>> {
        let rule = match check {
            Check::Pattern(pattern) => {
                if value.is_empty() || pattern.is_match(value) {
                    return Ok(None);
                }
                return Ok(Some(format!("格式不匹配: {}", pattern.as_str())));
            }
            Check::Rule(rule) => rule,
        };

        if value.is_empty() {
            return Ok(match rule {
                Rule::Required => Some("必填字段为空".to_string()),
                _ => None,
            });
        }

        let failed = match rule {
            Rule::Required | Rule::Text => None,
            Rule::Integer => Value::parse_cell(value, FieldType::Integer)
                .err()
                .map(|_| format!("必须为整数: {}", value)),
            Rule::Numeric => Value::parse_cell(value, FieldType::Decimal)
                .err()
                .map(|_| format!("必须为数值: {}", value)),
            Rule::Boolean => Value::parse_cell(value, FieldType::Boolean)
                .err()
                .map(|_| format!("必须为布尔值: {}", value)),
            Rule::Date => Value::parse_cell(value, FieldType::Date).err(),
            Rule::Email => (!self.email.is_match(value)).then(|| format!("邮箱格式错误: {}", value)),
            Rule::Min { value: bound } => bound_check(compiled.numeric, value, |n| n < *bound)
                .then(|| {
                    if compiled.numeric {
                        format!("不能小于 {}", bound)
                    } else {
                        format!("长度不能少于 {} 个字符", bound)
                    }
                }),
            Rule::Max { value: bound } => bound_check(compiled.numeric, value, |n| n > *bound)
                .then(|| {
                    if compiled.numeric {
                        format!("不能大于 {}", bound)
                    } else {
                        format!("长度不能超过 {} 个字符", bound)
                    }
                }),
            Rule::In { values } => (!values.iter().any(|v| v == value))
                .then(|| format!("取值必须是 [{}] 之一: {}", values.join(", "), value)),
            Rule::Exists { entity, field } => {
                let found = lookup.find_by_field(entity, field, &Value::Text(value.to_string()))?;
                found
                    .is_none()
                    .then(|| format!("{}.{} 中不存在: {}", entity, field, value))
            }
            Rule::Regex { .. } => None,
        };

        Ok(failed)
    }
}

/// 数值字段比较数值（无法解析视为越界），文本字段比较字符数
fn bound_check(numeric: bool, value: &str, out_of_bound: impl Fn(f64) -> bool) -> bool {
    if numeric {
        value.parse::<f64>().map(&out_of_bound).unwrap_or(true)
    } else {
        out_of_bound(value.chars().count() as f64)
    }
}

fn compile_field(schema: &ColumnSchema, field_rules: &FieldRules) -> EngineResult<CompiledField> {
    let field_type = schema
        .descriptors
        .iter()
        .find(|d| d.path.hops.is_empty() && d.path.field == field_rules.field)
        .filter(|d| !matches!(d.source, SourceKind::Dropdown(_)))
        .map(|d| d.field_type)
        .unwrap_or(FieldType::Text);

    let numeric = matches!(field_type, FieldType::Integer | FieldType::Decimal)
        || field_rules
            .rules
            .iter()
            .any(|r| matches!(r, Rule::Integer | Rule::Numeric));

    let mut checks = Vec::with_capacity(field_rules.rules.len());
    for rule in &field_rules.rules {
        checks.push(match rule {
            Rule::Regex { pattern } => {
                Check::Pattern(Regex::new(pattern).map_err(|e| SchemaError::InvalidRule {
                    expression: format!("regex:{}", pattern),
                    message: e.to_string(),
                })?)
            }
            other => Check::Rule(other.clone()),
        });
    }

    Ok(CompiledField {
        field: field_rules.field.clone(),
        numeric,
        checks,
    })
}
