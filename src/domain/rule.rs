// ==========================================
// 实体表格导入导出 - 导入校验规则
// ==========================================
// 职责: 字段 → 规则表达式映射，解析为 Rule 列表
// 表达式: 以 '|' 分隔，如 "required|integer|min:1|exists:Customer,name"
// 注意: regex 规则的模式中不能包含 '|'，需要时使用 RuleSet::rules 直接声明
// ==========================================

use crate::schema::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Rule - 单条校验规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// 必填（非空白）
    Required,
    /// 文本（任何非空值均满足，仅用于声明意图）
    Text,
    Integer,
    Numeric,
    Boolean,
    Date,
    Email,
    /// 下限：数值字段比较数值，文本字段比较字符数
    Min { value: f64 },
    /// 上限：同 Min
    Max { value: f64 },
    /// 枚举取值
    In { values: Vec<String> },
    Regex { pattern: String },
    /// 外部实体中必须存在 field == 值 的记录
    Exists { entity: String, field: String },
}

impl Rule {
    /// 解析单条规则表达式（如 "max:255"）
    pub fn parse(expression: &str) -> SchemaResult<Rule> {
        let expression = expression.trim();
        let (name, args) = match expression.split_once(':') {
            Some((name, args)) => (name.trim(), Some(args.trim())),
            None => (expression, None),
        };

        let invalid = |message: &str| SchemaError::InvalidRule {
            expression: expression.to_string(),
            message: message.to_string(),
        };

        let rule = match (name.to_ascii_lowercase().as_str(), args) {
            ("required", None) => Rule::Required,
            ("string", None) | ("text", None) => Rule::Text,
            ("integer", None) | ("int", None) => Rule::Integer,
            ("numeric", None) | ("decimal", None) => Rule::Numeric,
            ("boolean", None) | ("bool", None) => Rule::Boolean,
            ("date", None) => Rule::Date,
            ("email", None) => Rule::Email,
            ("min", Some(arg)) => Rule::Min {
                value: arg.parse().map_err(|_| invalid("min 参数必须为数值"))?,
            },
            ("max", Some(arg)) => Rule::Max {
                value: arg.parse().map_err(|_| invalid("max 参数必须为数值"))?,
            },
            ("in", Some(arg)) => {
                let values: Vec<String> = arg
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if values.is_empty() {
                    return Err(invalid("in 至少需要一个取值"));
                }
                Rule::In { values }
            }
            ("regex", Some(arg)) => {
                regex::Regex::new(arg).map_err(|e| invalid(&e.to_string()))?;
                Rule::Regex {
                    pattern: arg.to_string(),
                }
            }
            ("exists", Some(arg)) => {
                let (entity, field) = arg
                    .split_once(',')
                    .map(|(e, f)| (e.trim(), f.trim()))
                    .ok_or_else(|| invalid("exists 格式应为 exists:实体,字段"))?;
                if entity.is_empty() || field.is_empty() {
                    return Err(invalid("exists 格式应为 exists:实体,字段"));
                }
                Rule::Exists {
                    entity: entity.to_string(),
                    field: field.to_string(),
                }
            }
            ("", _) => return Err(invalid("空规则")),
            _ => return Err(invalid("未知规则或参数不匹配")),
        };

        Ok(rule)
    }

    /// 解析 '|' 分隔的规则表达式
    pub fn parse_all(expression: &str) -> SchemaResult<Vec<Rule>> {
        expression
            .split('|')
            .filter(|part| !part.trim().is_empty())
            .map(Rule::parse)
            .collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "required"),
            Rule::Text => write!(f, "string"),
            Rule::Integer => write!(f, "integer"),
            Rule::Numeric => write!(f, "numeric"),
            Rule::Boolean => write!(f, "boolean"),
            Rule::Date => write!(f, "date"),
            Rule::Email => write!(f, "email"),
            Rule::Min { value } => write!(f, "min:{}", value),
            Rule::Max { value } => write!(f, "max:{}", value),
            Rule::In { values } => write!(f, "in:{}", values.join(",")),
            Rule::Regex { pattern } => write!(f, "regex:{}", pattern),
            Rule::Exists { entity, field } => write!(f, "exists:{},{}", entity, field),
        }
    }
}

// ==========================================
// RuleSet - 字段规则集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RuleSource {
    Expression { expression: String },
    Rules { rules: Vec<Rule> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub field: String,
    pub source: RuleSource,
}

/// 字段 → 规则声明（保持声明顺序）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    entries: Vec<RuleEntry>,
}

/// 已解析的单字段规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRules {
    pub field: String,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以表达式声明字段规则
    pub fn rule(mut self, field: impl Into<String>, expression: impl Into<String>) -> Self {
        self.entries.push(RuleEntry {
            field: field.into(),
            source: RuleSource::Expression {
                expression: expression.into(),
            },
        });
        self
    }

    /// 直接声明已构造的规则
    pub fn rules(mut self, field: impl Into<String>, rules: Vec<Rule>) -> Self {
        self.entries.push(RuleEntry {
            field: field.into(),
            source: RuleSource::Rules { rules },
        });
        self
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 解析全部表达式；同一字段的多次声明合并
    pub fn compile(&self) -> SchemaResult<Vec<FieldRules>> {
        let mut compiled: Vec<FieldRules> = Vec::new();

        for entry in &self.entries {
            let rules = match &entry.source {
                RuleSource::Expression { expression } => Rule::parse_all(expression)?,
                RuleSource::Rules { rules } => rules.clone(),
            };

            match compiled.iter_mut().find(|c| c.field == entry.field) {
                Some(existing) => existing.rules.extend(rules),
                None => compiled.push(FieldRules {
                    field: entry.field.clone(),
                    rules,
                }),
            }
        }

        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expression_chain() {
        let rules = Rule::parse_all("required|integer|min:1|max:99").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Required,
                Rule::Integer,
                Rule::Min { value: 1.0 },
                Rule::Max { value: 99.0 }
            ]
        );
    }

    #[test]
    fn test_parse_exists_and_in() {
        assert_eq!(
            Rule::parse("exists:Customer,name").unwrap(),
            Rule::Exists {
                entity: "Customer".into(),
                field: "name".into()
            }
        );
        assert_eq!(
            Rule::parse("in:A, B ,C").unwrap(),
            Rule::In {
                values: vec!["A".into(), "B".into(), "C".into()]
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_bad_args() {
        assert!(matches!(Rule::parse("unique"), Err(SchemaError::InvalidRule { .. })));
        assert!(matches!(Rule::parse("min:abc"), Err(SchemaError::InvalidRule { .. })));
        assert!(matches!(Rule::parse("required:1"), Err(SchemaError::InvalidRule { .. })));
        assert!(matches!(Rule::parse("exists:Customer"), Err(SchemaError::InvalidRule { .. })));
        assert!(matches!(Rule::parse("regex:("), Err(SchemaError::InvalidRule { .. })));
    }

    #[test]
    fn test_compile_merges_same_field() {
        let set = RuleSet::new()
            .rule("qty", "required")
            .rules("qty", vec![Rule::Min { value: 1.0 }])
            .rule("name", "string");
        let compiled = set.compile().unwrap();
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].field, "qty");
        assert!(compiled[0].is_required());
        assert_eq!(compiled[0].rules.len(), 2);
    }

    #[test]
    fn test_display_round_trip() {
        for expr in ["required", "min:3", "in:a,b", "exists:Customer,name"] {
            assert_eq!(Rule::parse(expr).unwrap().to_string(), expr);
        }
    }
}
