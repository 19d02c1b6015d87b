// ==========================================
// 实体表格导入导出 - 导入结果模型
// ==========================================
// 职责: 待落库实体图、行级违规、接收/拒绝划分、导入报告
// 红线: 行级问题全部累积，不在第一个错误处中断
// ==========================================

use crate::domain::entity::Record;
use crate::domain::join::LinkMode;
use crate::domain::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// RelationLink - 已解析的关联链接
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationLink {
    pub relation: String,
    pub target_type: String,
    /// to-many 分组序号（从 1 开始）；to-one 为 None
    pub position: Option<usize>,
    pub link_mode: LinkMode,
    /// 已存在记录的主键；Owned 模式下新建记录为 None
    pub target_key: Option<Value>,
    /// 行内该分组的非空字段值
    pub values: Record,
    pub links: Vec<RelationLink>,
}

// ==========================================
// EntityGraph - 未落库的实体图
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityGraph {
    pub entity_type: String,
    pub row_number: usize,
    pub values: Record,
    pub links: Vec<RelationLink>,
}

impl EntityGraph {
    pub fn links_for<'a>(&'a self, relation: &'a str) -> impl Iterator<Item = &'a RelationLink> + 'a {
        self.links.iter().filter(move |l| l.relation == relation)
    }
}

// ==========================================
// 行级违规
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// 声明的导入规则或类型转换失败
    Validation,
    /// 关联/下拉引用无法解析
    ForeignReference,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Validation => write!(f, "VALIDATION"),
            ViolationKind::ForeignReference => write!(f, "FOREIGN_REFERENCE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowViolation {
    pub row_number: usize,
    pub kind: ViolationKind,
    /// 字段名或列头
    pub field: String,
    pub message: String,
}

impl RowViolation {
    pub fn validation(row_number: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row_number,
            kind: ViolationKind::Validation,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn foreign_reference(
        row_number: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row_number,
            kind: ViolationKind::ForeignReference,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RowViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "行 {} [{}] {}: {}",
            self.row_number, self.kind, self.field, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row_number: usize,
    pub violations: Vec<RowViolation>,
}

impl RejectedRow {
    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    pub fn violates(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

// ==========================================
// 单行处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowOutcome {
    Accepted(EntityGraph),
    Rejected(RejectedRow),
}

// ==========================================
// Reconciliation - 接收/拒绝划分
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    pub accepted: Vec<EntityGraph>,
    pub rejected: Vec<RejectedRow>,
    /// 表头中不属于列结构的列（被忽略）
    pub ignored_columns: Vec<String>,
}

impl Reconciliation {
    pub fn push(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Accepted(graph) => self.accepted.push(graph),
            RowOutcome::Rejected(rejected) => self.rejected.push(rejected),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn violation_count(&self) -> usize {
        self.rejected.iter().map(|r| r.violations.len()).sum()
    }
}

// ==========================================
// ImportReport - 一次文件导入的报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub entity_type: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reconciliation: Reconciliation,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitSummary {
    pub batch_id: String,
    pub roots_written: usize,
    pub links_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_partition() {
        let mut result = Reconciliation::default();
        result.push(RowOutcome::Rejected(RejectedRow {
            row_number: 1,
            violations: vec![
                RowViolation::validation(1, "qty", "必填"),
                RowViolation::foreign_reference(1, "customer_id", "不存在"),
            ],
        }));
        result.push(RowOutcome::Accepted(EntityGraph {
            entity_type: "Order".into(),
            row_number: 2,
            values: Record::new(),
            links: Vec::new(),
        }));

        assert_eq!(result.total_rows(), 2);
        assert_eq!(result.violation_count(), 2);
        assert!(result.rejected[0].has_kind(ViolationKind::ForeignReference));
        assert!(result.rejected[0].violates("qty"));
    }
}
