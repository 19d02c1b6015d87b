// ==========================================
// 实体表格导入导出 - 导入对账引擎
// ==========================================
// 职责: 表格原始行 → 接收的实体图 / 拒绝的行（含全部违规）
// 流程（每行独立）:
// 1. 表头 → 列路径（未知列忽略）
// 2. 导入规则求值（本实体字段原始文本）
// 3. 类型转换 + 下拉展示值 → 外键
// 4. 关联分组 → RelationLink（Reference 查不到即外键引用违规）
// 红线: 违规逐行累积，不中断批次；不做任何持久化
// ==========================================

use crate::domain::{
    EntityGraph, LinkMode, Reconciliation, Record, RejectedRow, RelationLink, RelationKind,
    RowOutcome, RowViolation, SheetRow, Value,
};
use crate::engine::error::EngineResult;
use crate::engine::rule_eval::RuleEvaluator;
use crate::repository::entity_store::ForeignLookup;
use crate::schema::{ColumnPath, ColumnSchema, JoinGroup, SourceKind};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument};

/// 对账整批行
///
/// # 返回
/// - Ok(Reconciliation): 接收/拒绝划分（行顺序保持）+ 被忽略的列
/// - Err: 配置错误或查找协作方故障（中止整批）
#[instrument(skip(schema, rows, lookup), fields(entity = %schema.entity_type, rows = rows.len()))]
pub fn reconcile(
    schema: &ColumnSchema,
    rows: &[SheetRow],
    lookup: &dyn ForeignLookup,
) -> EngineResult<Reconciliation> {
    let reconciler = Reconciler::new(schema, lookup)?;
    let mut result = Reconciliation {
        ignored_columns: reconciler.ignored_columns(rows.iter().flat_map(|r| r.cells.keys())),
        ..Reconciliation::default()
    };

    for outcome in reconciler.outcomes(rows) {
        result.push(outcome?);
    }

    info!(
        entity = %schema.entity_type,
        accepted = result.accepted.len(),
        rejected = result.rejected.len(),
        ignored_columns = result.ignored_columns.len(),
        "导入对账完成"
    );
    Ok(result)
}

/// 单元格归属（已解析的列）
struct Cell<'r> {
    descriptor: usize,
    header: &'r str,
    raw: &'r str,
}

/// 一行按列结构分桶后的单元格
#[derive(Default)]
struct RowCells<'r> {
    /// 本实体字段名 → 单元格
    root: Vec<Cell<'r>>,
    /// (关联键, 分组序号) → 单元格
    groups: HashMap<(String, Vec<usize>), Vec<Cell<'r>>>,
}

pub struct Reconciler<'a> {
    schema: &'a ColumnSchema,
    lookup: &'a dyn ForeignLookup,
    evaluator: RuleEvaluator,
}

impl<'a> Reconciler<'a> {
    pub fn new(schema: &'a ColumnSchema, lookup: &'a dyn ForeignLookup) -> EngineResult<Self> {
        Ok(Self {
            schema,
            lookup,
            evaluator: RuleEvaluator::new(schema)?,
        })
    }

    /// 不属于列结构的表头（去重、排序）
    pub fn ignored_columns<'h>(&self, headers: impl IntoIterator<Item = &'h String>) -> Vec<String> {
        headers
            .into_iter()
            .filter(|h| self.schema.resolve_path(h).is_err())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 惰性逐行对账；调用方停止消费即在批次粒度取消
    pub fn outcomes<'r>(
        &'r self,
        rows: &'r [SheetRow],
    ) -> impl Iterator<Item = EngineResult<RowOutcome>> + 'r {
        rows.iter().map(move |row| self.reconcile_row(row))
    }

    pub fn reconcile_row(&self, row: &SheetRow) -> EngineResult<RowOutcome> {
        let cells = self.bucket(row);

        // 1. 规则求值（原始文本）
        let raw: HashMap<String, String> = cells
            .root
            .iter()
            .map(|c| {
                let field = &self.schema.descriptor(c.descriptor).path.field;
                (field.clone(), c.raw.to_string())
            })
            .collect();
        let mut violations = self.evaluator.evaluate(row.number, &raw, self.lookup)?;

        // 2. 本实体字段
        let values = self.root_values(row.number, &cells, &mut violations)?;

        // 3. 关联分组
        let links = self.build_links(row.number, &cells, None, &[], &mut violations)?;

        if violations.is_empty() {
            Ok(RowOutcome::Accepted(EntityGraph {
                entity_type: self.schema.entity_type.clone(),
                row_number: row.number,
                values,
                links,
            }))
        } else {
            debug!(row = row.number, violations = violations.len(), "行被拒绝");
            Ok(RowOutcome::Rejected(RejectedRow {
                row_number: row.number,
                violations,
            }))
        }
    }

    fn bucket<'r>(&self, row: &'r SheetRow) -> RowCells<'r> {
        let mut cells = RowCells::default();
        for (header, raw) in &row.cells {
            let Ok(resolved) = self.schema.resolve_path(header) else {
                continue;
            };
            let path = &self.schema.descriptor(resolved.descriptor).path;
            let cell = Cell {
                descriptor: resolved.descriptor,
                header: header.as_str(),
                raw: raw.trim(),
            };

            if path.hops.is_empty() {
                cells.root.push(cell);
            } else {
                let key = path.relation_key(path.hops.len() - 1);
                cells.groups.entry((key, resolved.indices)).or_default().push(cell);
            }
        }
        cells
    }

    fn root_values(
        &self,
        row_number: usize,
        cells: &RowCells<'_>,
        violations: &mut Vec<RowViolation>,
    ) -> EngineResult<Record> {
        let mut values = Record::new();

        for cell in &cells.root {
            if cell.raw.is_empty() {
                continue;
            }
            let descriptor = self.schema.descriptor(cell.descriptor);
            let field = &descriptor.path.field;

            match &descriptor.source {
                SourceKind::Dropdown(spec) => {
                    let display = Value::Text(cell.raw.to_string());
                    match self
                        .lookup
                        .find_by_field(&spec.foreign_type, &spec.foreign_display_field, &display)?
                    {
                        Some(foreign) => {
                            let key_field = spec.foreign_key_field.as_deref().unwrap_or("id");
                            values.set(field.clone(), foreign.get(key_field).clone());
                        }
                        None => violations.push(RowViolation::foreign_reference(
                            row_number,
                            field.clone(),
                            format!(
                                "未找到 {}.{} = {}",
                                spec.foreign_type, spec.foreign_display_field, cell.raw
                            ),
                        )),
                    }
                }
                SourceKind::Plain | SourceKind::Join => {
                    match Value::parse_cell(cell.raw, descriptor.field_type) {
                        Ok(value) => values.set(field.clone(), value),
                        // 规则已报告该字段时不重复报告类型错误
                        Err(message) if !violations.iter().any(|v| &v.field == field) => {
                            violations.push(RowViolation::validation(row_number, field.clone(), message))
                        }
                        Err(_) => {}
                    }
                }
            }
        }

        Ok(values)
    }

    fn build_links(
        &self,
        row_number: usize,
        cells: &RowCells<'_>,
        parent_key: Option<&str>,
        parent_indices: &[usize],
        violations: &mut Vec<RowViolation>,
    ) -> EngineResult<Vec<RelationLink>> {
        let mut links = Vec::new();

        for group in self
            .schema
            .join_groups
            .iter()
            .filter(|g| g.parent_key.as_deref() == parent_key)
        {
            let positions: Vec<Option<usize>> = match group.relation.kind {
                RelationKind::ToOne => vec![None],
                RelationKind::ToMany => present_positions(cells, &group.key, parent_indices)
                    .into_iter()
                    .map(Some)
                    .collect(),
            };

            for position in positions {
                let mut indices = parent_indices.to_vec();
                indices.extend(position);

                if let Some(link) =
                    self.build_link(row_number, cells, group, position, &indices, violations)?
                {
                    links.push(link);
                }
            }
        }

        Ok(links)
    }

    fn build_link(
        &self,
        row_number: usize,
        cells: &RowCells<'_>,
        group: &JoinGroup,
        position: Option<usize>,
        indices: &[usize],
        violations: &mut Vec<RowViolation>,
    ) -> EngineResult<Option<RelationLink>> {
        let mut values = Record::new();
        let own = cells
            .groups
            .get(&(group.key.clone(), indices.to_vec()))
            .map(Vec::as_slice)
            .unwrap_or_default();

        for cell in own.iter().filter(|c| !c.raw.is_empty()) {
            let descriptor = self.schema.descriptor(cell.descriptor);
            match Value::parse_cell(cell.raw, descriptor.field_type) {
                Ok(value) => values.set(descriptor.path.field.clone(), value),
                Err(message) => {
                    violations.push(RowViolation::validation(row_number, cell.header, message))
                }
            }
        }

        let nested = self.build_links(row_number, cells, Some(&group.key), indices, violations)?;

        // 空分组（导出时补齐的空列）不产生链接
        if values.is_empty() && nested.is_empty() {
            return Ok(None);
        }

        let target_key = self.resolve_target(row_number, group, indices, &values, violations)?;

        Ok(Some(RelationLink {
            relation: group.relation.name.clone(),
            target_type: group.relation.target_type.clone(),
            position,
            link_mode: group.link_mode,
            target_key,
            values,
            links: nested,
        }))
    }

    /// 定位已存在的关联记录
    ///
    /// - Reference: 必须按 match_on 找到，否则外键引用违规
    /// - Owned + 父侧外键: 找到则复用，否则新建
    /// - Owned + 子侧外键: 交给提交阶段在父记录的关联记录中定位
    fn resolve_target(
        &self,
        row_number: usize,
        group: &JoinGroup,
        indices: &[usize],
        values: &Record,
        violations: &mut Vec<RowViolation>,
    ) -> EngineResult<Option<Value>> {
        let parent_side = group.relation.foreign_field == group.target_primary_key;
        if group.link_mode == LinkMode::Owned && !parent_side {
            return Ok(None);
        }

        let label = || self.match_label(group, indices);
        let key = values.get(&group.match_on);
        if key.is_empty() {
            if group.link_mode == LinkMode::Reference {
                violations.push(RowViolation::foreign_reference(
                    row_number,
                    label(),
                    format!("关联 {} 缺少匹配字段 {}", group.key, group.match_on),
                ));
            }
            return Ok(None);
        }

        match self
            .lookup
            .find_by_field(&group.relation.target_type, &group.match_on, key)?
        {
            Some(found) => Ok(Some(found.get(&group.target_primary_key).clone())),
            None if group.link_mode == LinkMode::Reference => {
                violations.push(RowViolation::foreign_reference(
                    row_number,
                    label(),
                    format!(
                        "未找到 {}.{} = {}",
                        group.relation.target_type, group.match_on, key
                    ),
                ));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// 违规定位用的列头，如 "items.2.name"
    fn match_label(&self, group: &JoinGroup, indices: &[usize]) -> String {
        match group.descriptors.first() {
            Some(&idx) => ColumnPath {
                hops: self.schema.descriptor(idx).path.hops.clone(),
                field: group.match_on.clone(),
            }
            .render(indices),
            None => group.key.clone(),
        }
    }
}

/// 行内出现过的 to-many 分组序号（含只出现在嵌套列中的分组）
fn present_positions(cells: &RowCells<'_>, group_key: &str, parent_indices: &[usize]) -> BTreeSet<usize> {
    let nested_prefix = format!("{}.", group_key);
    cells
        .groups
        .keys()
        .filter(|(key, indices)| {
            (key == group_key || key.starts_with(&nested_prefix))
                && indices.len() > parent_indices.len()
                && indices.starts_with(parent_indices)
        })
        .map(|(_, indices)| indices[parent_indices.len()])
        .collect()
}
