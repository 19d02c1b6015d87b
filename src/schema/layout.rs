// ==========================================
// 实体表格导入导出 - 渲染列布局
// ==========================================
// 职责: 列结构 + 各 to-many 关联的分组数量 → 具体表格列
// 展开策略: 每个父分组内独立编号
//   items.1.name, items.1.parts.1.sku, items.1.parts.2.sku, items.2.name, ...
//   嵌套分组数量 = 所有实例、所有父分组中的最大值
// ==========================================

use crate::domain::{EntityInstance, RelationKind};
use crate::schema::column::ColumnSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RepeatCounts - 关联键 → 分组数量
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepeatCounts {
    counts: BTreeMap<String, usize>,
}

impl RepeatCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有 to-many 关联使用同一数量（模板使用）
    pub fn uniform(schema: &ColumnSchema, count: usize) -> Self {
        Self {
            counts: schema
                .repeated_relation_keys()
                .into_iter()
                .map(|key| (key.to_string(), count))
                .collect(),
        }
    }

    /// 统计实例集合中每个 to-many 关联的最大关联数量
    pub fn observe(schema: &ColumnSchema, instances: &[EntityInstance]) -> Self {
        let mut counts = Self::uniform(schema, 0);
        for instance in instances {
            counts.observe_instance(schema, instance, None);
        }
        counts
    }

    fn observe_instance(
        &mut self,
        schema: &ColumnSchema,
        instance: &EntityInstance,
        parent_key: Option<&str>,
    ) {
        for group in schema
            .join_groups
            .iter()
            .filter(|g| g.parent_key.as_deref() == parent_key)
        {
            let related = instance.related(&group.relation.name);
            match group.relation.kind {
                RelationKind::ToMany => {
                    self.raise(&group.key, related.len());
                    for child in related {
                        self.observe_instance(schema, child, Some(&group.key));
                    }
                }
                RelationKind::ToOne => {
                    if let Some(child) = related.first() {
                        self.observe_instance(schema, child, Some(&group.key));
                    }
                }
            }
        }
    }

    pub fn raise(&mut self, key: &str, count: usize) {
        let entry = self.counts.entry(key.to_string()).or_insert(0);
        if count > *entry {
            *entry = count;
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

// ==========================================
// SheetLayout - 渲染后的列
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutColumn {
    pub header: String,
    pub descriptor: usize,
    /// 各 to-many 跳的分组序号（从 1 开始）
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SheetLayout {
    pub columns: Vec<LayoutColumn>,
}

impl SheetLayout {
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.header == header)
    }
}

impl ColumnSchema {
    /// 按分组数量渲染具体列
    pub fn layout(&self, counts: &RepeatCounts) -> SheetLayout {
        let all: Vec<usize> = (0..self.descriptors.len()).collect();
        let mut columns = Vec::new();
        let mut indices = Vec::new();
        self.expand(&all, 0, &mut indices, counts, &mut columns);
        SheetLayout { columns }
    }

    /// 模板布局：每个 to-many 关联渲染 groups 组
    pub fn template_layout(&self, groups: usize) -> SheetLayout {
        self.layout(&RepeatCounts::uniform(self, groups))
    }

    /// 展开同一前缀下的描述符（range 内描述符在 depth 之前的跳完全相同）
    fn expand(
        &self,
        range: &[usize],
        depth: usize,
        indices: &mut Vec<usize>,
        counts: &RepeatCounts,
        out: &mut Vec<LayoutColumn>,
    ) {
        let mut i = 0;
        while i < range.len() {
            let descriptor = &self.descriptors[range[i]];

            // 本层字段
            if descriptor.path.hops.len() == depth {
                out.push(LayoutColumn {
                    header: descriptor.path.render(indices),
                    descriptor: range[i],
                    indices: indices.clone(),
                });
                i += 1;
                continue;
            }

            // 同一关联的连续描述符（构建器保证深度优先连续）
            let hop = &descriptor.path.hops[depth];
            let start = i;
            while i < range.len() {
                let hops = &self.descriptors[range[i]].path.hops;
                if hops.len() > depth && hops[depth].relation == hop.relation {
                    i += 1;
                } else {
                    break;
                }
            }
            let run = &range[start..i];

            match hop.kind {
                RelationKind::ToOne => self.expand(run, depth + 1, indices, counts, out),
                RelationKind::ToMany => {
                    let count = counts.get(&descriptor.path.relation_key(depth));
                    for index in 1..=count {
                        indices.push(index);
                        self.expand(run, depth + 1, indices, counts, out);
                        indices.pop();
                    }
                }
            }
        }
    }
}
