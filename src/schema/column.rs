// ==========================================
// 实体表格导入导出 - 列结构
// ==========================================
// 职责: 列描述符 / 列路径 / 关联分组 + 表头反解
// 红线: ColumnSchema 构建后不可变，只标记基数，不含实例数量
// ==========================================

use crate::domain::{Cardinality, DropdownSpec, FieldRules, FieldType, LinkMode, RelationDef, RelationKind};
use crate::schema::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 列头分隔符
pub const HEADER_SEPARATOR: char = '.';

// ==========================================
// RelationHop / ColumnPath
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationHop {
    pub relation: String,
    pub target_type: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPath {
    pub hops: Vec<RelationHop>,
    pub field: String,
}

impl ColumnPath {
    pub fn plain(field: impl Into<String>) -> Self {
        Self {
            hops: Vec::new(),
            field: field.into(),
        }
    }

    /// 不含序号的路径键，如 "items.parts.sku"
    pub fn key(&self) -> String {
        let mut parts: Vec<&str> = self.hops.iter().map(|h| h.relation.as_str()).collect();
        parts.push(&self.field);
        parts.join(".")
    }

    /// 前 depth+1 跳的关联键，如 depth=1 → "items.parts"
    pub fn relation_key(&self, depth: usize) -> String {
        self.hops[..=depth]
            .iter()
            .map(|h| h.relation.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// 路径上 to-many 跳数（渲染表头所需序号个数）
    pub fn repeated_hops(&self) -> usize {
        self.hops
            .iter()
            .filter(|h| h.kind == RelationKind::ToMany)
            .count()
    }

    /// 渲染表头；to-many 跳后插入分组序号
    ///
    /// indices 个数必须等于 repeated_hops()
    pub fn render(&self, indices: &[usize]) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.hops.len() * 2 + 1);
        let mut next = indices.iter();
        for hop in &self.hops {
            parts.push(hop.relation.clone());
            if hop.kind == RelationKind::ToMany {
                if let Some(index) = next.next() {
                    parts.push(index.to_string());
                }
            }
        }
        parts.push(self.field.clone());
        parts.join(".")
    }
}

// ==========================================
// 列来源
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// 本实体普通字段
    Plain,
    /// 本实体外键字段，按外部实体展示值渲染
    Dropdown(DropdownSpec),
    /// 关联实体字段
    Join,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// 不含序号的表头（如 "items.name"）
    pub header: String,
    pub path: ColumnPath,
    pub cardinality: Cardinality,
    pub source: SourceKind,
    pub field_type: FieldType,
}

impl ColumnDescriptor {
    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }
}

// ==========================================
// JoinGroup - 一个关联展开节点（导入回填所需元数据）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinGroup {
    /// 关联键，如 "items" / "items.parts"
    pub key: String,
    /// 父分组键；顶层为 None
    pub parent_key: Option<String>,
    pub depth: usize,
    pub relation: RelationDef,
    pub target_primary_key: String,
    pub link_mode: LinkMode,
    /// 导入查找使用的关联实体字段
    pub match_on: String,
    /// 本分组直接字段的描述符下标
    pub descriptors: Vec<usize>,
}

// ==========================================
// ResolvedColumn - 表头反解结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    pub descriptor: usize,
    /// 各 to-many 跳的分组序号（从 1 开始）
    pub indices: Vec<usize>,
}

// ==========================================
// ColumnSchema
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub entity_type: String,
    pub primary_key: String,
    pub descriptors: Vec<ColumnDescriptor>,
    pub join_groups: Vec<JoinGroup>,
    pub rules: Vec<FieldRules>,
    #[serde(skip)]
    by_key: HashMap<String, usize>,
}

impl ColumnSchema {
    pub(crate) fn new(
        entity_type: String,
        primary_key: String,
        descriptors: Vec<ColumnDescriptor>,
        join_groups: Vec<JoinGroup>,
        rules: Vec<FieldRules>,
    ) -> SchemaResult<Self> {
        let mut by_key = HashMap::with_capacity(descriptors.len());
        for (idx, descriptor) in descriptors.iter().enumerate() {
            if by_key.insert(descriptor.path.key(), idx).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    header: descriptor.header.clone(),
                });
            }
        }

        Ok(Self {
            entity_type,
            primary_key,
            descriptors,
            join_groups,
            rules,
            by_key,
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, idx: usize) -> &ColumnDescriptor {
        &self.descriptors[idx]
    }

    /// 不含序号的表头列表（声明顺序）
    pub fn headers(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.header.as_str()).collect()
    }

    pub fn join_group(&self, key: &str) -> Option<&JoinGroup> {
        self.join_groups.iter().find(|g| g.key == key)
    }

    /// 全部 to-many 关联键（用于统计分组数量）
    pub fn repeated_relation_keys(&self) -> Vec<&str> {
        self.join_groups
            .iter()
            .filter(|g| g.relation.kind == RelationKind::ToMany)
            .map(|g| g.key.as_str())
            .collect()
    }

    pub fn rules_for(&self, field: &str) -> Option<&FieldRules> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// 表头 → 列路径
    ///
    /// 支持不含序号的表头（"items.name"，序号视为 1）
    /// 与渲染后的表头（"items.2.name" / "items.1.parts.3.sku"）。
    ///
    /// # 返回
    /// - Err(SchemaError::UnknownColumn): 表头不匹配任何描述符
    pub fn resolve_path(&self, header: &str) -> SchemaResult<ResolvedColumn> {
        let unknown = || SchemaError::UnknownColumn {
            header: header.to_string(),
        };

        let segments: Vec<&str> = header.trim().split(HEADER_SEPARATOR).map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(unknown());
        }

        // 非首段的纯数字视为分组序号
        let mut names: Vec<&str> = Vec::with_capacity(segments.len());
        let mut indices: Vec<usize> = Vec::new();
        for (pos, segment) in segments.iter().enumerate() {
            match segment.parse::<usize>() {
                Ok(index) if pos > 0 => indices.push(index),
                _ => names.push(segment),
            }
        }

        let descriptor = *self.by_key.get(&names.join(".")).ok_or_else(unknown)?;
        let path = &self.descriptors[descriptor].path;
        let expected = path.repeated_hops();

        if indices.is_empty() {
            indices = vec![1; expected];
        } else if indices.len() != expected || indices.contains(&0) {
            return Err(unknown());
        }

        // 序号必须紧跟在对应的 to-many 关联名之后
        let normalized = segments.join(".");
        if normalized != path.key() && path.render(&indices) != normalized {
            return Err(unknown());
        }

        Ok(ResolvedColumn { descriptor, indices })
    }
}
