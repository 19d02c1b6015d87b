// ==========================================
// 实体表格导入导出 - 列结构构建器
// ==========================================
// 职责: 实体声明 → 扁平有序列结构 (ColumnSchema)
// 顺序: 普通字段（声明顺序）→ 关联展开（声明顺序，深度优先）
// 红线: 环检测在构建时完成，绝不在逐行处理中重复
// ==========================================

use crate::contract::EntityRegistry;
use crate::domain::{
    Cardinality, DropdownSpec, EntityType, JoinSpec, LinkMode, RelationKind, Rule,
};
use crate::schema::column::{
    ColumnDescriptor, ColumnPath, ColumnSchema, JoinGroup, RelationHop, SourceKind,
};
use crate::schema::error::{SchemaError, SchemaResult};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// 构建实体类型的列结构
///
/// # 参数
/// - registry: 实体注册表（解析关联目标类型 / 下拉外部类型）
/// - entity_name: 实体类型名
///
/// # 返回
/// - Ok(ColumnSchema): 列结构（相同声明下结果确定）
/// - Err(SchemaError): 配置错误（未知关联/字段、环、重复列、规则无效等）
#[instrument(skip(registry))]
pub fn build_schema(registry: &EntityRegistry, entity_name: &str) -> SchemaResult<ColumnSchema> {
    let entity = registry.require(entity_name)?;
    SchemaBuilder { registry }.build(entity)
}

struct SchemaBuilder<'a> {
    registry: &'a EntityRegistry,
}

/// 递归展开时的上下文
struct JoinScope<'p> {
    hops: Vec<RelationHop>,
    parent_key: Option<String>,
    /// 当前遍历路径上的实体类型（含根类型）
    path_types: Vec<&'p str>,
}

impl<'a> SchemaBuilder<'a> {
    fn build(&self, entity: &'a EntityType) -> SchemaResult<ColumnSchema> {
        self.validate_fields(entity)?;
        self.validate_dropdowns(entity)?;

        let mut descriptors = Vec::new();
        let mut groups = Vec::new();

        // 1. 普通字段 / 下拉字段
        for field in &entity.fields {
            let source = match entity.dropdown_for(&field.name) {
                Some(dropdown) => SourceKind::Dropdown(self.resolve_dropdown(dropdown)),
                None => SourceKind::Plain,
            };
            descriptors.push(ColumnDescriptor {
                header: field.name.clone(),
                path: ColumnPath::plain(field.name.clone()),
                cardinality: Cardinality::Singular,
                source,
                field_type: field.field_type,
            });
        }

        // 2. 关联展开（深度优先）
        for join in &entity.joins {
            let mut scope = JoinScope {
                hops: Vec::new(),
                parent_key: None,
                path_types: vec![entity.name.as_str()],
            };
            self.walk_join(join, entity, &mut scope, &mut descriptors, &mut groups)?;
        }

        // 3. 导入规则
        let rules = entity.rules.compile()?;
        for field_rules in &rules {
            if entity.field(&field_rules.field).is_none() {
                return Err(SchemaError::UnknownField {
                    entity: entity.name.clone(),
                    field: field_rules.field.clone(),
                });
            }
            for rule in &field_rules.rules {
                if let Rule::Exists { entity: foreign, field } = rule {
                    self.require_field(self.registry.require(foreign)?, field)?;
                }
            }
        }

        let schema = ColumnSchema::new(
            entity.name.clone(),
            entity.primary_key.clone(),
            descriptors,
            groups,
            rules,
        )?;

        info!(
            entity = %entity.name,
            columns = schema.len(),
            join_groups = schema.join_groups.len(),
            "列结构构建完成"
        );
        Ok(schema)
    }

    fn walk_join(
        &self,
        join: &JoinSpec,
        parent: &'a EntityType,
        scope: &mut JoinScope<'a>,
        descriptors: &mut Vec<ColumnDescriptor>,
        groups: &mut Vec<JoinGroup>,
    ) -> SchemaResult<()> {
        join.validate_name()?;

        if let Some(declared) = &join.parent_type {
            if declared != &parent.name {
                return Err(SchemaError::JoinParentMismatch {
                    declared: declared.clone(),
                    actual: parent.name.clone(),
                });
            }
        }

        let relation = parent
            .relation(&join.relation_name)
            .ok_or_else(|| SchemaError::UnknownRelation {
                entity: parent.name.clone(),
                relation: join.relation_name.clone(),
            })?;
        self.require_field(parent, &relation.local_field)?;

        if is_index_segment(&relation.name) {
            return Err(SchemaError::InvalidEntity {
                entity: parent.name.clone(),
                message: format!("关联名不能是纯数字: '{}'", relation.name),
            });
        }

        let target = self.registry.require(&relation.target_type)?;
        self.validate_fields(target)?;
        self.require_field(target, &relation.foreign_field)?;

        if scope.path_types.contains(&target.name.as_str()) {
            let mut cycle: Vec<&str> = scope.path_types.clone();
            cycle.push(&target.name);
            return Err(SchemaError::JoinCycle {
                path: cycle.join(" -> "),
            });
        }

        // 所选字段：空 = 全部字段
        let selected: Vec<String> = if join.selected_fields.is_empty() {
            target.field_names()
        } else {
            join.selected_fields.clone()
        };

        let match_on = join
            .match_on
            .clone()
            .unwrap_or_else(|| target.natural_key.clone());
        self.require_field(target, &match_on)?;

        scope.hops.push(RelationHop {
            relation: relation.name.clone(),
            target_type: target.name.clone(),
            kind: relation.kind,
        });
        let cardinality = if scope.hops.iter().any(|h| h.kind == RelationKind::ToMany) {
            Cardinality::Repeated
        } else {
            Cardinality::Singular
        };

        let group_key = scope
            .hops
            .iter()
            .map(|h| h.relation.as_str())
            .collect::<Vec<_>>()
            .join(".");

        // 同一关联只能展开一次，导入时单元格按分组键归属
        if groups.iter().any(|g| g.key == group_key) {
            return Err(SchemaError::DuplicateJoin { group: group_key });
        }

        let mut own_descriptors = Vec::with_capacity(selected.len());
        let mut seen = HashSet::new();
        for field_name in &selected {
            let field = target.field(field_name).ok_or_else(|| SchemaError::UnknownField {
                entity: target.name.clone(),
                field: field_name.clone(),
            })?;
            if !seen.insert(field_name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    header: format!("{}.{}", group_key, field_name),
                });
            }

            let path = ColumnPath {
                hops: scope.hops.clone(),
                field: field.name.clone(),
            };
            own_descriptors.push(descriptors.len());
            descriptors.push(ColumnDescriptor {
                header: path.key(),
                path,
                cardinality,
                source: SourceKind::Join,
                field_type: field.field_type,
            });
        }

        // 引用关联：导入时按 match_on 查找已存在记录，该字段必须出现在表格中
        if join.link_mode == LinkMode::Reference && !selected.contains(&match_on) {
            return Err(SchemaError::MatchFieldNotSelected {
                group: group_key,
                field: match_on,
            });
        }

        debug!(
            group = %group_key,
            target = %target.name,
            kind = %relation.kind,
            fields = own_descriptors.len(),
            "关联展开"
        );

        groups.push(JoinGroup {
            key: group_key.clone(),
            parent_key: scope.parent_key.clone(),
            depth: scope.hops.len() - 1,
            relation: relation.clone(),
            target_primary_key: target.primary_key.clone(),
            link_mode: join.link_mode,
            match_on,
            descriptors: own_descriptors,
        });

        // 嵌套关联：以关联目标类型为父
        let saved_parent = scope.parent_key.replace(group_key);
        scope.path_types.push(&target.name);
        for nested in &join.nested_joins {
            self.walk_join(nested, target, scope, descriptors, groups)?;
        }
        scope.path_types.pop();
        scope.parent_key = saved_parent;
        scope.hops.pop();

        Ok(())
    }

    /// 字段名唯一
    fn validate_fields(&self, entity: &EntityType) -> SchemaResult<()> {
        let mut seen = HashSet::new();
        for field in &entity.fields {
            // 纯数字段在表头中表示分组序号
            if field.name.trim().is_empty()
                || field.name.contains('.')
                || is_index_segment(&field.name)
            {
                return Err(SchemaError::InvalidEntity {
                    entity: entity.name.clone(),
                    message: format!("字段名无效: '{}'", field.name),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    header: field.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_dropdowns(&self, entity: &EntityType) -> SchemaResult<()> {
        let mut seen = HashSet::new();
        for dropdown in &entity.dropdowns {
            let invalid = |message: String| SchemaError::InvalidDropdown {
                entity: entity.name.clone(),
                field: dropdown.field_name.clone(),
                message,
            };

            if entity.field(&dropdown.field_name).is_none() {
                return Err(invalid("字段不存在".to_string()));
            }
            if !seen.insert(dropdown.field_name.as_str()) {
                return Err(invalid("同一字段重复声明下拉".to_string()));
            }

            let foreign = self
                .registry
                .get(&dropdown.foreign_type)
                .ok_or_else(|| invalid(format!("外部实体未注册: {}", dropdown.foreign_type)))?;
            if foreign.field(&dropdown.foreign_display_field).is_none() {
                return Err(invalid(format!(
                    "展示字段不存在: {}.{}",
                    foreign.name, dropdown.foreign_display_field
                )));
            }
            let key_field = dropdown
                .foreign_key_field
                .as_deref()
                .unwrap_or(&foreign.primary_key);
            if !has_field(foreign, key_field) {
                return Err(invalid(format!("键字段不存在: {}.{}", foreign.name, key_field)));
            }
        }
        Ok(())
    }

    /// 补全键字段（默认外部实体主键），引擎只读取已补全的声明
    fn resolve_dropdown(&self, dropdown: &DropdownSpec) -> DropdownSpec {
        let mut resolved = dropdown.clone();
        if resolved.foreign_key_field.is_none() {
            resolved.foreign_key_field = self
                .registry
                .get(&dropdown.foreign_type)
                .map(|foreign| foreign.primary_key.clone());
        }
        resolved
    }

    fn require_field(&self, entity: &EntityType, field: &str) -> SchemaResult<()> {
        if has_field(entity, field) {
            Ok(())
        } else {
            Err(SchemaError::UnknownField {
                entity: entity.name.clone(),
                field: field.to_string(),
            })
        }
    }
}

fn is_index_segment(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

/// 主键可以不作为表格列声明，但仍是合法的存储字段
fn has_field(entity: &EntityType, field: &str) -> bool {
    entity.field(field).is_some() || entity.primary_key == field
}
