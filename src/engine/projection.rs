// ==========================================
// 实体表格导入导出 - 导出投影引擎
// ==========================================
// 职责: 实例集合 → 扁平表格行
// 规则:
// - 行顺序与输入实例顺序一致
// - 下拉字段: 外键 → 外部实体展示值；外部记录缺失 → 空值
// - to-one: 关联字段或空值；to-many: 按整批最大数量展开分组，不足补空
// - 嵌套关联: 每个父分组内独立编号（见 schema::layout）
// 红线: 不跳过任何行；协作方故障中止整个导出
// ==========================================

use crate::domain::{DropdownSpec, EntityInstance, RelationKind, Value};
use crate::engine::error::EngineResult;
use crate::repository::entity_store::ForeignLookup;
use crate::schema::{ColumnDescriptor, ColumnSchema, RepeatCounts, SheetLayout, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// 导出行（与 SheetLayout 列一一对应）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportRow {
    pub cells: Vec<Value>,
}

impl ExportRow {
    /// 单元格文本（CSV 写出 / 断言使用）
    pub fn to_strings(&self) -> Vec<String> {
        self.cells.iter().map(Value::to_cell_string).collect()
    }
}

/// 一次导出的投影结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Projection {
    pub layout: SheetLayout,
    pub rows: Vec<ExportRow>,
}

impl Projection {
    pub fn headers(&self) -> Vec<String> {
        self.layout.headers()
    }
}

/// 投影实例集合；分组数量取自实例集合本身
#[instrument(skip(schema, instances, lookup), fields(entity = %schema.entity_type, instances = instances.len()))]
pub fn project(
    schema: &ColumnSchema,
    instances: &[EntityInstance],
    lookup: &dyn ForeignLookup,
) -> EngineResult<Projection> {
    let counts = RepeatCounts::observe(schema, instances);
    ExportProjector::new(schema, lookup).project(instances, &counts)
}

pub struct ExportProjector<'a> {
    schema: &'a ColumnSchema,
    lookup: &'a dyn ForeignLookup,
    /// (字段名, 外键文本) → 展示值；单次投影内复用
    display_cache: HashMap<(String, String), Value>,
}

impl<'a> ExportProjector<'a> {
    pub fn new(schema: &'a ColumnSchema, lookup: &'a dyn ForeignLookup) -> Self {
        Self {
            schema,
            lookup,
            display_cache: HashMap::new(),
        }
    }

    /// 按给定分组数量投影
    pub fn project(
        mut self,
        instances: &[EntityInstance],
        counts: &RepeatCounts,
    ) -> EngineResult<Projection> {
        let layout = self.schema.layout(counts);
        debug!(columns = layout.len(), "导出列布局");

        let mut rows = Vec::with_capacity(instances.len());
        for instance in instances {
            let mut cells = Vec::with_capacity(layout.len());
            for column in &layout.columns {
                let descriptor = self.schema.descriptor(column.descriptor);
                cells.push(self.cell(instance, descriptor, &column.indices)?);
            }
            rows.push(ExportRow { cells });
        }

        info!(
            entity = %self.schema.entity_type,
            rows = rows.len(),
            columns = layout.len(),
            lookups = self.display_cache.len(),
            "导出投影完成"
        );
        Ok(Projection { layout, rows })
    }

    fn cell(
        &mut self,
        instance: &EntityInstance,
        descriptor: &ColumnDescriptor,
        indices: &[usize],
    ) -> EngineResult<Value> {
        let Some(owner) = navigate(instance, descriptor, indices) else {
            return Ok(Value::Empty);
        };
        let raw = owner.record.get(&descriptor.path.field);

        match &descriptor.source {
            SourceKind::Dropdown(spec) => self.display_value(spec, raw),
            SourceKind::Plain | SourceKind::Join => Ok(raw.clone()),
        }
    }

    fn display_value(&mut self, spec: &DropdownSpec, key: &Value) -> EngineResult<Value> {
        if key.is_empty() {
            return Ok(Value::Empty);
        }

        let cache_key = (spec.field_name.clone(), key.to_cell_string());
        if let Some(cached) = self.display_cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let key_field = spec.foreign_key_field.as_deref().unwrap_or("id");
        let display = match self.lookup.find_by_field(&spec.foreign_type, key_field, key)? {
            Some(record) => record.get(&spec.foreign_display_field).clone(),
            None => {
                debug!(
                    field = %spec.field_name,
                    foreign = %spec.foreign_type,
                    key = %key,
                    "下拉外部记录不存在，输出空值"
                );
                Value::Empty
            }
        };

        self.display_cache.insert(cache_key, display.clone());
        Ok(display)
    }
}

/// 沿列路径定位字段所属实例；任一跳缺失返回 None
fn navigate<'i>(
    instance: &'i EntityInstance,
    descriptor: &ColumnDescriptor,
    indices: &[usize],
) -> Option<&'i EntityInstance> {
    let mut current = instance;
    let mut next_index = indices.iter();

    for hop in &descriptor.path.hops {
        let related = current.related(&hop.relation);
        current = match hop.kind {
            RelationKind::ToOne => related.first()?,
            RelationKind::ToMany => {
                let index = *next_index.next()?;
                related.get(index.checked_sub(1)?)?
            }
        };
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::EntityRegistry;
    use crate::domain::{EntityType, FieldDef, JoinSpec, Record, RelationDef};
    use crate::repository::load_instances;
    use crate::repository::memory_store::MemoryEntityStore;
    use crate::schema::build_schema;

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry
            .insert(
                EntityType::new("Shipment", vec![FieldDef::text("code")])
                    .with_relation(RelationDef::to_many("boxes", "Box", "id", "shipment_id"))
                    .with_join(
                        JoinSpec::new("boxes")
                            .fields(["label"])
                            .owned()
                            .nest(JoinSpec::new("parts").fields(["sku"]).owned()),
                    ),
            )
            .unwrap();
        registry
            .insert(
                EntityType::new("Box", vec![FieldDef::integer("shipment_id"), FieldDef::text("label")])
                    .with_relation(RelationDef::to_many("parts", "Part", "id", "box_id")),
            )
            .unwrap();
        registry
            .insert(EntityType::new(
                "Part",
                vec![FieldDef::integer("box_id"), FieldDef::text("sku")],
            ))
            .unwrap();
        registry
    }

    fn boxed(label: &str, skus: &[&str]) -> EntityInstance {
        EntityInstance::new(Record::new().with("label", label)).with_related(
            "parts",
            skus.iter()
                .map(|sku| EntityInstance::new(Record::new().with("sku", *sku)))
                .collect(),
        )
    }

    #[test]
    fn test_nested_to_many_indexed_per_parent_branch() {
        let schema = build_schema(&registry(), "Shipment").unwrap();
        let instances = vec![
            EntityInstance::new(Record::new().with("code", "S1"))
                .with_related("boxes", vec![boxed("A", &["a1"]), boxed("B", &["b1", "b2"])]),
            EntityInstance::new(Record::new().with("code", "S2"))
                .with_related("boxes", vec![boxed("C", &[])]),
        ];

        let projection = project(&schema, &instances, &MemoryEntityStore::new()).unwrap();
        assert_eq!(
            projection.headers(),
            vec![
                "code",
                "boxes.1.label",
                "boxes.1.parts.1.sku",
                "boxes.1.parts.2.sku",
                "boxes.2.label",
                "boxes.2.parts.1.sku",
                "boxes.2.parts.2.sku",
            ]
        );
        assert_eq!(
            projection.rows[0].to_strings(),
            vec!["S1", "A", "a1", "", "B", "b1", "b2"]
        );
        assert_eq!(projection.rows[1].to_strings(), vec!["S2", "C", "", "", "", "", ""]);
    }

    #[test]
    fn test_empty_collection_has_no_group_columns() {
        let schema = build_schema(&registry(), "Shipment").unwrap();
        let projection = project(&schema, &[], &MemoryEntityStore::new()).unwrap();
        assert_eq!(projection.headers(), vec!["code"]);
        assert!(projection.rows.is_empty());
    }

    #[test]
    fn test_to_one_join_fields_or_empty() {
        let mut registry = EntityRegistry::new();
        registry
            .insert(
                EntityType::new("Warehouse", vec![FieldDef::text("name"), FieldDef::text("city")])
                    .with_natural_key("name"),
            )
            .unwrap();
        registry
            .insert(
                EntityType::new(
                    "Shipment",
                    vec![FieldDef::text("code"), FieldDef::integer("warehouse_id")],
                )
                .with_relation(RelationDef::to_one("warehouse", "Warehouse", "warehouse_id", "id"))
                .with_join(JoinSpec::new("warehouse").fields(["name", "city"])),
            )
            .unwrap();

        let store = MemoryEntityStore::new();
        let warehouse = store
            .seed(
                registry.get("Warehouse").unwrap(),
                Record::new().with("name", "North").with("city", "Oslo"),
            )
            .unwrap();
        let shipment = registry.get("Shipment").unwrap();
        store
            .seed(
                shipment,
                Record::new()
                    .with("code", "S1")
                    .with("warehouse_id", warehouse.get("id").clone()),
            )
            .unwrap();
        store.seed(shipment, Record::new().with("code", "S2")).unwrap();

        let schema = build_schema(&registry, "Shipment").unwrap();
        let instances = load_instances(&store, &schema).unwrap();
        let projection = project(&schema, &instances, &store).unwrap();

        assert_eq!(
            projection.headers(),
            vec!["code", "warehouse_id", "warehouse.name", "warehouse.city"]
        );
        let with_warehouse = projection.rows[0].to_strings();
        assert_eq!(with_warehouse[0], "S1");
        assert_eq!(with_warehouse[2..].to_vec(), vec!["North", "Oslo"]);
        assert_eq!(projection.rows[1].to_strings(), vec!["S2", "", "", ""]);
    }
}
