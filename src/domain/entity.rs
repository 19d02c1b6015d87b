// ==========================================
// 实体表格导入导出 - 实体类型与实例
// ==========================================
// 职责: 实体类型声明（字段/关联/关联展开/下拉/规则）+ 运行时记录
// 红线: EntityType 启动时构建，之后只读
// ==========================================

use crate::domain::dropdown::DropdownSpec;
use crate::domain::join::JoinSpec;
use crate::domain::rule::RuleSet;
use crate::domain::types::{FieldType, RelationKind};
use crate::domain::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// FieldDef - 标量字段声明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Decimal)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }
}

// ==========================================
// RelationDef - 关联声明
// ==========================================
// 关联记录 = target_type 中 foreign_field == 本实体.local_field 的记录
// - to-one（如 Order.customer）: local_field=customer_id, foreign_field=id
// - to-many（如 Order.items）:   local_field=id,          foreign_field=order_id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub target_type: String,
    pub kind: RelationKind,
    pub local_field: String,
    pub foreign_field: String,
}

impl RelationDef {
    /// 声明 to-one 关联（外键在本实体上）
    pub fn to_one(
        name: impl Into<String>,
        target_type: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            kind: RelationKind::ToOne,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
        }
    }

    /// 声明 to-many 关联（外键在关联实体上）
    pub fn to_many(
        name: impl Into<String>,
        target_type: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            kind: RelationKind::ToMany,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
        }
    }
}

// ==========================================
// EntityType - 实体类型（声明聚合）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub primary_key: String,
    pub natural_key: String,
    pub relations: Vec<RelationDef>,
    pub joins: Vec<JoinSpec>,
    pub dropdowns: Vec<DropdownSpec>,
    pub rules: RuleSet,
}

impl EntityType {
    /// 创建实体类型（主键与自然键默认为 "id"）
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
            primary_key: "id".to_string(),
            natural_key: "id".to_string(),
            relations: Vec::new(),
            joins: Vec::new(),
            dropdowns: Vec::new(),
            rules: RuleSet::default(),
        }
    }

    /// 设置主键；若自然键仍为默认值则一并跟随
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if self.natural_key == self.primary_key {
            self.natural_key = field.clone();
        }
        self.primary_key = field;
        self
    }

    pub fn with_natural_key(mut self, field: impl Into<String>) -> Self {
        self.natural_key = field.into();
        self
    }

    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// 追加关联展开声明（parent_type 自动填充为本实体）
    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join.with_parent(self.name.clone()));
        self
    }

    pub fn with_dropdown(mut self, dropdown: DropdownSpec) -> Self {
        self.dropdowns.push(dropdown);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn dropdown_for(&self, field_name: &str) -> Option<&DropdownSpec> {
        self.dropdowns.iter().find(|d| d.field_name == field_name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

// ==========================================
// Record - 单条实体记录（字段名 → 值）
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取字段值；缺失字段视为 Empty
    pub fn get(&self, field: &str) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.values.get(field).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(Value::is_empty)
    }

    /// 用另一条记录的非空字段覆盖本记录
    pub fn merge_non_empty(&mut self, other: &Record) {
        for (field, value) in other.iter() {
            if !value.is_empty() {
                self.values.insert(field.clone(), value.clone());
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ==========================================
// EntityInstance - 已加载关联的实体实例（导出输入）
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityInstance {
    pub record: Record,
    /// 关联名 → 有序关联实例（to-one 至多一条）
    pub related: BTreeMap<String, Vec<EntityInstance>>,
}

impl EntityInstance {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            related: BTreeMap::new(),
        }
    }

    pub fn with_related(mut self, relation: impl Into<String>, instances: Vec<EntityInstance>) -> Self {
        self.related.insert(relation.into(), instances);
        self
    }

    pub fn related(&self, relation: &str) -> &[EntityInstance] {
        self.related
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_missing_field_is_empty() {
        let record = Record::new().with("name", "Widget");
        assert_eq!(record.get("name"), &Value::Text("Widget".into()));
        assert_eq!(record.get("qty"), &Value::Empty);
    }

    #[test]
    fn test_merge_non_empty_keeps_existing() {
        let mut base = Record::new().with("name", "Widget").with("qty", 2i64);
        let patch = Record::new().with("qty", 5i64).with("name", Value::Empty);
        base.merge_non_empty(&patch);
        assert_eq!(base.get("name"), &Value::Text("Widget".into()));
        assert_eq!(base.get("qty"), &Value::Integer(5));
    }

    #[test]
    fn test_primary_key_moves_natural_key() {
        let entity = EntityType::new("Customer", vec![FieldDef::text("code")])
            .with_primary_key("code");
        assert_eq!(entity.natural_key, "code");

        let entity = EntityType::new("Customer", vec![FieldDef::text("code")])
            .with_natural_key("name")
            .with_primary_key("code");
        assert_eq!(entity.natural_key, "name");
    }
}
