// ==========================================
// 实体表格导入导出 - 内存仓储实现
// ==========================================
// 职责: EntityStore 的内存实现（测试 / 嵌入场景）
// 并发: RwLock 保护；读多写少
// ==========================================

use crate::domain::{EntityType, FieldType, Record, RelationDef, Value};
use crate::repository::entity_store::{EntityStore, ForeignLookup};
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
pub struct MemoryEntityStore {
    /// 实体类型名 → 记录（写入顺序）
    tables: RwLock<HashMap<String, Vec<Record>>>,
    next_id: AtomicI64,
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条记录（测试数据准备），返回落库记录
    pub fn seed(&self, entity: &EntityType, record: Record) -> RepositoryResult<Record> {
        self.upsert(entity, record)
    }

    pub fn count(&self, entity: &str) -> usize {
        self.tables
            .read()
            .map(|t| t.get(entity).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock_error<E: std::fmt::Display>(e: E) -> RepositoryError {
        RepositoryError::LockError(e.to_string())
    }

    fn generate_key(&self, entity: &EntityType) -> Value {
        match entity.field(&entity.primary_key).map(|f| f.field_type) {
            Some(FieldType::Text) => Value::Text(Uuid::new_v4().to_string()),
            _ => Value::Integer(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }
}

impl ForeignLookup for MemoryEntityStore {
    fn find_by_field(
        &self,
        entity: &str,
        field: &str,
        value: &Value,
    ) -> RepositoryResult<Option<Record>> {
        let tables = self.tables.read().map_err(Self::lock_error)?;
        Ok(tables.get(entity).and_then(|records| {
            records
                .iter()
                .find(|r| r.get(field).matches_key(value))
                .cloned()
        }))
    }
}

impl EntityStore for MemoryEntityStore {
    fn load_all(&self, entity: &str) -> RepositoryResult<Vec<Record>> {
        let tables = self.tables.read().map_err(Self::lock_error)?;
        Ok(tables.get(entity).cloned().unwrap_or_default())
    }

    fn load_related(&self, relation: &RelationDef, parent: &Record) -> RepositoryResult<Vec<Record>> {
        let key = parent.get(&relation.local_field);
        if key.is_empty() {
            return Ok(Vec::new());
        }

        let tables = self.tables.read().map_err(Self::lock_error)?;
        Ok(tables
            .get(&relation.target_type)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.get(&relation.foreign_field).matches_key(key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert(&self, entity: &EntityType, mut record: Record) -> RepositoryResult<Record> {
        let mut tables = self.tables.write().map_err(Self::lock_error)?;
        let records = tables.entry(entity.name.clone()).or_default();
        let pk = &entity.primary_key;

        let key = record.get(pk).clone();
        if !key.is_empty() {
            if let Some(existing) = records.iter_mut().find(|r| r.get(pk).matches_key(&key)) {
                for (field, value) in record.iter() {
                    if field != pk {
                        existing.set(field.clone(), value.clone());
                    }
                }
                return Ok(existing.clone());
            }
        } else {
            record.set(pk.clone(), self.generate_key(entity));
        }

        records.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldDef;

    fn customer() -> EntityType {
        EntityType::new("Customer", vec![FieldDef::integer("id"), FieldDef::text("name")])
    }

    #[test]
    fn test_upsert_generates_key_then_updates() {
        let store = MemoryEntityStore::new();
        let created = store
            .upsert(&customer(), Record::new().with("name", "CustomerA"))
            .unwrap();
        let id = created.get("id").clone();
        assert!(matches!(id, Value::Integer(_)));

        let updated = store
            .upsert(&customer(), Record::new().with("id", id.clone()).with("name", "CustomerB"))
            .unwrap();
        assert_eq!(updated.get("name"), &Value::Text("CustomerB".into()));
        assert_eq!(store.count("Customer"), 1);
    }

    #[test]
    fn test_find_by_field_matches_text_key() {
        let store = MemoryEntityStore::new();
        let created = store
            .upsert(&customer(), Record::new().with("name", "CustomerA"))
            .unwrap();
        let key_text = Value::Text(created.get("id").to_cell_string());
        let found = store.find_by_field("Customer", "id", &key_text).unwrap();
        assert_eq!(found, Some(created));
        assert_eq!(store.find_by_field("Customer", "name", &"Nobody".into()).unwrap(), None);
    }

    #[test]
    fn test_load_related_by_foreign_field() {
        let store = MemoryEntityStore::new();
        let item = EntityType::new(
            "OrderItem",
            vec![FieldDef::integer("order_id"), FieldDef::text("name")],
        );
        store.upsert(&item, Record::new().with("order_id", 1i64).with("name", "Widget")).unwrap();
        store.upsert(&item, Record::new().with("order_id", 2i64).with("name", "Gadget")).unwrap();

        let relation = RelationDef::to_many("items", "OrderItem", "id", "order_id");
        let related = store
            .load_related(&relation, &Record::new().with("id", 1i64))
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].get("name"), &Value::Text("Widget".into()));
    }

    #[test]
    fn test_find_by_field_distinguishes_leading_zeros() {
        let store = MemoryEntityStore::new();
        store.upsert(&customer(), Record::new().with("name", "7")).unwrap();
        let padded = store
            .upsert(&customer(), Record::new().with("name", "007"))
            .unwrap();

        let found = store.find_by_field("Customer", "name", &"007".into()).unwrap();
        assert_eq!(found, Some(padded));
        assert_eq!(store.find_by_field("Customer", "name", &"7.0".into()).unwrap(), None);
    }
}
