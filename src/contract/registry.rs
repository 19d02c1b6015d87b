// ==========================================
// 实体表格导入导出 - 实体注册表
// ==========================================
// 职责: 启动时显式注册实体类型（类型名 → EntityType）
// 红线: 注册完成后只读，可在线程间共享（Arc<EntityRegistry>）
// ==========================================

use crate::contract::SheetEntity;
use crate::domain::EntityType;
use crate::schema::error::{SchemaError, SchemaResult};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    types: BTreeMap<String, EntityType>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按契约注册实体类型
    pub fn register<T: SheetEntity>(&mut self) -> SchemaResult<&mut Self> {
        self.insert(EntityType::of::<T>())
    }

    /// 注册已构建的实体类型；同名重复注册视为配置错误
    pub fn insert(&mut self, entity: EntityType) -> SchemaResult<&mut Self> {
        if entity.name.trim().is_empty() {
            return Err(SchemaError::InvalidEntity {
                entity: entity.name,
                message: "实体类型名不能为空".to_string(),
            });
        }
        if self.types.contains_key(&entity.name) {
            return Err(SchemaError::DuplicateEntity(entity.name));
        }

        debug!(
            entity = %entity.name,
            fields = entity.fields.len(),
            joins = entity.joins.len(),
            dropdowns = entity.dropdowns.len(),
            "注册实体类型"
        );
        self.types.insert(entity.name.clone(), entity);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// 获取实体类型，不存在时返回 UnknownEntity
    pub fn require(&self, name: &str) -> SchemaResult<&EntityType> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldDef;

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = EntityRegistry::new();
        registry
            .insert(EntityType::new("Customer", vec![FieldDef::text("name")]))
            .unwrap();
        let err = registry
            .insert(EntityType::new("Customer", vec![]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEntity(name) if name == "Customer"));
    }

    #[test]
    fn test_require_unknown_entity() {
        let registry = EntityRegistry::new();
        assert!(matches!(
            registry.require("Order"),
            Err(SchemaError::UnknownEntity(_))
        ));
        assert!(registry.is_empty());
    }
}
