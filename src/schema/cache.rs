// ==========================================
// 实体表格导入导出 - 列结构缓存
// ==========================================
// 职责: 按实体类型缓存 ColumnSchema（进程级，只读共享）
// 并发: 首次构建可并发竞争；构建结果确定，后写入者覆盖即可
// ==========================================

use crate::contract::EntityRegistry;
use crate::schema::builder::build_schema;
use crate::schema::column::ColumnSchema;
use crate::schema::error::{SchemaError, SchemaResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<String, Arc<ColumnSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取列结构，未命中时构建并写入缓存
    pub fn get_or_build(
        &self,
        registry: &EntityRegistry,
        entity_name: &str,
    ) -> SchemaResult<Arc<ColumnSchema>> {
        {
            let schemas = self
                .schemas
                .read()
                .map_err(|e| SchemaError::CacheLock(e.to_string()))?;
            if let Some(schema) = schemas.get(entity_name) {
                debug!(entity = %entity_name, "列结构缓存命中");
                return Ok(Arc::clone(schema));
            }
        }

        // 锁外构建，避免阻塞其他实体类型的读取
        let schema = Arc::new(build_schema(registry, entity_name)?);

        let mut schemas = self
            .schemas
            .write()
            .map_err(|e| SchemaError::CacheLock(e.to_string()))?;
        schemas.insert(entity_name.to_string(), Arc::clone(&schema));
        debug!(entity = %entity_name, cached = schemas.len(), "列结构已缓存");

        Ok(schema)
    }

    pub fn invalidate(&self, entity_name: &str) -> SchemaResult<bool> {
        let mut schemas = self
            .schemas
            .write()
            .map_err(|e| SchemaError::CacheLock(e.to_string()))?;
        Ok(schemas.remove(entity_name).is_some())
    }

    pub fn len(&self) -> usize {
        self.schemas.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
