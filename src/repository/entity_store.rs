// ==========================================
// 实体表格导入导出 - 持久化协作方接口
// ==========================================
// 职责: 定义引擎所需的数据访问接口（不包含业务逻辑）
// 红线: Repository 只做读写，不做导入校验
// ==========================================

use crate::domain::{EntityInstance, EntityType, Record, RelationDef, RelationKind, Value};
use crate::repository::error::RepositoryResult;
use crate::schema::ColumnSchema;
use tracing::debug;

// ==========================================
// ForeignLookup Trait
// ==========================================
// 用途: 下拉展示值翻译、exists 规则、关联引用解析
// 实现者: MemoryEntityStore, SqliteEntityStore
pub trait ForeignLookup: Send + Sync {
    /// 按字段值查找一条记录
    ///
    /// # 参数
    /// - entity: 实体类型名
    /// - field: 字段名
    /// - value: 字段值（按键语义比较，忽略文本/数值差异）
    ///
    /// # 返回
    /// - Ok(Some(Record)): 找到（多条时返回最早写入的一条）
    /// - Ok(None): 不存在
    /// - Err: 数据访问故障
    fn find_by_field(
        &self,
        entity: &str,
        field: &str,
        value: &Value,
    ) -> RepositoryResult<Option<Record>>;
}

// ==========================================
// EntityStore Trait
// ==========================================
// 用途: 导出加载 / 导入提交
pub trait EntityStore: ForeignLookup {
    /// 加载实体类型的全部记录（写入顺序）
    fn load_all(&self, entity: &str) -> RepositoryResult<Vec<Record>>;

    /// 加载父记录的关联记录（target.foreign_field == parent.local_field）
    fn load_related(&self, relation: &RelationDef, parent: &Record) -> RepositoryResult<Vec<Record>>;

    /// 新建或更新（按主键）；返回落库后的完整记录
    fn upsert(&self, entity: &EntityType, record: Record) -> RepositoryResult<Record>;
}

/// 按列结构的关联展开树加载实例（导出输入）
pub fn load_instances(
    store: &dyn EntityStore,
    schema: &ColumnSchema,
) -> RepositoryResult<Vec<EntityInstance>> {
    let records = store.load_all(&schema.entity_type)?;
    debug!(entity = %schema.entity_type, count = records.len(), "加载实体记录");

    records
        .into_iter()
        .map(|record| hydrate(store, schema, record, None))
        .collect()
}

fn hydrate(
    store: &dyn EntityStore,
    schema: &ColumnSchema,
    record: Record,
    parent_key: Option<&str>,
) -> RepositoryResult<EntityInstance> {
    let mut instance = EntityInstance::new(record);

    for group in schema
        .join_groups
        .iter()
        .filter(|g| g.parent_key.as_deref() == parent_key)
    {
        let mut related = store.load_related(&group.relation, &instance.record)?;
        if group.relation.kind == RelationKind::ToOne {
            related.truncate(1);
        }

        let children = related
            .into_iter()
            .map(|child| hydrate(store, schema, child, Some(&group.key)))
            .collect::<RepositoryResult<Vec<_>>>()?;
        instance.related.insert(group.relation.name.clone(), children);
    }

    Ok(instance)
}
