// ==========================================
// 实体表格导入导出 - 实体图提交
// ==========================================
// 职责: 将导入接收的 EntityGraph 连同关联链接写入仓储
// 顺序: 父侧外键（to-one 目标）先写 → 根记录 → 子侧外键（to-many 等）后写
// Reference 链接: 只维护外键，不改写目标记录的其他字段
// Owned 链接: 按行内值新建或更新目标记录
// 红线: 不做校验，输入必须是已接收的实体图
// ==========================================

use crate::contract::EntityRegistry;
use crate::domain::{
    CommitSummary, EntityGraph, EntityType, LinkMode, Record, RelationDef, RelationLink, Value,
};
use crate::repository::entity_store::EntityStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use tracing::{debug, info, instrument};

pub struct GraphWriter<'a> {
    store: &'a dyn EntityStore,
    registry: &'a EntityRegistry,
}

impl<'a> GraphWriter<'a> {
    pub fn new(store: &'a dyn EntityStore, registry: &'a EntityRegistry) -> Self {
        Self { store, registry }
    }

    /// 提交一批实体图
    ///
    /// # 参数
    /// - batch_id: 导入批次 ID（仅用于日志与汇总）
    /// - graphs: 已接收的实体图（按行顺序写入）
    ///
    /// # 返回
    /// - Ok(CommitSummary): 写入的根记录数与关联链接数
    /// - Err: 仓储故障（已写入的记录不会回滚，由调用方决定事务边界）
    #[instrument(skip(self, graphs), fields(graphs = graphs.len()))]
    pub fn commit(&self, batch_id: &str, graphs: &[EntityGraph]) -> RepositoryResult<CommitSummary> {
        let mut summary = CommitSummary {
            batch_id: batch_id.to_string(),
            ..CommitSummary::default()
        };

        for graph in graphs {
            let (_, links) = self.commit_graph(graph)?;
            summary.roots_written += 1;
            summary.links_written += links;
        }

        info!(
            batch_id = %batch_id,
            roots = summary.roots_written,
            links = summary.links_written,
            "实体图提交完成"
        );
        Ok(summary)
    }

    /// 提交单个实体图，返回落库的根记录与写入的链接数
    pub fn commit_graph(&self, graph: &EntityGraph) -> RepositoryResult<(Record, usize)> {
        let entity = self.entity(&graph.entity_type)?;
        debug!(entity = %entity.name, row = graph.row_number, "提交实体图");
        self.write_node(entity, graph.values.clone(), &graph.links)
    }

    fn entity(&self, name: &str) -> RepositoryResult<&'a EntityType> {
        self.registry
            .get(name)
            .ok_or_else(|| RepositoryError::UnknownEntity(name.to_string()))
    }

    fn relation(entity: &'a EntityType, name: &str) -> RepositoryResult<&'a RelationDef> {
        entity
            .relation(name)
            .ok_or_else(|| RepositoryError::UnknownRelation {
                entity: entity.name.clone(),
                relation: name.to_string(),
            })
    }

    fn write_node(
        &self,
        entity: &'a EntityType,
        mut values: Record,
        links: &[RelationLink],
    ) -> RepositoryResult<(Record, usize)> {
        let mut written = 0;
        let mut child_side = Vec::new();

        // 1. 父侧外键：先落目标记录，再把目标键回填到本记录
        for link in links {
            let relation = Self::relation(entity, &link.relation)?;
            let target = self.entity(&relation.target_type)?;
            if relation.foreign_field != target.primary_key {
                child_side.push((relation, target, link));
                continue;
            }

            let (saved, nested) = self.write_link(target, link, None)?;
            values.set(relation.local_field.clone(), saved.get(&relation.foreign_field).clone());
            written += 1 + nested;
        }

        // 2. 本记录
        let saved = self.store.upsert(entity, values)?;

        // 3. 子侧外键：目标记录指向本记录
        for (relation, target, link) in child_side {
            let parent_key = (relation.foreign_field.clone(), saved.get(&relation.local_field).clone());
            let (_, nested) = self.write_link(target, link, Some(parent_key))?;
            written += 1 + nested;
        }

        Ok((saved, written))
    }

    fn write_link(
        &self,
        target: &'a EntityType,
        link: &RelationLink,
        parent_key: Option<(String, Value)>,
    ) -> RepositoryResult<(Record, usize)> {
        let mut values = match link.link_mode {
            LinkMode::Reference => Record::new(),
            LinkMode::Owned => link.values.clone(),
        };

        if let Some(key) = &link.target_key {
            values.set(target.primary_key.clone(), key.clone());
        } else if let (LinkMode::Owned, Some((fk, fk_value))) = (link.link_mode, &parent_key) {
            // 从属记录：在父记录已有的关联记录中按行内值定位，避免重复导入时新增
            if let Some(existing) = self.find_owned(target, fk, fk_value, &link.values)? {
                values.set(target.primary_key.clone(), existing);
            }
        }

        if let Some((fk, fk_value)) = parent_key {
            values.set(fk, fk_value);
        }

        self.write_node(target, values, &link.links)
    }

    fn find_owned(
        &self,
        target: &EntityType,
        fk: &str,
        fk_value: &Value,
        values: &Record,
    ) -> RepositoryResult<Option<Value>> {
        let natural = values.get(&target.natural_key);
        if natural.is_empty() || target.natural_key == target.primary_key {
            return Ok(None);
        }

        let probe = RelationDef::to_many("owned", target.name.clone(), fk, fk);
        let parent = Record::new().with(fk, fk_value.clone());
        Ok(self
            .store
            .load_related(&probe, &parent)?
            .into_iter()
            .find(|r| r.get(&target.natural_key).matches_key(natural))
            .map(|r| r.get(&target.primary_key).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldDef;
    use crate::repository::entity_store::ForeignLookup;
    use crate::repository::memory_store::MemoryEntityStore;

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry
            .insert(EntityType::new("Customer", vec![FieldDef::text("name")]).with_natural_key("name"))
            .unwrap();
        registry
            .insert(
                EntityType::new("Order", vec![FieldDef::integer("customer_id"), FieldDef::text("code")])
                    .with_relation(RelationDef::to_one("customer", "Customer", "customer_id", "id"))
                    .with_relation(RelationDef::to_many("items", "OrderItem", "id", "order_id")),
            )
            .unwrap();
        registry
            .insert(
                EntityType::new(
                    "OrderItem",
                    vec![
                        FieldDef::integer("order_id"),
                        FieldDef::text("name"),
                        FieldDef::integer("qty"),
                    ],
                )
                .with_natural_key("name"),
            )
            .unwrap();
        registry
    }

    fn item_link(name: &str, qty: i64, position: usize) -> RelationLink {
        RelationLink {
            relation: "items".into(),
            target_type: "OrderItem".into(),
            position: Some(position),
            link_mode: LinkMode::Owned,
            target_key: None,
            values: Record::new().with("name", name).with("qty", qty),
            links: Vec::new(),
        }
    }

    #[test]
    fn test_commit_sets_parent_and_child_foreign_keys() {
        let registry = registry();
        let store = MemoryEntityStore::new();
        let customer = store
            .seed(registry.get("Customer").unwrap(), Record::new().with("name", "CustomerA"))
            .unwrap();

        let graph = EntityGraph {
            entity_type: "Order".into(),
            row_number: 1,
            values: Record::new().with("code", "SO-1"),
            links: vec![
                RelationLink {
                    relation: "customer".into(),
                    target_type: "Customer".into(),
                    position: None,
                    link_mode: LinkMode::Reference,
                    target_key: Some(customer.get("id").clone()),
                    values: Record::new().with("name", "ignored"),
                    links: Vec::new(),
                },
                item_link("Widget", 2, 1),
                item_link("Gadget", 5, 2),
            ],
        };

        let writer = GraphWriter::new(&store, &registry);
        let summary = writer.commit("batch-1", &[graph]).unwrap();
        assert_eq!(summary.roots_written, 1);
        assert_eq!(summary.links_written, 3);

        let order = store.find_by_field("Order", "code", &"SO-1".into()).unwrap().unwrap();
        assert!(order.get("customer_id").matches_key(customer.get("id")));

        let items = store
            .load_related(registry.get("Order").unwrap().relation("items").unwrap(), &order)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get("qty"), &Value::Integer(5));

        // Reference 链接不改写目标记录
        let reloaded = store.find_by_field("Customer", "id", customer.get("id")).unwrap().unwrap();
        assert_eq!(reloaded.get("name"), &Value::Text("CustomerA".into()));
    }

    #[test]
    fn test_owned_children_updated_on_recommit() {
        let registry = registry();
        let store = MemoryEntityStore::new();
        let writer = GraphWriter::new(&store, &registry);

        let first = EntityGraph {
            entity_type: "Order".into(),
            row_number: 1,
            values: Record::new().with("code", "SO-2"),
            links: vec![item_link("Widget", 1, 1)],
        };
        let (order, _) = writer.commit_graph(&first).unwrap();

        let second = EntityGraph {
            values: Record::new().with("id", order.get("id").clone()).with("code", "SO-2"),
            links: vec![item_link("Widget", 9, 1)],
            ..first
        };
        writer.commit_graph(&second).unwrap();

        assert_eq!(store.count("OrderItem"), 1);
        let item = store.find_by_field("OrderItem", "name", &"Widget".into()).unwrap().unwrap();
        assert_eq!(item.get("qty"), &Value::Integer(9));
    }
}
