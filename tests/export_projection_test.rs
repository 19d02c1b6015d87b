// ==========================================
// 导出投影集成测试
// ==========================================
// 测试目标: 列结构、订单导出场景、重复分组数量、下拉展示值
// ==========================================


use entity_sheet_io::domain::{Cardinality, Record};
use entity_sheet_io::engine::project;
use entity_sheet_io::repository::{load_instances, EntityStore, MemoryEntityStore};
use entity_sheet_io::schema::{build_schema, SourceKind};
use test_helpers::{entity, order_registry, seed_customer, seed_order, seed_scenario};

#[test]
fn test_order_column_schema() {
    let registry = order_registry();
    let schema = build_schema(&registry, "Order").unwrap();

    assert_eq!(schema.headers(), vec!["customer_id", "items.name", "items.qty"]);
    assert!(matches!(schema.descriptor(0).source, SourceKind::Dropdown(_)));
    assert_eq!(schema.descriptor(0).cardinality, Cardinality::Singular);
    assert_eq!(schema.descriptor(1).cardinality, Cardinality::Repeated);
    assert_eq!(schema.descriptor(2).cardinality, Cardinality::Repeated);

    // 同一声明多次构建结果一致
    let rebuilt = build_schema(&registry, "Order").unwrap();
    assert_eq!(schema.headers(), rebuilt.headers());
    assert_eq!(schema.join_groups.len(), rebuilt.join_groups.len());
}

#[test]
fn test_export_orders_with_items() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    seed_scenario(&store, &registry);

    let schema = build_schema(&registry, "Order").unwrap();
    let instances = load_instances(&store, &schema).unwrap();
    let projection = project(&schema, &instances, &store).unwrap();

    assert_eq!(
        projection.headers(),
        vec!["customer_id", "items.1.name", "items.1.qty", "items.2.name", "items.2.qty"]
    );
    assert_eq!(projection.rows.len(), 2);
    assert_eq!(
        projection.rows[0].to_strings(),
        vec!["CustomerA", "Widget", "2", "Gadget", "5"]
    );
    assert_eq!(projection.rows[1].to_strings(), vec!["CustomerB", "", "", "", ""]);
}

#[test]
fn test_group_count_is_collection_maximum() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    let customer = seed_customer(&store, &registry, "CustomerA");
    seed_order(&store, &registry, &customer, &[("A", 1)]);
    seed_order(&store, &registry, &customer, &[("B", 1), ("C", 2), ("D", 3)]);
    seed_order(&store, &registry, &customer, &[]);

    let schema = build_schema(&registry, "Order").unwrap();
    let instances = load_instances(&store, &schema).unwrap();
    let projection = project(&schema, &instances, &store).unwrap();

    // 1 + 3 × 2 列
    assert_eq!(projection.headers().len(), 7);
    assert_eq!(projection.headers().last().map(String::as_str), Some("items.3.qty"));

    let first = projection.rows[0].to_strings();
    assert_eq!(&first[1..3], ["A", "1"]);
    assert!(first[3..].iter().all(String::is_empty));

    let third = projection.rows[2].to_strings();
    assert_eq!(third[0], "CustomerA");
    assert!(third[1..].iter().all(String::is_empty));
}

#[test]
fn test_missing_dropdown_target_exports_empty() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    store
        .upsert(entity(&registry, "Order"), Record::new().with("customer_id", 404))
        .unwrap();

    let schema = build_schema(&registry, "Order").unwrap();
    let instances = load_instances(&store, &schema).unwrap();
    let projection = project(&schema, &instances, &store).unwrap();

    assert_eq!(projection.headers(), vec!["customer_id"]);
    assert_eq!(projection.rows[0].to_strings(), vec![""]);
}
