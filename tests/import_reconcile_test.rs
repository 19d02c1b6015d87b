// ==========================================
// 导入对账集成测试
// ==========================================
// 测试目标: 必填校验、外键引用、逐行独立、未知列、类型转换
// ==========================================


use entity_sheet_io::domain::{LinkMode, SheetRow, Value, ViolationKind};
use entity_sheet_io::engine::{reconcile, Reconciler};
use entity_sheet_io::repository::MemoryEntityStore;
use entity_sheet_io::schema::build_schema;
use test_helpers::{order_registry, seed_customer};

fn order_row(number: usize, customer: &str) -> SheetRow {
    SheetRow::new(number).with("customer_id", customer)
}

#[test]
fn test_required_field_missing_rejects_row() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    let schema = build_schema(&registry, "Order").unwrap();

    let rows = vec![order_row(1, "").with("items.1.name", "Widget")];
    let result = reconcile(&schema, &rows, &store).unwrap();

    assert!(result.accepted.is_empty());
    assert_eq!(result.rejected.len(), 1);
    let rejected = &result.rejected[0];
    assert_eq!(rejected.row_number, 1);
    assert!(rejected.violates("customer_id"));
    assert!(rejected.has_kind(ViolationKind::Validation));
}

#[test]
fn test_unknown_customer_is_foreign_reference_and_later_rows_proceed() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    let customer = seed_customer(&store, &registry, "CustomerA");
    let schema = build_schema(&registry, "Order").unwrap();

    let rows = vec![
        order_row(1, "Nobody").with("items.1.name", "Widget"),
        order_row(2, "CustomerA")
            .with("items.1.name", "Widget")
            .with("items.1.qty", "2")
            .with("items.2.name", "Gadget")
            .with("items.2.qty", "5"),
    ];
    let result = reconcile(&schema, &rows, &store).unwrap();

    assert_eq!(result.rejected.len(), 1);
    assert_eq!(result.rejected[0].row_number, 1);
    assert!(result.rejected[0].has_kind(ViolationKind::ForeignReference));

    assert_eq!(result.accepted.len(), 1);
    let graph = &result.accepted[0];
    assert_eq!(graph.row_number, 2);
    assert!(graph.values.get("customer_id").matches_key(customer.get("id")));

    let items: Vec<_> = graph.links_for("items").collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].position, Some(1));
    assert_eq!(items[0].link_mode, LinkMode::Owned);
    assert_eq!(items[1].values.get("qty"), &Value::Integer(5));
}

#[test]
fn test_all_violations_of_a_row_are_reported() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    let schema = build_schema(&registry, "Customer").unwrap();

    let rows = vec![SheetRow::new(7)
        .with("name", "x".repeat(41))
        .with("email", "not-an-email")
        .with("id", "abc")];
    let result = reconcile(&schema, &rows, &store).unwrap();

    let rejected = &result.rejected[0];
    assert_eq!(rejected.row_number, 7);
    assert!(rejected.violates("name"));
    assert!(rejected.violates("email"));
    assert!(rejected.violates("id"));
    assert_eq!(result.violation_count(), 3);
}

#[test]
fn test_unknown_headers_are_ignored_and_reported() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    seed_customer(&store, &registry, "CustomerA");
    let schema = build_schema(&registry, "Order").unwrap();

    let rows = vec![
        order_row(1, "CustomerA").with("remark", "rush").with("items.1.colour", "red"),
        order_row(2, "CustomerA").with("remark", ""),
    ];
    let result = reconcile(&schema, &rows, &store).unwrap();

    assert_eq!(result.accepted.len(), 2);
    assert_eq!(result.ignored_columns, vec!["items.1.colour", "remark"]);
    assert!(result.accepted[0].links.is_empty());
}

#[test]
fn test_item_type_error_rejects_row() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    seed_customer(&store, &registry, "CustomerA");
    let schema = build_schema(&registry, "Order").unwrap();

    let rows = vec![order_row(1, "CustomerA")
        .with("items.1.name", "Widget")
        .with("items.1.qty", "two")];
    let result = reconcile(&schema, &rows, &store).unwrap();

    assert_eq!(result.rejected.len(), 1);
    assert!(result.rejected[0].violates("items.1.qty"));
}

#[test]
fn test_lazy_outcomes_stop_early() {
    let registry = order_registry();
    let store = MemoryEntityStore::new();
    seed_customer(&store, &registry, "CustomerA");
    let schema = build_schema(&registry, "Order").unwrap();
    let reconciler = Reconciler::new(&schema, &store).unwrap();

    let rows: Vec<SheetRow> = (1..=100).map(|n| order_row(n, "CustomerA")).collect();
    let taken: Vec<_> = reconciler.outcomes(&rows).take(3).collect::<Result<_, _>>().unwrap();
    assert_eq!(taken.len(), 3);
}
