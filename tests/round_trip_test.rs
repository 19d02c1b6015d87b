// ==========================================
// 导出 → 文件 → 导入 → 提交 往返测试
// ==========================================
// 测试目标: 导出的文件重新导入后，落库数据再次导出结果一致
// ==========================================


use entity_sheet_io::engine::{project, reconcile};
use entity_sheet_io::EntityRegistry;
use entity_sheet_io::repository::{load_instances, EntityStore, GraphWriter};
use entity_sheet_io::schema::build_schema;
use entity_sheet_io::sheet::{CsvSheetWriter, SheetReader, SheetWriter, UniversalSheetParser, XlsxSheetWriter};
use tempfile::TempDir;
use test_helpers::{create_test_store, order_registry, seed_customer, seed_scenario};

fn export_rows<S: EntityStore>(store: &S, registry: &EntityRegistry) -> (Vec<String>, Vec<Vec<String>>) {
    let schema = build_schema(registry, "Order").unwrap();
    let instances = load_instances(store, &schema).unwrap();
    let projection = project(&schema, &instances, store).unwrap();
    (
        projection.headers(),
        projection.rows.iter().map(|r| r.to_strings()).collect(),
    )
}

fn round_trip(writer: &dyn SheetWriter, file_name: &str) {
    let registry = order_registry();
    let dir = TempDir::new().unwrap();

    // 源库
    let (_source_db, source) = create_test_store(registry.clone()).unwrap();
    seed_scenario(&source, &registry);
    let schema = build_schema(&registry, "Order").unwrap();
    let instances = load_instances(&source, &schema).unwrap();
    let projection = project(&schema, &instances, &source).unwrap();

    let path = dir.path().join(file_name);
    writer.write(&path, &projection.headers(), &projection.rows).unwrap();

    // 目标库：只有客户
    let (_target_db, target) = create_test_store(registry.clone()).unwrap();
    seed_customer(&target, &registry, "CustomerA");
    seed_customer(&target, &registry, "CustomerB");

    let rows = UniversalSheetParser::default().read_rows(&path).unwrap();
    let result = reconcile(&schema, &rows, &target).unwrap();
    assert!(result.rejected.is_empty(), "{:?}", result.rejected);
    assert!(result.ignored_columns.is_empty());
    assert_eq!(result.accepted.len(), 2);

    let summary = GraphWriter::new(&target, &registry)
        .commit("round-trip", &result.accepted)
        .unwrap();
    assert_eq!(summary.roots_written, 2);
    assert_eq!(summary.links_written, 2);

    assert_eq!(export_rows(&source, &registry), export_rows(&target, &registry));
}

#[test]
fn test_csv_round_trip() {
    round_trip(&CsvSheetWriter::default(), "orders.csv");
}

#[test]
fn test_xlsx_round_trip() {
    round_trip(&XlsxSheetWriter::default(), "orders.xlsx");
}
