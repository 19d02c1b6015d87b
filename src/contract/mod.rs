// ==========================================
// 实体表格导入导出 - 实体契约层
// ==========================================
// 职责: 定义可导入/导出实体必须提供的声明（不包含实现）
// 红线: 声明必须是纯函数，仅在 schema 构建时读取一次
// ==========================================

pub mod registry;

pub use registry::EntityRegistry;

use crate::domain::{DropdownSpec, EntityType, FieldDef, JoinSpec, RelationDef, RuleSet};

// ==========================================
// SheetEntity Trait
// ==========================================
// 用途: 实体类型的静态导入/导出声明
// 注册: EntityRegistry::register::<T>()
pub trait SheetEntity {
    /// 实体类型名（注册表键）
    const NAME: &'static str;

    /// 标量字段（声明顺序即列顺序）
    fn fields() -> Vec<FieldDef>;

    /// 导入校验规则（必需）
    fn import_rules() -> RuleSet;

    /// 关联定义；无关联时为空
    fn relations() -> Vec<RelationDef> {
        Vec::new()
    }

    /// 关联展开声明；为空表示没有关联列
    fn joins() -> Vec<JoinSpec> {
        Vec::new()
    }

    /// 下拉字段声明；为空表示没有字段按外部展示值渲染
    fn dropdown_fields() -> Vec<DropdownSpec> {
        Vec::new()
    }

    fn primary_key() -> &'static str {
        "id"
    }

    /// 导入时按此字段查找已存在记录
    fn natural_key() -> &'static str {
        Self::primary_key()
    }
}

impl EntityType {
    /// 从契约声明构建实体类型
    pub fn of<T: SheetEntity>() -> EntityType {
        let mut entity = EntityType::new(T::NAME, T::fields())
            .with_primary_key(T::primary_key())
            .with_natural_key(T::natural_key())
            .with_rules(T::import_rules());

        for relation in T::relations() {
            entity = entity.with_relation(relation);
        }
        for join in T::joins() {
            entity = entity.with_join(join);
        }
        for dropdown in T::dropdown_fields() {
            entity = entity.with_dropdown(dropdown);
        }

        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldType;

    struct Customer;

    impl SheetEntity for Customer {
        const NAME: &'static str = "Customer";

        fn fields() -> Vec<FieldDef> {
            vec![FieldDef::integer("id"), FieldDef::text("name")]
        }

        fn import_rules() -> RuleSet {
            RuleSet::new().rule("name", "required")
        }

        fn natural_key() -> &'static str {
            "name"
        }
    }

    #[test]
    fn test_entity_type_from_contract() {
        let entity = EntityType::of::<Customer>();
        assert_eq!(entity.name, "Customer");
        assert_eq!(entity.primary_key, "id");
        assert_eq!(entity.natural_key, "name");
        assert_eq!(entity.field("name").map(|f| f.field_type), Some(FieldType::Text));
        assert!(entity.joins.is_empty());
        assert!(entity.dropdowns.is_empty());
        assert!(!entity.rules.is_empty());
    }
}
