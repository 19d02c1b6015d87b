// ==========================================
// 实体表格导入导出 - 下拉字段声明
// ==========================================
// 外键字段 ↔ 外部实体展示字段
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownSpec {
    pub field_name: String,
    pub foreign_type: String,
    pub foreign_display_field: String,
    /// 外部实体中被引用的键字段；None = 外部实体主键
    pub foreign_key_field: Option<String>,
}

impl DropdownSpec {
    pub fn new(
        field_name: impl Into<String>,
        foreign_type: impl Into<String>,
        foreign_display_field: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            foreign_type: foreign_type.into(),
            foreign_display_field: foreign_display_field.into(),
            foreign_key_field: None,
        }
    }

    pub fn keyed_by(mut self, field: impl Into<String>) -> Self {
        self.foreign_key_field = Some(field.into());
        self
    }
}
