// ==========================================
// 实体表格导入导出 - 关联展开声明 (JoinSpec)
// ==========================================
// 职责: 描述一跳关联、所选字段与嵌套关联
// 红线: 嵌套链路不得回到路径上已出现的类型（由 schema 构建时检测）
// ==========================================

use crate::schema::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};

/// 导入时关联记录的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkMode {
    /// 引用已存在记录；找不到即为外键引用错误
    #[default]
    Reference,
    /// 从属记录；找不到则随根记录一起新建
    Owned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// 所属实体类型；挂到 EntityType 或父级 JoinSpec 上时填充
    pub parent_type: Option<String>,
    pub relation_name: String,
    /// 关联实体的可见字段；空 = 全部字段
    pub selected_fields: Vec<String>,
    pub nested_joins: Vec<JoinSpec>,
    pub link_mode: LinkMode,
    /// 导入时查找关联记录使用的字段；None = 关联实体的自然键
    pub match_on: Option<String>,
}

impl JoinSpec {
    pub fn new(relation_name: impl Into<String>) -> Self {
        Self {
            parent_type: None,
            relation_name: relation_name.into(),
            selected_fields: Vec::new(),
            nested_joins: Vec::new(),
            link_mode: LinkMode::default(),
            match_on: None,
        }
    }

    /// 带校验的构造（关联名不能为空）
    pub fn try_new(relation_name: impl Into<String>) -> SchemaResult<Self> {
        let spec = Self::new(relation_name);
        spec.validate_name()?;
        Ok(spec)
    }

    pub fn with_parent(mut self, parent_type: impl Into<String>) -> Self {
        self.parent_type = Some(parent_type.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn nest(mut self, join: JoinSpec) -> Self {
        self.nested_joins.push(join);
        self
    }

    pub fn owned(mut self) -> Self {
        self.link_mode = LinkMode::Owned;
        self
    }

    pub fn match_on(mut self, field: impl Into<String>) -> Self {
        self.match_on = Some(field.into());
        self
    }

    pub(crate) fn validate_name(&self) -> SchemaResult<()> {
        if self.relation_name.trim().is_empty() {
            return Err(SchemaError::EmptyRelationName {
                parent: self.parent_type.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }
}
