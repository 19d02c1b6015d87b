// ==========================================
// 实体表格导入导出 - 列结构错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 配置错误（构建时致命）/ 未知列（导入时可恢复）
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    // ===== 配置错误（构建 schema 时检测，致命）=====
    #[error("实体类型未注册: {0}")]
    UnknownEntity(String),

    #[error("实体类型重复注册: {0}")]
    DuplicateEntity(String),

    #[error("实体声明无效 (entity={entity}): {message}")]
    InvalidEntity { entity: String, message: String },

    #[error("关联名不能为空 (parent={parent})")]
    EmptyRelationName { parent: String },

    #[error("关联未定义: {entity}.{relation}")]
    UnknownRelation { entity: String, relation: String },

    #[error("字段未定义: {entity}.{field}")]
    UnknownField { entity: String, field: String },

    #[error("关联展开挂载错误: 声明属于 {declared}，实际挂在 {actual} 上")]
    JoinParentMismatch { declared: String, actual: String },

    #[error("关联展开存在环: {path}")]
    JoinCycle { path: String },

    #[error("列路径重复: {header}")]
    DuplicateColumn { header: String },

    #[error("同一关联重复展开: {group}")]
    DuplicateJoin { group: String },

    #[error("引用关联 {group} 的匹配字段 {field} 不在所选字段中")]
    MatchFieldNotSelected { group: String, field: String },

    #[error("下拉字段声明无效 ({entity}.{field}): {message}")]
    InvalidDropdown {
        entity: String,
        field: String,
        message: String,
    },

    #[error("校验规则无效 ({expression}): {message}")]
    InvalidRule { expression: String, message: String },

    // ===== 导入列解析错误（可恢复，列被忽略）=====
    #[error("未知列: {header}")]
    UnknownColumn { header: String },

    // ===== 通用错误 =====
    #[error("列结构缓存锁获取失败: {0}")]
    CacheLock(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SchemaError {
    /// 是否属于配置错误（应中止该实体类型的使用）
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            SchemaError::UnknownColumn { .. } | SchemaError::CacheLock(_) | SchemaError::Other(_)
        )
    }
}

/// Result 类型别名
pub type SchemaResult<T> = Result<T, SchemaError>;
