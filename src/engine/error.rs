// ==========================================
// 实体表格导入导出 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 配置错误（列结构/规则）/ 协作方错误（仓储查找失败）
// 注意: 行级违规不是错误，见 domain::graph::RowViolation
// ==========================================

use crate::repository::error::RepositoryError;
use crate::schema::error::SchemaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("配置错误: {0}")]
    Schema(#[from] SchemaError),

    #[error("协作方错误: {0}")]
    Collaborator(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Schema(e) if e.is_configuration())
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
