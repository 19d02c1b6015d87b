// ==========================================
// 实体表格导入导出 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，转换为调用方可读的错误消息
// 注意: 行级违规在 ImportReport 中返回，不属于 ApiError
// ==========================================

use crate::config::ConfigResult;
use crate::engine::EngineError;
use crate::repository::error::RepositoryError;
use crate::schema::error::SchemaError;
use crate::sheet::SheetError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 声明 / 配置错误
    // ==========================================
    /// 实体声明错误（列结构构建失败，任何行都不会处理）
    #[error("实体声明错误: {0}")]
    ConfigurationError(String),

    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    // ==========================================
    // 文件错误
    // ==========================================
    #[error("文件处理失败: {0}")]
    FileError(#[from] SheetError),

    #[error("导入行数超限: file={file}, rows={rows}, limit={limit}")]
    TooManyRows {
        file: String,
        rows: usize,
        limit: usize,
    },

    // ==========================================
    // 业务错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 配置类错误（需修改实体声明或配置，重试无意义）
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ApiError::ConfigurationError(_) | ApiError::ConfigReadError(_)
        )
    }
}

// ==========================================
// 从 SchemaError 转换
// ==========================================
impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        if err.is_configuration() {
            ApiError::ConfigurationError(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::UnknownEntity(name) => {
                ApiError::ConfigurationError(format!("实体类型未注册: {}", name))
            }
            RepositoryError::UnknownRelation { entity, relation } => {
                ApiError::ConfigurationError(format!("关联未定义: {}.{}", entity, relation))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Schema(e) => e.into(),
            EngineError::Collaborator(e) => e.into(),
            EngineError::Other(e) => ApiError::Other(e),
        }
    }
}

/// 配置读取结果 → ApiResult
pub(crate) fn config_value<T>(result: ConfigResult<T>) -> ApiResult<T> {
    result.map_err(|e| ApiError::ConfigReadError(e.to_string()))
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_configuration_error_maps_to_configuration() {
        let err: ApiError = SchemaError::UnknownEntity("Order".to_string()).into();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Order"));
    }

    #[test]
    fn test_engine_collaborator_error_maps_to_database() {
        let err: ApiError =
            EngineError::Collaborator(RepositoryError::DatabaseQueryError("disk I/O".into())).into();
        assert!(matches!(err, ApiError::DatabaseError(msg) if msg == "disk I/O"));
    }
}
