// ==========================================
// 选课席位分配系统 - API层错误类型
// ==========================================
// 职责: 把引擎层与仓储层的技术错误转换为面向调用方的错误类别
// 红线: 所有错误信息必须带显式原因
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入与数据完整性
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据完整性错误: {0}")]
    DataIntegrity(String),

    // ==========================================
    // 运行控制
    // ==========================================
    #[error("运行已取消: 已处理学生数={processed_students}")]
    Cancelled { processed_students: u32 },

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTimeFormat { .. } | EngineError::InvalidSession { .. } => {
                ApiError::DataIntegrity(err.to_string())
            }
            EngineError::StudentNotFound { student_id } => {
                ApiError::NotFound(format!("学生(id={})不存在", student_id))
            }
            EngineError::CourseNotFound { course_code } => {
                ApiError::NotFound(format!("课程(code={})不存在", course_code))
            }
            EngineError::InvalidRank { .. } => ApiError::DataIntegrity(err.to_string()),
            EngineError::Cancelled { processed_students } => {
                ApiError::Cancelled { processed_students }
            }
            EngineError::Config(msg) => ApiError::ConfigError(msg),
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
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DataIntegrity(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DataIntegrity(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Serialization(e) => ApiError::InternalError(e.to_string()),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
