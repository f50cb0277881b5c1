// ==========================================
// 拉丝/桁架生产线 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/引擎错误为用户友好的错误消息
// 约束: 所有错误信息必须包含显式原因
// ==========================================

use crate::domain::order::SelectionError;
use crate::engine::allocator::AllocationError;
use crate::engine::ledger::LedgerError;
use crate::engine::production::ProductionError;
use crate::engine::transfer_planner::PlanningError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: {0}")]
    InvalidStateTransition(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    /// 主数据查找失败 (如桁架型号缺失); 未做任何扣减
    #[error("严重错误, 操作已中止: {0}")]
    CriticalLookupFailure(String),

    // ==========================================
    // 授权
    // ==========================================
    #[error("主管授权失败: {0}")]
    AuthorizationDenied(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    /// 逐条写入中途失败; 已写入部分不回滚
    #[error("部分写入失败: 已写入 {} 条, 失败 {} 条 ({cause})", .applied.len(), .failed.len())]
    PartialCommit {
        applied: Vec<String>,
        failed: Vec<String>,
        cause: String,
    },

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
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
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("{}: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从引擎错误转换
// ==========================================
impl From<ProductionError> for ApiError {
    fn from(err: ProductionError) -> Self {
        if err.is_critical() {
            return ApiError::CriticalLookupFailure(err.to_string());
        }
        match err {
            ProductionError::OrderNotFound { .. }
            | ProductionError::PendingPackageNotFound { .. } => ApiError::NotFound(err.to_string()),
            ProductionError::InvalidStateTransition { .. } => {
                ApiError::InvalidStateTransition(err.to_string())
            }
            ProductionError::Validation(msg) => ApiError::ValidationError(msg),
            ProductionError::Selection(e) => e.into(),
            ProductionError::Allocation(e) => e.into(),
            ProductionError::Ledger(e) => e.into(),
            other => ApiError::BusinessRuleViolation(other.to_string()),
        }
    }
}

impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        if err.is_critical() {
            return ApiError::CriticalLookupFailure(err.to_string());
        }
        match err {
            AllocationError::Ledger(e) => e.into(),
            other => ApiError::BusinessRuleViolation(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::LotNotFound { .. } => ApiError::NotFound(err.to_string()),
            LedgerError::InvalidAmount { .. } => ApiError::InvalidInput(err.to_string()),
            _ => ApiError::BusinessRuleViolation(err.to_string()),
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<PlanningError> for ApiError {
    fn from(err: PlanningError) -> Self {
        match err {
            PlanningError::UnknownLot { .. } | PlanningError::ItemNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            PlanningError::Ledger(e) => e.into(),
            PlanningError::InvalidRequest(msg) => ApiError::InvalidInput(msg),
            other => ApiError::ValidationError(other.to_string()),
        }
    }
}

/// API Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
