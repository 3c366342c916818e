use std::fmt;

use thiserror::Error;

use crate::models::MemoId;

/// 所有存储引擎统一返回的错误类型
///
/// 实现 Clone：初始化彻底失败后，需要把同一个错误交给之后的每个调用者
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// 存储介质无法打开或初始化
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// 云端引擎在未登录状态下被调用
    #[error("not signed in")]
    Unauthenticated,

    #[error("memo not found: {0}")]
    NotFound(MemoId),

    /// 介质拒绝了该记录（枚举值越界、缺少字段）
    #[error("rejected by storage: {0}")]
    ValidationRejected(String),
}

impl StorageError {
    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::Unavailable(reason.to_string())
    }

    pub fn rejected(reason: impl fmt::Display) -> Self {
        Self::ValidationRejected(reason.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
