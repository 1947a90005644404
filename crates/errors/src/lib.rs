//! cuba-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范。
//!
//! - [`StorageError`]：存储层原始错误（连接、SQL、约束冲突）
//! - [`AppError`]：对外暴露的业务错误分类
//! - [`ServiceError`]：主错误 + 被抑制的次要错误（回滚/复位失败）

mod service;
mod storage;

pub use service::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// 条码已被其他商品占用（属于校验类错误）
    #[error("Duplicate barcode: {0} is already assigned to another product")]
    DuplicateBarcode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<StorageError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn duplicate_barcode(code: impl Into<String>) -> Self {
        Self::DuplicateBarcode(code.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// 包装存储层错误
    pub fn persistence(msg: impl Into<String>, source: StorageError) -> Self {
        Self::Persistence {
            message: msg.into(),
            source: Some(source),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 是否为校验类错误（包括条码重复）
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateBarcode(_))
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::DuplicateBarcode(_) => 409,
            Self::NotFound(_) => 404,
            Self::Persistence { .. } => 500,
            Self::Internal(_) => 500,
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: self.problem_type(),
            title: self.problem_title(),
            status: self.status_code(),
            detail: self.to_string(),
            instance: None,
        }
    }

    fn problem_type(&self) -> String {
        match self {
            Self::Validation(_) => "https://api.cuba-erp.com/problems/validation".to_string(),
            Self::DuplicateBarcode(_) => {
                "https://api.cuba-erp.com/problems/duplicate-barcode".to_string()
            }
            Self::NotFound(_) => "https://api.cuba-erp.com/problems/not-found".to_string(),
            Self::Persistence { .. } => "https://api.cuba-erp.com/problems/persistence".to_string(),
            Self::Internal(_) => "https://api.cuba-erp.com/problems/internal".to_string(),
        }
    }

    fn problem_title(&self) -> String {
        match self {
            Self::Validation(_) => "Validation Error".to_string(),
            Self::DuplicateBarcode(_) => "Duplicate Barcode".to_string(),
            Self::NotFound(_) => "Resource Not Found".to_string(),
            Self::Persistence { .. } => "Persistence Error".to_string(),
            Self::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_duplicate_barcode_is_validation() {
        assert!(AppError::duplicate_barcode("0012345678905").is_validation());
        assert!(AppError::validation("name").is_validation());
        assert!(!AppError::not_found("product 1").is_validation());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("x").status_code(), 400);
        assert_eq!(AppError::duplicate_barcode("x").status_code(), 409);
        assert_eq!(AppError::not_found("x").status_code(), 404);
        let err = AppError::persistence("x", StorageError::query("boom"));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_persistence_keeps_source() {
        let err = AppError::persistence(
            "Failed to create product",
            StorageError::unique_violation("barcodes_code_key"),
        );
        let source = err.source().expect("source");
        assert!(source.to_string().contains("barcodes_code_key"));
    }

    #[test]
    fn test_problem_details_serialization() {
        let details = AppError::duplicate_barcode("0012345678905").to_problem_details();
        let json = serde_json::to_value(&details).unwrap();

        assert_eq!(json["status"], 409);
        assert_eq!(json["title"], "Duplicate Barcode");
        assert!(json["detail"].as_str().unwrap().contains("0012345678905"));
        assert!(json.get("instance").is_none());
    }
}
