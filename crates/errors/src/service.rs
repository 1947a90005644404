//! 服务层错误：主错误 + 被抑制的次要错误

use std::fmt;

use crate::{AppError, StorageError};

/// 服务层错误
///
/// 事务失败后回滚、恢复自动提交、释放连接时可能再次出错。
/// 这些次要错误挂在 `suppressed` 上，主错误保持不变。
#[derive(Debug)]
pub struct ServiceError {
    error: AppError,
    suppressed: Vec<StorageError>,
}

impl ServiceError {
    pub fn new(error: AppError) -> Self {
        Self {
            error,
            suppressed: Vec::new(),
        }
    }

    /// 主错误
    pub fn error(&self) -> &AppError {
        &self.error
    }

    pub fn into_error(self) -> AppError {
        self.error
    }

    /// 被抑制的次要错误，按发生顺序排列
    pub fn suppressed(&self) -> &[StorageError] {
        &self.suppressed
    }

    /// 附加次要错误
    pub fn add_suppressed(&mut self, error: StorageError) {
        self.suppressed.push(error);
    }

    pub fn is_validation(&self) -> bool {
        self.error.is_validation()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.suppressed.is_empty() {
            write!(f, " (suppressed: {})", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<AppError> for ServiceError {
    fn from(error: AppError) -> Self {
        Self::new(error)
    }
}

/// 服务层 Result 类型别名
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_primary_error_is_kept() {
        let mut err = ServiceError::from(AppError::duplicate_barcode("0012345678905"));
        err.add_suppressed(StorageError::transaction("rollback failed"));
        err.add_suppressed(StorageError::transaction("auto-commit reset failed"));

        assert!(matches!(err.error(), AppError::DuplicateBarcode(code) if code == "0012345678905"));
        assert!(err.is_validation());
        assert_eq!(err.suppressed().len(), 2);
        assert_eq!(err.suppressed()[0].message(), "rollback failed");
    }

    #[test]
    fn test_display_and_source() {
        let mut err = ServiceError::from(AppError::not_found("product 7"));
        assert_eq!(err.to_string(), "Not found: product 7");

        err.add_suppressed(StorageError::transaction("rollback failed"));
        assert_eq!(err.to_string(), "Not found: product 7 (suppressed: 1)");
        assert_eq!(err.source().unwrap().to_string(), "Not found: product 7");
    }
}
