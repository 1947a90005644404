//! sqlx 错误分类

use errors::{StorageError, StorageErrorKind};
use sqlx::error::ErrorKind;

/// 把 sqlx 错误转换为 [`StorageError`]
///
/// 约束冲突按 SQLSTATE 分类（23505 / 23503 / 23514），约束名同时写入消息和 `constraint`。
pub fn storage_error(context: &str, err: sqlx::Error) -> StorageError {
    let mut constraint = None;
    let (kind, detail) = match &err {
        sqlx::Error::Database(db) => {
            let kind = match db.kind() {
                ErrorKind::UniqueViolation => StorageErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => StorageErrorKind::ForeignKeyViolation,
                ErrorKind::CheckViolation => StorageErrorKind::CheckViolation,
                _ => StorageErrorKind::Query,
            };
            constraint = db.constraint().map(str::to_string);
            let detail = match db.constraint() {
                Some(name) => format!("{} ({})", db.message(), name),
                None => db.message().to_string(),
            };
            (kind, detail)
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            (StorageErrorKind::Unavailable, err.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
            (StorageErrorKind::Connection, err.to_string())
        }
        _ => (StorageErrorKind::Query, err.to_string()),
    };

    let error = StorageError::new(kind, format!("{}: {}", context, detail));
    match constraint {
        Some(name) => error.with_constraint(name).with_source(err),
        None => error.with_source(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        let err = storage_error("acquire", sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), StorageErrorKind::Unavailable);
        assert!(err.message().starts_with("acquire: "));
    }

    #[test]
    fn test_io_errors_are_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err = storage_error("BEGIN", sqlx::Error::Io(io));
        assert_eq!(err.kind(), StorageErrorKind::Connection);
    }

    #[test]
    fn test_other_errors_are_query() {
        let err = storage_error("find product", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), StorageErrorKind::Query);
    }
}
