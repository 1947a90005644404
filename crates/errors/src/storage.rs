//! 存储层错误

use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 存储错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// 获取/释放连接失败
    Connection,
    /// 语句执行失败
    Query,
    /// 唯一约束冲突
    UniqueViolation,
    /// 外键约束冲突
    ForeignKeyViolation,
    /// CHECK 约束冲突
    CheckViolation,
    /// BEGIN / COMMIT / ROLLBACK / 自动提交切换失败
    Transaction,
    /// 存储不可用（连接池关闭、超时）
    Unavailable,
}

impl StorageErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Query => "query",
            Self::UniqueViolation => "unique violation",
            Self::ForeignKeyViolation => "foreign key violation",
            Self::CheckViolation => "check violation",
            Self::Transaction => "transaction",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存储层原始错误
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
    /// 触发冲突的约束名
    constraint: Option<String>,
    #[source]
    source: Option<BoxError>,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            constraint: None,
            source: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Connection, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Query, message)
    }

    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::UniqueViolation, message)
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Transaction, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Unavailable, message)
    }

    /// 附加底层驱动错误
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    pub fn is_unique_violation(&self) -> bool {
        self.kind == StorageErrorKind::UniqueViolation
    }

    /// 是否违反了指定的唯一约束
    pub fn violates_unique(&self, constraint: &str) -> bool {
        self.is_unique_violation() && self.constraint() == Some(constraint)
    }
}

/// 存储层 Result 类型别名
pub type StorageResult<T> = Result<T, StorageError>;
