//! PostgreSQL 事务管理模块
//!
//! 提供 [`ports::Connection`] 的 PostgreSQL 实现：每个会话独占一个连接池连接，
//! 事务由 `BEGIN` / `COMMIT` / `ROLLBACK` 语句显式控制。
//!
//! 会话在事务未结束时被丢弃（调用被取消、panic、回滚失败），连接不会归还连接池，
//! 而是直接关闭，由服务端中止事务。

use std::str::FromStr;

use async_trait::async_trait;
use config::DatabaseConfig;
use errors::{AppError, AppResult, StorageError, StorageResult};
use ports::{Connection, ConnectionProvider};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::{debug, warn};

use crate::connection::{PostgresConfig, create_pool};
use crate::error::storage_error;

/// 事务隔离级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// 读未提交
    ReadUncommitted,
    /// 读已提交（PostgreSQL 默认）
    #[default]
    ReadCommitted,
    /// 可重复读
    RepeatableRead,
    /// 可串行化
    Serializable,
}

impl IsolationLevel {
    /// 转换为 SQL 字符串
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// 生成 BEGIN 语句
    pub fn begin_sql(&self) -> String {
        format!("BEGIN ISOLATION LEVEL {}", self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = AppError;

    /// 接受 `read_committed`、`read committed`、`READ-COMMITTED` 等写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "read_uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            _ => Err(AppError::internal(format!("Unknown isolation level: {}", s))),
        }
    }
}

/// PostgreSQL 连接提供者
#[derive(Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
    isolation_level: IsolationLevel,
}

impl PgConnectionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            isolation_level: IsolationLevel::default(),
        }
    }

    /// 设置隔离级别
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// 根据数据库配置创建连接池和提供者
    pub async fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let isolation_level = config.isolation_level.parse::<IsolationLevel>()?;
        let pool = create_pool(&PostgresConfig::from(config)).await?;
        Ok(Self::new(pool).with_isolation_level(isolation_level))
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    type Connection = PgSession;

    async fn connection(&self) -> StorageResult<PgSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| storage_error("Failed to acquire connection", e))?;

        Ok(PgSession::new(conn, self.isolation_level))
    }
}

/// 单个 PostgreSQL 会话
///
/// Drop 时连接归还连接池；事务未结束时连接被关闭。
pub struct PgSession {
    conn: PoolConnection<Postgres>,
    isolation_level: IsolationLevel,
    auto_commit: bool,
    in_transaction: bool,
    /// 事务控制语句已发出但未收到结果
    pending: bool,
}

impl PgSession {
    fn new(conn: PoolConnection<Postgres>, isolation_level: IsolationLevel) -> Self {
        Self {
            conn,
            isolation_level,
            auto_commit: true,
            in_transaction: false,
            pending: false,
        }
    }

    /// 供 Repository 执行语句
    pub fn executor(&mut self) -> &mut PgConnection {
        &mut *self.conn
    }

    /// 事务状态未知，连接不可复用
    fn is_dirty(&self) -> bool {
        self.in_transaction || self.pending
    }

    async fn run(&mut self, sql: &str) -> StorageResult<()> {
        self.pending = true;
        let result = sqlx::Executor::execute(&mut *self.conn, sqlx::raw_sql(sql)).await;
        self.pending = false;

        result.map_err(|e| storage_error(sql, e))?;
        Ok(())
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if self.is_dirty() {
            warn!(
                in_transaction = self.in_transaction,
                pending = self.pending,
                "Session dropped with an unfinished transaction, closing connection"
            );
            self.conn.close_on_drop();
        }
    }
}

#[async_trait]
impl Connection for PgSession {
    async fn begin(&mut self) -> StorageResult<()> {
        if self.in_transaction {
            return Err(StorageError::transaction("Transaction already in progress"));
        }

        let sql = self.isolation_level.begin_sql();
        self.run(&sql).await?;
        self.auto_commit = false;
        self.in_transaction = true;
        debug!(isolation_level = self.isolation_level.as_sql(), "Transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Err(StorageError::transaction("No transaction in progress"));
        }

        // COMMIT 失败后仍视为事务未结束，由调用方回滚或在 Drop 时关闭连接
        self.run("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Err(StorageError::transaction("No transaction in progress"));
        }

        self.run("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> StorageResult<()> {
        if enabled && self.in_transaction {
            warn!("Re-enabling auto-commit with an open transaction, rolling back");
            self.run("ROLLBACK").await?;
            self.in_transaction = false;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// ROLLBACK 失败时 `in_transaction` 保持为真，Drop 会关闭连接
    async fn close(mut self) -> StorageResult<()> {
        if self.in_transaction {
            self.run("ROLLBACK").await?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level() {
        assert_eq!(IsolationLevel::ReadUncommitted.as_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.as_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_begin_sql() {
        assert_eq!(
            IsolationLevel::default().begin_sql(),
            "BEGIN ISOLATION LEVEL READ COMMITTED"
        );
        assert_eq!(
            IsolationLevel::Serializable.begin_sql(),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
    }

    #[test]
    fn test_parse_isolation_level() {
        assert_eq!(
            "read_committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "REPEATABLE READ".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }
}
