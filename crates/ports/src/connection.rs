//! 存储连接 trait 定义
//!
//! 语义与 JDBC 风格的连接一致：默认自动提交，关闭自动提交后由调用方
//! 显式 `begin` / `commit` / `rollback`。

use async_trait::async_trait;
use errors::StorageResult;

/// 单个存储连接
///
/// 实现方负责在 `close` 时把连接归还给连接池。
#[async_trait]
pub trait Connection: Send {
    /// 开启事务
    async fn begin(&mut self) -> StorageResult<()>;

    /// 提交事务
    async fn commit(&mut self) -> StorageResult<()>;

    /// 回滚事务
    async fn rollback(&mut self) -> StorageResult<()>;

    /// 切换自动提交模式
    ///
    /// 重新打开自动提交时，仍未结束的事务会被回滚，绝不会隐式提交。
    async fn set_auto_commit(&mut self, enabled: bool) -> StorageResult<()>;

    /// 当前是否处于自动提交模式
    fn auto_commit(&self) -> bool;

    /// 是否有未结束的事务
    fn in_transaction(&self) -> bool;

    /// 关闭连接
    async fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}

/// 连接提供者（连接池）
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    /// 获取一个连接，存储不可用时返回错误
    async fn connection(&self) -> StorageResult<Self::Connection>;
}
