//! 通用服务 trait 定义

use async_trait::async_trait;
use errors::ServiceResult;

/// 基础 CRUD 服务
#[async_trait]
pub trait CrudService<T, ID>: Send + Sync
where
    T: Send + 'static,
    ID: Send + 'static,
{
    /// 创建实体，返回带存储生成 ID 的实体
    async fn create(&self, entity: T) -> ServiceResult<T>;

    /// 更新实体
    async fn update(&self, entity: T) -> ServiceResult<T>;

    /// 删除实体
    async fn delete(&self, id: ID) -> ServiceResult<()>;

    /// 根据 ID 查找
    async fn find_by_id(&self, id: ID) -> ServiceResult<Option<T>>;

    /// 查询所有
    async fn find_all(&self) -> ServiceResult<Vec<T>>;
}
