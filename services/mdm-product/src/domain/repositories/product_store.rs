//! 商品存储接口

use async_trait::async_trait;
use errors::StorageResult;

use crate::domain::entities::Product;
use crate::domain::value_objects::ProductId;

/// 商品存储
///
/// 返回的商品不带条码，条码由 [`BarcodeStore`](super::BarcodeStore) 单独读写。
#[async_trait]
pub trait ProductStore<C: Send>: Send + Sync {
    /// 插入商品，返回带新 ID 的商品
    async fn save(&self, conn: &mut C, product: &Product) -> StorageResult<Product>;

    /// 按 ID 更新全部字段，商品不存在时返回 `None`
    async fn update(&self, conn: &mut C, product: &Product) -> StorageResult<Option<Product>>;

    /// 删除商品，返回是否删除了记录
    async fn delete_by_id(&self, conn: &mut C, id: ProductId) -> StorageResult<bool>;

    async fn find_by_id(&self, conn: &mut C, id: ProductId) -> StorageResult<Option<Product>>;

    /// 按 ID 升序返回全部商品
    async fn find_all(&self, conn: &mut C) -> StorageResult<Vec<Product>>;

    /// 名称包含 `name`（不区分大小写）的商品
    async fn find_by_name(&self, conn: &mut C, name: &str) -> StorageResult<Vec<Product>>;
}
