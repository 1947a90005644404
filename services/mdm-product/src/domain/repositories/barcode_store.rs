//! 条码存储接口

use async_trait::async_trait;
use errors::StorageResult;

use crate::domain::entities::Barcode;
use crate::domain::value_objects::ProductId;

/// 条码号唯一约束名
pub const BARCODE_CODE_CONSTRAINT: &str = "barcodes_code_key";

/// 商品已有条码时插入违反的主键约束名
pub const BARCODE_OWNER_CONSTRAINT: &str = "barcodes_pkey";

/// 条码存储，主键为商品 ID
///
/// 写入违反唯一约束时返回 `UniqueViolation` 类存储错误，约束名见
/// [`BARCODE_CODE_CONSTRAINT`] 和 [`BARCODE_OWNER_CONSTRAINT`]。
#[async_trait]
pub trait BarcodeStore<C: Send>: Send + Sync {
    /// 插入条码，`product_id` 必须已设置
    async fn save(&self, conn: &mut C, barcode: &Barcode) -> StorageResult<()>;

    /// 按商品 ID 更新条码
    async fn update(&self, conn: &mut C, barcode: &Barcode) -> StorageResult<()>;

    /// 删除商品的条码，返回是否删除了记录
    async fn delete_by_id(&self, conn: &mut C, product_id: ProductId) -> StorageResult<bool>;

    async fn find_by_code(&self, conn: &mut C, code: &str) -> StorageResult<Option<Barcode>>;

    async fn find_by_product_id(
        &self,
        conn: &mut C,
        product_id: ProductId,
    ) -> StorageResult<Option<Barcode>>;
}
