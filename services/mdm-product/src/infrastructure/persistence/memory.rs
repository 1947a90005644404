//! 进程内存储
//!
//! 事务语义：`begin` 时对全部表做快照，`rollback` 时恢复快照。
//! 会话之间没有隔离，适合单元测试和无数据库的嵌入场景。
//!
//! [`MemoryDatabase::fail_at`] 可以让指定的操作点返回存储错误，
//! 用于验证回滚和次要错误处理。

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use errors::{StorageError, StorageResult};
use ports::{Connection, ConnectionProvider};

use crate::domain::entities::{Barcode, Product};
use crate::domain::repositories::{
    BARCODE_CODE_CONSTRAINT, BARCODE_OWNER_CONSTRAINT, BarcodeStore, ProductStore,
};
use crate::domain::value_objects::ProductId;

/// 故障注入点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Acquire,
    Begin,
    Commit,
    Rollback,
    /// 恢复自动提交
    ResetAutoCommit,
    Close,
    ProductSave,
    ProductUpdate,
    ProductDelete,
    ProductRead,
    BarcodeSave,
    BarcodeUpdate,
    BarcodeDelete,
    BarcodeRead,
}

impl FaultPoint {
    fn error(self) -> StorageError {
        let message = format!("Injected failure at {:?}", self);
        match self {
            Self::Acquire => StorageError::unavailable(message),
            Self::Begin | Self::Commit | Self::Rollback | Self::ResetAutoCommit => {
                StorageError::transaction(message)
            }
            Self::Close => StorageError::connection(message),
            _ => StorageError::query(message),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    barcodes: BTreeMap<ProductId, Barcode>,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// 与数据库序列一样，回滚不回收已分配的 ID
    last_id: i64,
    faults: HashSet<FaultPoint>,
    acquired: u64,
    open: u64,
}

impl State {
    fn check(&self, point: FaultPoint) -> StorageResult<()> {
        if self.faults.contains(&point) {
            return Err(point.error());
        }
        Ok(())
    }
}

/// 共享的内存数据库，克隆后指向同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 让指定操作点持续失败，直到 [`clear_faults`](Self::clear_faults)
    pub fn fail_at(&self, point: FaultPoint) {
        self.lock().faults.insert(point);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn product_count(&self) -> usize {
        self.lock().tables.products.len()
    }

    pub fn barcode_count(&self) -> usize {
        self.lock().tables.barcodes.len()
    }

    /// 累计发放的连接数
    pub fn connections_acquired(&self) -> u64 {
        self.lock().acquired
    }

    /// 尚未释放的连接数
    pub fn open_connections(&self) -> u64 {
        self.lock().open
    }
}

#[async_trait]
impl ConnectionProvider for MemoryDatabase {
    type Connection = MemorySession;

    async fn connection(&self) -> StorageResult<MemorySession> {
        let mut state = self.lock();
        state.check(FaultPoint::Acquire)?;
        state.acquired += 1;
        state.open += 1;
        drop(state);

        Ok(MemorySession {
            db: self.clone(),
            snapshot: None,
            auto_commit: true,
        })
    }
}

/// 内存数据库会话，Drop 时回滚未结束的事务并释放连接计数
#[derive(Debug)]
pub struct MemorySession {
    db: MemoryDatabase,
    snapshot: Option<Tables>,
    auto_commit: bool,
}

impl MemorySession {
    fn state(&self) -> MutexGuard<'_, State> {
        self.db.lock()
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.db.lock().tables = snapshot;
        }
    }
}

impl Drop for MemorySession {
    /// 未结束的事务在此回滚
    fn drop(&mut self) {
        let mut state = self.db.lock();
        if let Some(snapshot) = self.snapshot.take() {
            state.tables = snapshot;
        }
        state.open = state.open.saturating_sub(1);
    }
}

#[async_trait]
impl Connection for MemorySession {
    async fn begin(&mut self) -> StorageResult<()> {
        if self.snapshot.is_some() {
            return Err(StorageError::transaction("Transaction already in progress"));
        }

        let state = self.state();
        state.check(FaultPoint::Begin)?;
        let snapshot = state.tables.clone();
        drop(state);

        self.snapshot = Some(snapshot);
        self.auto_commit = false;
        Ok(())
    }

    /// 注入的提交失败不会结束事务，调用方仍需回滚
    async fn commit(&mut self) -> StorageResult<()> {
        if self.snapshot.is_none() {
            return Err(StorageError::transaction("No transaction in progress"));
        }

        self.state().check(FaultPoint::Commit)?;
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        if self.snapshot.is_none() {
            return Err(StorageError::transaction("No transaction in progress"));
        }

        self.state().check(FaultPoint::Rollback)?;
        self.restore();
        Ok(())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> StorageResult<()> {
        if enabled {
            self.state().check(FaultPoint::ResetAutoCommit)?;
            self.restore();
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    async fn close(mut self) -> StorageResult<()> {
        self.restore();
        // 锁须在 Drop 再次加锁前释放
        let result = self.state().check(FaultPoint::Close);
        result
    }
}

// ============================================================================
// ProductStore 实现
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProductStore;

#[async_trait]
impl ProductStore<MemorySession> for MemoryProductStore {
    async fn save(&self, conn: &mut MemorySession, product: &Product) -> StorageResult<Product> {
        let mut state = conn.state();
        state.check(FaultPoint::ProductSave)?;

        state.last_id += 1;
        let id = ProductId(state.last_id);
        let row = product.without_barcode().with_id(id);
        state.tables.products.insert(id, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        conn: &mut MemorySession,
        product: &Product,
    ) -> StorageResult<Option<Product>> {
        let id = product
            .id
            .ok_or_else(|| StorageError::query("Cannot update a product without id"))?;

        let mut state = conn.state();
        state.check(FaultPoint::ProductUpdate)?;

        match state.tables.products.get_mut(&id) {
            Some(stored) => {
                *stored = product.without_barcode();
                Ok(Some(stored.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_by_id(&self, conn: &mut MemorySession, id: ProductId) -> StorageResult<bool> {
        let mut state = conn.state();
        state.check(FaultPoint::ProductDelete)?;
        Ok(state.tables.products.remove(&id).is_some())
    }

    async fn find_by_id(
        &self,
        conn: &mut MemorySession,
        id: ProductId,
    ) -> StorageResult<Option<Product>> {
        let state = conn.state();
        state.check(FaultPoint::ProductRead)?;
        Ok(state.tables.products.get(&id).cloned())
    }

    async fn find_all(&self, conn: &mut MemorySession) -> StorageResult<Vec<Product>> {
        let state = conn.state();
        state.check(FaultPoint::ProductRead)?;
        Ok(state.tables.products.values().cloned().collect())
    }

    async fn find_by_name(
        &self,
        conn: &mut MemorySession,
        name: &str,
    ) -> StorageResult<Vec<Product>> {
        let state = conn.state();
        state.check(FaultPoint::ProductRead)?;

        let needle = name.to_lowercase();
        Ok(state
            .tables
            .products
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

// ============================================================================
// BarcodeStore 实现
// ============================================================================

fn check_code_free(tables: &Tables, barcode: &Barcode, owner: ProductId) -> StorageResult<()> {
    let taken = tables
        .barcodes
        .iter()
        .any(|(id, other)| *id != owner && other.code == barcode.code);
    if taken {
        return Err(StorageError::unique_violation(format!(
            "{}: {}",
            BARCODE_CODE_CONSTRAINT, barcode.code
        ))
        .with_constraint(BARCODE_CODE_CONSTRAINT));
    }
    Ok(())
}

fn owner(barcode: &Barcode) -> StorageResult<ProductId> {
    barcode
        .product_id
        .ok_or_else(|| StorageError::query("Barcode is not linked to a product"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBarcodeStore;

#[async_trait]
impl BarcodeStore<MemorySession> for MemoryBarcodeStore {
    async fn save(&self, conn: &mut MemorySession, barcode: &Barcode) -> StorageResult<()> {
        let product_id = owner(barcode)?;

        let mut state = conn.state();
        state.check(FaultPoint::BarcodeSave)?;

        if state.tables.barcodes.contains_key(&product_id) {
            return Err(StorageError::unique_violation(format!(
                "{}: {}",
                BARCODE_OWNER_CONSTRAINT, product_id
            ))
            .with_constraint(BARCODE_OWNER_CONSTRAINT));
        }
        check_code_free(&state.tables, barcode, product_id)?;

        let mut row = barcode.clone();
        row.ensure_kind();
        state.tables.barcodes.insert(product_id, row);
        Ok(())
    }

    async fn update(&self, conn: &mut MemorySession, barcode: &Barcode) -> StorageResult<()> {
        let product_id = owner(barcode)?;

        let mut state = conn.state();
        state.check(FaultPoint::BarcodeUpdate)?;

        if !state.tables.barcodes.contains_key(&product_id) {
            return Err(StorageError::query(format!(
                "No barcode stored for product {}",
                product_id
            )));
        }
        check_code_free(&state.tables, barcode, product_id)?;

        let mut row = barcode.clone();
        row.ensure_kind();
        state.tables.barcodes.insert(product_id, row);
        Ok(())
    }

    async fn delete_by_id(
        &self,
        conn: &mut MemorySession,
        product_id: ProductId,
    ) -> StorageResult<bool> {
        let mut state = conn.state();
        state.check(FaultPoint::BarcodeDelete)?;
        Ok(state.tables.barcodes.remove(&product_id).is_some())
    }

    async fn find_by_code(
        &self,
        conn: &mut MemorySession,
        code: &str,
    ) -> StorageResult<Option<Barcode>> {
        let state = conn.state();
        state.check(FaultPoint::BarcodeRead)?;
        Ok(state
            .tables
            .barcodes
            .values()
            .find(|b| b.code == code)
            .cloned())
    }

    async fn find_by_product_id(
        &self,
        conn: &mut MemorySession,
        product_id: ProductId,
    ) -> StorageResult<Option<Barcode>> {
        let state = conn.state();
        state.check(FaultPoint::BarcodeRead)?;
        Ok(state.tables.barcodes.get(&product_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn widget() -> Product {
        Product::new(
            "Widget",
            1,
            1,
            Decimal::new(999, 2),
            Decimal::new(400, 2),
            10,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();

        conn.begin().await.unwrap();
        MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        assert_eq!(db.product_count(), 1);

        conn.rollback().await.unwrap();
        assert_eq!(db.product_count(), 0);
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_drop_mid_transaction_rolls_back() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();

        conn.begin().await.unwrap();
        MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        MemoryBarcodeStore
            .save(&mut conn, &Barcode::for_product(ProductId(1), "0012345678905"))
            .await
            .unwrap();
        drop(conn);

        assert_eq!(db.product_count(), 0);
        assert_eq!(db.barcode_count(), 0);
        assert_eq!(db.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_drop_after_commit_keeps_writes() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();

        conn.begin().await.unwrap();
        MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        conn.commit().await.unwrap();
        drop(conn);

        assert_eq!(db.product_count(), 1);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_rollback() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();

        conn.begin().await.unwrap();
        let first = MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        conn.rollback().await.unwrap();

        let second = MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        assert_eq!(first.id, Some(ProductId(1)));
        assert_eq!(second.id, Some(ProductId(2)));
    }

    #[tokio::test]
    async fn test_reenabling_auto_commit_rolls_back() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();

        conn.set_auto_commit(false).await.unwrap();
        conn.begin().await.unwrap();
        MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        conn.set_auto_commit(true).await.unwrap();

        assert!(conn.auto_commit());
        assert!(!conn.in_transaction());
        assert_eq!(db.product_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_and_begin_state_errors() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();

        assert!(conn.commit().await.is_err());
        assert!(conn.rollback().await.is_err());
        conn.begin().await.unwrap();
        assert!(conn.begin().await.is_err());
        conn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_commit_failure_keeps_transaction_open() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();
        db.fail_at(FaultPoint::Commit);

        conn.begin().await.unwrap();
        MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        assert!(conn.commit().await.is_err());
        assert!(conn.in_transaction());

        conn.rollback().await.unwrap();
        assert_eq!(db.product_count(), 0);
    }

    #[tokio::test]
    async fn test_code_unique_constraint() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();
        let code = "0012345678905";

        MemoryBarcodeStore
            .save(&mut conn, &Barcode::for_product(ProductId(1), code))
            .await
            .unwrap();
        let err = MemoryBarcodeStore
            .save(&mut conn, &Barcode::for_product(ProductId(2), code))
            .await
            .unwrap_err();
        assert!(err.violates_unique(BARCODE_CODE_CONSTRAINT));

        // 同一商品更新为自己的条码号不算冲突
        MemoryBarcodeStore
            .update(&mut conn, &Barcode::for_product(ProductId(1), code).inactive())
            .await
            .unwrap();
        let stored = MemoryBarcodeStore
            .find_by_code(&mut conn, code)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.active);
    }

    #[tokio::test]
    async fn test_save_defaults_kind() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();
        let mut barcode = Barcode::new("4006381333931");
        barcode.product_id = Some(ProductId(4));

        MemoryBarcodeStore.save(&mut conn, &barcode).await.unwrap();
        let stored = MemoryBarcodeStore
            .find_by_product_id(&mut conn, ProductId(4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.kind.as_deref(), Some("EAN13"));
    }

    #[tokio::test]
    async fn test_find_by_name_case_insensitive() {
        let db = MemoryDatabase::new();
        let mut conn = db.connection().await.unwrap();
        let mut gadget = widget();
        gadget.name = "Gadget".to_string();

        MemoryProductStore.save(&mut conn, &widget()).await.unwrap();
        MemoryProductStore.save(&mut conn, &gadget).await.unwrap();

        let found = MemoryProductStore
            .find_by_name(&mut conn, "WIDG")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Widget");
    }

    #[tokio::test]
    async fn test_connection_counters() {
        let db = MemoryDatabase::new();
        let conn = db.connection().await.unwrap();
        assert_eq!(db.open_connections(), 1);

        conn.close().await.unwrap();
        assert_eq!(db.open_connections(), 0);
        assert_eq!(db.connections_acquired(), 1);

        db.fail_at(FaultPoint::Acquire);
        assert!(db.connection().await.is_err());
        assert_eq!(db.connections_acquired(), 1);
    }
}
