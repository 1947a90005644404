//! 商品服务
//!
//! 每个写操作独占一个连接并在单个事务内完成：
//! 关闭自动提交 → BEGIN → 业务步骤 → COMMIT（失败则 ROLLBACK）
//! → 恢复自动提交 → 关闭连接。
//!
//! 回滚、恢复自动提交和关闭连接时产生的错误不会覆盖主错误，
//! 而是挂在 [`ServiceError::suppressed`] 上。

use std::sync::Arc;

use async_trait::async_trait;
use errors::{AppError, ServiceError, ServiceResult, StorageError};
use ports::{Connection, ConnectionProvider, CrudService};
use tracing::debug;

use crate::application::dto::ProductWithBarcode;
use crate::application::observer::{
    Operation, Step, TracingTransactionObserver, TransactionObserver,
};
use crate::domain::entities::{Barcode, Product};
use crate::domain::repositories::{BARCODE_CODE_CONSTRAINT, BarcodeStore, ProductStore};
use crate::domain::validation::PRODUCT_ID_REQUIRED;
use crate::domain::value_objects::ProductId;

type Conn<P> = <P as ConnectionProvider>::Connection;

/// 存储错误包装为带操作描述的持久化错误
fn persistence(op: Operation) -> impl Fn(StorageError) -> ServiceError {
    move |e| AppError::persistence(op.failure_message(), e).into()
}

/// 条码写入违反条码号唯一约束时视为条码重复，其余错误按持久化错误处理
fn barcode_write(op: Operation, code: &str) -> impl Fn(StorageError) -> ServiceError + '_ {
    move |e| {
        if e.violates_unique(BARCODE_CODE_CONSTRAINT) {
            AppError::duplicate_barcode(code).into()
        } else {
            AppError::persistence(op.failure_message(), e).into()
        }
    }
}

/// 已有主错误时挂为次要错误，否则成为新的主错误
fn attach_or_raise<T>(
    outcome: ServiceResult<T>,
    op: Operation,
    error: StorageError,
) -> ServiceResult<T> {
    match outcome {
        Ok(_) => Err(AppError::persistence(op.failure_message(), error).into()),
        Err(mut primary) => {
            primary.add_suppressed(error);
            Err(primary)
        }
    }
}

fn not_found(id: ProductId) -> ServiceError {
    AppError::not_found(format!("Product {} does not exist", id)).into()
}

/// 商品 + 条码服务
pub struct ProductService<P, S, B> {
    provider: P,
    products: S,
    barcodes: B,
    observer: Arc<dyn TransactionObserver>,
}

impl<P, S, B> ProductService<P, S, B>
where
    P: ConnectionProvider,
    S: ProductStore<Conn<P>>,
    B: BarcodeStore<Conn<P>>,
{
    /// 使用 [`TracingTransactionObserver`] 创建服务
    pub fn new(provider: P, products: S, barcodes: B) -> Self {
        Self {
            provider,
            products,
            barcodes,
            observer: Arc::new(TracingTransactionObserver),
        }
    }

    /// 替换事务观察者
    pub fn with_observer(mut self, observer: Arc<dyn TransactionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    // ========== 写操作 ==========

    /// 创建商品，挂接了条码时一并写入
    pub async fn create(&self, product: Product) -> ServiceResult<Product> {
        let op = Operation::Create;
        product.validate()?;

        let mut conn = self.open(op).await?;
        let outcome = self.create_in_tx(op, &mut conn, product).await;
        self.complete(op, conn, outcome).await
    }

    async fn create_in_tx(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        product: Product,
    ) -> ServiceResult<Product> {
        self.begin(op, conn).await?;

        let mut saved = self
            .products
            .save(conn, &product.without_barcode())
            .await
            .map_err(persistence(op))?;
        let id = saved
            .id
            .ok_or_else(|| AppError::internal("Product store did not assign an id"))?;
        self.observer.on_step(op, Step::ProductSaved(id));

        saved.barcode = match product.barcode {
            Some(barcode) => Some(self.persist_barcode(op, conn, id, barcode).await?),
            None => None,
        };
        Ok(saved)
    }

    /// 创建商品并写入条码
    ///
    /// 条码号已被任何商品占用时返回 `DuplicateBarcode`，不写入任何数据。
    pub async fn create_with_barcode(&self, input: ProductWithBarcode) -> ServiceResult<Product> {
        let op = Operation::CreateWithBarcode;
        input.validate()?;

        let mut conn = self.open(op).await?;
        let outcome = self.create_with_barcode_in_tx(op, &mut conn, &input).await;
        self.complete(op, conn, outcome).await
    }

    async fn create_with_barcode_in_tx(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        input: &ProductWithBarcode,
    ) -> ServiceResult<Product> {
        self.begin(op, conn).await?;
        self.ensure_barcode_is_unique(op, conn, &input.barcode, None)
            .await?;

        let mut saved = self
            .products
            .save(conn, &input.to_product())
            .await
            .map_err(persistence(op))?;
        let id = saved
            .id
            .ok_or_else(|| AppError::internal("Product store did not assign an id"))?;
        self.observer.on_step(op, Step::ProductSaved(id));

        let barcode = Barcode::for_product(id, input.barcode.clone());
        self.barcodes
            .save(conn, &barcode)
            .await
            .map_err(barcode_write(op, &barcode.code))?;
        self.observer.on_step(
            op,
            Step::BarcodeSaved {
                product_id: id,
                code: &barcode.code,
            },
        );

        saved.barcode = Some(barcode);
        Ok(saved)
    }

    /// 更新商品，挂接了条码时按商品 ID 更新或插入条码
    ///
    /// 未挂接条码时已有条码保持不变，并随结果返回。
    pub async fn update(&self, product: Product) -> ServiceResult<Product> {
        let op = Operation::Update;
        let id = product
            .id
            .ok_or_else(|| AppError::validation(PRODUCT_ID_REQUIRED))?;
        product.validate()?;

        let mut conn = self.open(op).await?;
        let outcome = self.update_in_tx(op, &mut conn, id, product).await;
        self.complete(op, conn, outcome).await
    }

    async fn update_in_tx(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        id: ProductId,
        product: Product,
    ) -> ServiceResult<Product> {
        self.begin(op, conn).await?;

        let mut updated = self
            .products
            .update(conn, &product.without_barcode())
            .await
            .map_err(persistence(op))?
            .ok_or_else(|| not_found(id))?;
        self.observer.on_step(op, Step::ProductUpdated(id));

        updated.barcode = match product.barcode {
            Some(barcode) => Some(self.persist_barcode(op, conn, id, barcode).await?),
            None => self
                .barcodes
                .find_by_product_id(conn, id)
                .await
                .map_err(persistence(op))?,
        };
        Ok(updated)
    }

    /// 按 DTO 更新已有商品及其条码，条码总是置为有效
    pub async fn update_with_barcode(&self, input: ProductWithBarcode) -> ServiceResult<Product> {
        let op = Operation::UpdateWithBarcode;
        let id = input
            .product_id
            .ok_or_else(|| AppError::validation(PRODUCT_ID_REQUIRED))?;
        input.validate()?;

        let mut conn = self.open(op).await?;
        let outcome = self
            .update_with_barcode_in_tx(op, &mut conn, id, &input)
            .await;
        self.complete(op, conn, outcome).await
    }

    async fn update_with_barcode_in_tx(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        id: ProductId,
        input: &ProductWithBarcode,
    ) -> ServiceResult<Product> {
        self.begin(op, conn).await?;

        let mut product = self
            .products
            .find_by_id(conn, id)
            .await
            .map_err(persistence(op))?
            .ok_or_else(|| not_found(id))?;
        input.apply_to(&mut product);

        let mut updated = self
            .products
            .update(conn, &product.without_barcode())
            .await
            .map_err(persistence(op))?
            .ok_or_else(|| not_found(id))?;
        self.observer.on_step(op, Step::ProductUpdated(id));

        self.ensure_barcode_is_unique(op, conn, &input.barcode, Some(id))
            .await?;

        let existing = self
            .barcodes
            .find_by_product_id(conn, id)
            .await
            .map_err(persistence(op))?;
        let exists = existing.is_some();
        let mut barcode = existing.unwrap_or_else(|| Barcode::new(input.barcode.clone()));
        barcode.product_id = Some(id);
        barcode.code = input.barcode.clone();
        barcode.ensure_kind();
        barcode.active = true;

        self.write_barcode(op, conn, id, &barcode, exists).await?;

        updated.barcode = Some(barcode);
        Ok(updated)
    }

    /// 删除商品及其条码，商品不存在时不做任何事
    pub async fn delete(&self, id: ProductId) -> ServiceResult<()> {
        let op = Operation::Delete;

        let mut conn = self.open(op).await?;
        let outcome = self.delete_in_tx(op, &mut conn, id).await;
        self.complete(op, conn, outcome).await
    }

    async fn delete_in_tx(&self, op: Operation, conn: &mut Conn<P>, id: ProductId) -> ServiceResult<()> {
        self.begin(op, conn).await?;

        // 条码外键延迟到提交时检查，先删商品
        if self
            .products
            .delete_by_id(conn, id)
            .await
            .map_err(persistence(op))?
        {
            self.observer.on_step(op, Step::ProductDeleted(id));
        }

        let barcode = self
            .barcodes
            .find_by_product_id(conn, id)
            .await
            .map_err(persistence(op))?;
        if barcode.is_some() {
            self.barcodes
                .delete_by_id(conn, id)
                .await
                .map_err(persistence(op))?;
            self.observer.on_step(op, Step::BarcodeDeleted(id));
        }
        Ok(())
    }

    // ========== 读操作 ==========

    /// 按 ID 查找商品，附带条码
    pub async fn find_by_id(&self, id: ProductId) -> ServiceResult<Option<Product>> {
        let op = Operation::FindById;
        let mut conn = self.open(op).await?;
        let outcome = self.find_by_id_on(op, &mut conn, id).await;
        self.release(op, conn, outcome).await
    }

    async fn find_by_id_on(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        id: ProductId,
    ) -> ServiceResult<Option<Product>> {
        match self
            .products
            .find_by_id(conn, id)
            .await
            .map_err(persistence(op))?
        {
            Some(product) => Ok(Some(self.hydrate(op, conn, product).await?)),
            None => Ok(None),
        }
    }

    /// 全部商品，按 ID 升序
    pub async fn find_all(&self) -> ServiceResult<Vec<Product>> {
        let op = Operation::FindAll;
        let mut conn = self.open(op).await?;
        let outcome = match self.products.find_all(&mut conn).await {
            Ok(products) => self.hydrate_all(op, &mut conn, products).await,
            Err(e) => Err(persistence(op)(e)),
        };
        self.release(op, conn, outcome).await
    }

    /// 名称包含给定文本（不区分大小写）的商品
    pub async fn find_by_name(&self, name: &str) -> ServiceResult<Vec<Product>> {
        let op = Operation::FindByName;
        let mut conn = self.open(op).await?;
        let outcome = match self.products.find_by_name(&mut conn, name).await {
            Ok(products) => self.hydrate_all(op, &mut conn, products).await,
            Err(e) => Err(persistence(op)(e)),
        };
        self.release(op, conn, outcome).await
    }

    /// 按条码号查找所属商品
    pub async fn find_by_barcode(&self, code: &str) -> ServiceResult<Option<Product>> {
        let op = Operation::FindByBarcode;
        let mut conn = self.open(op).await?;
        let outcome = self.find_by_barcode_on(op, &mut conn, code).await;
        self.release(op, conn, outcome).await
    }

    async fn find_by_barcode_on(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        code: &str,
    ) -> ServiceResult<Option<Product>> {
        let Some(barcode) = self
            .barcodes
            .find_by_code(conn, code)
            .await
            .map_err(persistence(op))?
        else {
            return Ok(None);
        };
        let Some(product_id) = barcode.product_id else {
            return Ok(None);
        };

        let product = self
            .products
            .find_by_id(conn, product_id)
            .await
            .map_err(persistence(op))?;
        Ok(product.map(|p| p.with_barcode(barcode)))
    }

    // ========== 条码 ==========

    /// 条码号唯一性检查
    ///
    /// 条码号已存在且所属商品不是 `current`（或 `current` 为空）时返回
    /// `DuplicateBarcode`。
    async fn ensure_barcode_is_unique(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        code: &str,
        current: Option<ProductId>,
    ) -> ServiceResult<()> {
        let existing = self
            .barcodes
            .find_by_code(conn, code)
            .await
            .map_err(persistence(op))?;

        match existing {
            Some(owner) if current.is_none() || owner.product_id != current => {
                self.observer.on_duplicate_barcode(op, code);
                Err(AppError::duplicate_barcode(code).into())
            }
            _ => Ok(()),
        }
    }

    /// 把挂接的条码写到商品名下：已有则更新，否则插入
    async fn persist_barcode(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        id: ProductId,
        mut barcode: Barcode,
    ) -> ServiceResult<Barcode> {
        self.ensure_barcode_is_unique(op, conn, &barcode.code, Some(id))
            .await?;

        barcode.product_id = Some(id);
        barcode.ensure_kind();

        let exists = self
            .barcodes
            .find_by_product_id(conn, id)
            .await
            .map_err(persistence(op))?
            .is_some();
        self.write_barcode(op, conn, id, &barcode, exists).await?;
        Ok(barcode)
    }

    async fn write_barcode(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        id: ProductId,
        barcode: &Barcode,
        exists: bool,
    ) -> ServiceResult<()> {
        let code = barcode.code.as_str();
        if exists {
            self.barcodes
                .update(conn, barcode)
                .await
                .map_err(barcode_write(op, code))?;
            self.observer.on_step(
                op,
                Step::BarcodeUpdated {
                    product_id: id,
                    code,
                },
            );
        } else {
            self.barcodes
                .save(conn, barcode)
                .await
                .map_err(barcode_write(op, code))?;
            self.observer.on_step(
                op,
                Step::BarcodeSaved {
                    product_id: id,
                    code,
                },
            );
        }
        Ok(())
    }

    async fn hydrate(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        mut product: Product,
    ) -> ServiceResult<Product> {
        if let Some(id) = product.id {
            product.barcode = self
                .barcodes
                .find_by_product_id(conn, id)
                .await
                .map_err(persistence(op))?;
        }
        Ok(product)
    }

    async fn hydrate_all(
        &self,
        op: Operation,
        conn: &mut Conn<P>,
        products: Vec<Product>,
    ) -> ServiceResult<Vec<Product>> {
        let mut hydrated = Vec::with_capacity(products.len());
        for product in products {
            hydrated.push(self.hydrate(op, conn, product).await?);
        }
        Ok(hydrated)
    }

    // ========== 连接与事务 ==========

    async fn open(&self, op: Operation) -> ServiceResult<Conn<P>> {
        self.provider.connection().await.map_err(|e| {
            let err = AppError::persistence(op.failure_message(), e);
            self.observer.on_error(op, &err);
            ServiceError::from(err)
        })
    }

    async fn begin(&self, op: Operation, conn: &mut Conn<P>) -> ServiceResult<()> {
        conn.set_auto_commit(false).await.map_err(persistence(op))?;
        conn.begin().await.map_err(persistence(op))?;
        self.observer.on_begin(op);
        Ok(())
    }

    /// 结束事务并释放连接
    ///
    /// 成功时提交，提交失败成为主错误；失败时回滚。
    /// 无论结果如何都恢复自动提交并关闭连接。
    async fn complete<T>(
        &self,
        op: Operation,
        mut conn: Conn<P>,
        outcome: ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut outcome = match outcome {
            Ok(value) => match conn.commit().await {
                Ok(()) => {
                    self.observer.on_commit(op);
                    Ok(value)
                }
                Err(e) => Err(persistence(op)(e)),
            },
            Err(e) => Err(e),
        };

        if let Err(primary) = &mut outcome {
            self.observer.on_error(op, primary.error());
            if conn.in_transaction() {
                match conn.rollback().await {
                    Ok(()) => self.observer.on_rollback(op),
                    Err(e) => {
                        self.observer.on_rollback_failed(op, &e);
                        primary.add_suppressed(e);
                    }
                }
            }
        }

        if let Err(e) = conn.set_auto_commit(true).await {
            outcome = attach_or_raise(outcome, op, e);
        }

        self.release(op, conn, outcome).await
    }

    /// 关闭连接，关闭失败按挂接或抛出处理
    async fn release<T>(
        &self,
        op: Operation,
        conn: Conn<P>,
        outcome: ServiceResult<T>,
    ) -> ServiceResult<T> {
        match conn.close().await {
            Ok(()) => outcome,
            Err(e) => {
                debug!(operation = op.as_str(), error = %e, "Failed to close connection");
                attach_or_raise(outcome, op, e)
            }
        }
    }
}

#[async_trait]
impl<P, S, B> CrudService<Product, ProductId> for ProductService<P, S, B>
where
    P: ConnectionProvider + 'static,
    S: ProductStore<Conn<P>> + 'static,
    B: BarcodeStore<Conn<P>> + 'static,
{
    async fn create(&self, entity: Product) -> ServiceResult<Product> {
        ProductService::create(self, entity).await
    }

    async fn update(&self, entity: Product) -> ServiceResult<Product> {
        ProductService::update(self, entity).await
    }

    async fn delete(&self, id: ProductId) -> ServiceResult<()> {
        ProductService::delete(self, id).await
    }

    async fn find_by_id(&self, id: ProductId) -> ServiceResult<Option<Product>> {
        ProductService::find_by_id(self, id).await
    }

    async fn find_all(&self) -> ServiceResult<Vec<Product>> {
        ProductService::find_all(self).await
    }
}
