//! PostgreSQL 存储实现
//!
//! 所有语句都在 [`PgSession`] 持有的连接上执行，由服务层控制事务边界。

use adapter_postgres::{PgSession, storage_error};
use async_trait::async_trait;
use errors::{AppError, AppResult, StorageError, StorageResult};
use sqlx::PgPool;
use tracing::info;

use crate::domain::entities::{Barcode, Product};
use crate::domain::repositories::{BarcodeStore, ProductStore};
use crate::domain::value_objects::ProductId;

use super::converters::{barcode_from_row, name_pattern, product_from_row};
use super::rows::{BarcodeRow, ProductRow};

const PRODUCT_COLUMNS: &str =
    "id, name, description, category_id, brand_id, price, cost, stock, created_on";

/// 执行内置迁移
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        AppError::persistence(
            "Failed to run migrations",
            StorageError::query("migration").with_source(e),
        )
    })?;

    info!("Database migrations applied");
    Ok(())
}

// ============================================================================
// ProductStore 实现
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PgProductStore;

#[async_trait]
impl ProductStore<PgSession> for PgProductStore {
    async fn save(&self, conn: &mut PgSession, product: &Product) -> StorageResult<Product> {
        let sql = format!(
            r#"
            INSERT INTO products (name, description, category_id, brand_id, price, cost, stock, created_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.category_id)
            .bind(product.brand_id)
            .bind(product.price)
            .bind(product.cost)
            .bind(product.stock)
            .bind(product.created_on)
            .fetch_one(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to insert product", e))?;

        Ok(product_from_row(row))
    }

    async fn update(
        &self,
        conn: &mut PgSession,
        product: &Product,
    ) -> StorageResult<Option<Product>> {
        let id = product
            .id
            .ok_or_else(|| StorageError::query("Cannot update a product without id"))?;

        let sql = format!(
            r#"
            UPDATE products
            SET name = $2, description = $3, category_id = $4, brand_id = $5,
                price = $6, cost = $7, stock = $8, created_on = $9
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.0)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.category_id)
            .bind(product.brand_id)
            .bind(product.price)
            .bind(product.cost)
            .bind(product.stock)
            .bind(product.created_on)
            .fetch_optional(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to update product", e))?;

        Ok(row.map(product_from_row))
    }

    async fn delete_by_id(&self, conn: &mut PgSession, id: ProductId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.0)
            .execute(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to delete product", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, conn: &mut PgSession, id: ProductId) -> StorageResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.0)
            .fetch_optional(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to find product", e))?;

        Ok(row.map(product_from_row))
    }

    async fn find_all(&self, conn: &mut PgSession) -> StorageResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to list products", e))?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }

    async fn find_by_name(&self, conn: &mut PgSession, name: &str) -> StorageResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE name ILIKE $1 ORDER BY id",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(name_pattern(name))
            .fetch_all(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to find products by name", e))?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }
}

// ============================================================================
// BarcodeStore 实现
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PgBarcodeStore;

fn owner(barcode: &Barcode) -> StorageResult<ProductId> {
    barcode
        .product_id
        .ok_or_else(|| StorageError::query("Barcode is not linked to a product"))
}

#[async_trait]
impl BarcodeStore<PgSession> for PgBarcodeStore {
    async fn save(&self, conn: &mut PgSession, barcode: &Barcode) -> StorageResult<()> {
        let product_id = owner(barcode)?;

        sqlx::query(
            r#"
            INSERT INTO barcodes (product_id, code, kind, active)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(product_id.0)
        .bind(&barcode.code)
        .bind(barcode.kind_or_default())
        .bind(barcode.active)
        .execute(conn.executor())
        .await
        .map_err(|e| storage_error("Failed to insert barcode", e))?;

        Ok(())
    }

    async fn update(&self, conn: &mut PgSession, barcode: &Barcode) -> StorageResult<()> {
        let product_id = owner(barcode)?;

        let result = sqlx::query(
            r#"
            UPDATE barcodes
            SET code = $2, kind = $3, active = $4
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.0)
        .bind(&barcode.code)
        .bind(barcode.kind_or_default())
        .bind(barcode.active)
        .execute(conn.executor())
        .await
        .map_err(|e| storage_error("Failed to update barcode", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::query(format!(
                "No barcode stored for product {}",
                product_id
            )));
        }
        Ok(())
    }

    async fn delete_by_id(&self, conn: &mut PgSession, product_id: ProductId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM barcodes WHERE product_id = $1")
            .bind(product_id.0)
            .execute(conn.executor())
            .await
            .map_err(|e| storage_error("Failed to delete barcode", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_code(&self, conn: &mut PgSession, code: &str) -> StorageResult<Option<Barcode>> {
        let row = sqlx::query_as::<_, BarcodeRow>(
            "SELECT product_id, code, kind, active FROM barcodes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(conn.executor())
        .await
        .map_err(|e| storage_error("Failed to find barcode", e))?;

        Ok(row.map(barcode_from_row))
    }

    async fn find_by_product_id(
        &self,
        conn: &mut PgSession,
        product_id: ProductId,
    ) -> StorageResult<Option<Barcode>> {
        let row = sqlx::query_as::<_, BarcodeRow>(
            "SELECT product_id, code, kind, active FROM barcodes WHERE product_id = $1",
        )
        .bind(product_id.0)
        .fetch_optional(conn.executor())
        .await
        .map_err(|e| storage_error("Failed to find barcode", e))?;

        Ok(row.map(barcode_from_row))
    }
}
