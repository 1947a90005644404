//! 数据库行映射结构

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::FromRow;

/// 商品数据库行
#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub brand_id: i64,
    pub price: Decimal,
    pub cost: Decimal,
    pub stock: i32,
    pub created_on: NaiveDate,
}

/// 条码数据库行
#[derive(Debug, FromRow)]
pub struct BarcodeRow {
    pub product_id: i64,
    pub code: String,
    pub kind: String,
    pub active: bool,
}
