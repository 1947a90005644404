//! 商品 + 条码扁平 DTO

use chrono::NaiveDate;
use errors::AppResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entities::Product;
use crate::domain::validation::require_barcode_code;
use crate::domain::value_objects::ProductId;

/// 一次性写入商品及其条码的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductWithBarcode {
    /// 更新时必填
    pub product_id: Option<ProductId>,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub price: Decimal,
    pub cost: Decimal,
    pub stock: i32,
    pub created_on: Option<NaiveDate>,
    /// GTIN-13 条码号
    pub barcode: String,
}

impl ProductWithBarcode {
    /// 先按商品规则校验，再校验条码号
    pub fn validate(&self) -> AppResult<()> {
        self.to_product().validate()?;
        require_barcode_code(&self.barcode)
    }

    /// 构造尚未持久化的商品（不含条码）
    pub fn to_product(&self) -> Product {
        Product {
            id: None,
            name: self.name.clone(),
            description: self.description.clone(),
            category_id: self.category_id,
            brand_id: self.brand_id,
            price: self.price,
            cost: self.cost,
            stock: self.stock,
            created_on: self.created_on,
            barcode: None,
        }
    }

    /// 把标量字段覆盖到已有商品上，ID 和条码保持不变
    pub fn apply_to(&self, product: &mut Product) {
        product.name = self.name.clone();
        product.description = self.description.clone();
        product.category_id = self.category_id;
        product.brand_id = self.brand_id;
        product.price = self.price;
        product.cost = self.cost;
        product.stock = self.stock;
        product.created_on = self.created_on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{BARCODE_REQUIRED, BARCODE_TOO_LONG, PRICE_POSITIVE};
    use errors::AppError;

    fn dto() -> ProductWithBarcode {
        ProductWithBarcode {
            product_id: None,
            name: "Coffee".to_string(),
            description: Some("Ground, 250g".to_string()),
            category_id: Some(4),
            brand_id: Some(9),
            price: Decimal::new(799, 2),
            cost: Decimal::new(420, 2),
            stock: 25,
            created_on: NaiveDate::from_ymd_opt(2024, 3, 15),
            barcode: "4006381333931".to_string(),
        }
    }

    #[test]
    fn test_valid_dto() {
        assert!(dto().validate().is_ok());
    }

    #[test]
    fn test_blank_barcode_rejected() {
        let mut input = dto();
        input.barcode = "   ".to_string();
        assert!(matches!(
            input.validate(),
            Err(AppError::Validation(msg)) if msg == BARCODE_REQUIRED
        ));
    }

    #[test]
    fn test_overlong_barcode_rejected() {
        let mut input = dto();
        input.barcode = "40063813339310".to_string();
        assert!(matches!(
            input.validate(),
            Err(AppError::Validation(msg)) if msg == BARCODE_TOO_LONG
        ));
    }

    #[test]
    fn test_product_rules_checked_before_barcode() {
        let mut input = dto();
        input.price = Decimal::ZERO;
        input.barcode = String::new();
        assert!(matches!(
            input.validate(),
            Err(AppError::Validation(msg)) if msg == PRICE_POSITIVE
        ));
    }

    #[test]
    fn test_apply_to_keeps_identity() {
        let mut product = dto().to_product().with_id(ProductId(5));
        let mut input = dto();
        input.name = "Decaf".to_string();
        input.stock = 3;
        input.apply_to(&mut product);

        assert_eq!(product.id, Some(ProductId(5)));
        assert_eq!(product.name, "Decaf");
        assert_eq!(product.stock, 3);
        assert!(product.barcode.is_none());
    }
}
