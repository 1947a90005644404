//! 商品实体

use chrono::NaiveDate;
use errors::AppResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entities::Barcode;
use crate::domain::validation::{
    BRAND_REQUIRED, CATEGORY_REQUIRED, COST_NON_NEGATIVE, CREATED_ON_REQUIRED, NAME_REQUIRED,
    PRICE_POSITIVE, STOCK_NON_NEGATIVE, require_barcode_code, require_not_blank,
    require_not_negative, require_positive, require_present, require_stock,
};
use crate::domain::value_objects::ProductId;

/// 商品
///
/// `id` 在首次持久化前为空。`barcode` 仅在内存中挂接，商品行本身不存条码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<ProductId>,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    /// 售价
    pub price: Decimal,
    /// 成本价
    pub cost: Decimal,
    pub stock: i32,
    pub created_on: Option<NaiveDate>,
    pub barcode: Option<Barcode>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        category_id: i64,
        brand_id: i64,
        price: Decimal,
        cost: Decimal,
        stock: i32,
        created_on: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            category_id: Some(category_id),
            brand_id: Some(brand_id),
            price,
            cost,
            stock,
            created_on: Some(created_on),
            barcode: None,
        }
    }

    pub fn with_id(mut self, id: ProductId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_barcode(mut self, barcode: Barcode) -> Self {
        self.barcode = Some(barcode);
        self
    }

    /// 商品写入前的业务校验
    ///
    /// 挂接了条码时，条码号也不能为空。
    pub fn validate(&self) -> AppResult<()> {
        require_not_blank(&self.name, NAME_REQUIRED)?;
        require_positive(self.price, PRICE_POSITIVE)?;
        require_not_negative(self.cost, COST_NON_NEGATIVE)?;
        require_present(self.category_id.as_ref(), CATEGORY_REQUIRED)?;
        require_present(self.brand_id.as_ref(), BRAND_REQUIRED)?;
        require_stock(self.stock, STOCK_NON_NEGATIVE)?;
        require_present(self.created_on.as_ref(), CREATED_ON_REQUIRED)?;
        if let Some(barcode) = &self.barcode {
            require_barcode_code(&barcode.code)?;
        }
        Ok(())
    }

    /// 去掉挂接的条码，得到纯商品行
    pub fn without_barcode(&self) -> Self {
        Self {
            barcode: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{BARCODE_REQUIRED, BARCODE_TOO_LONG};
    use errors::AppError;

    fn milk() -> Product {
        Product::new(
            "Milk",
            1,
            2,
            Decimal::new(150, 2),
            Decimal::new(90, 2),
            10,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
    }

    fn validation_message(product: &Product) -> String {
        match product.validate() {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_product() {
        assert!(milk().validate().is_ok());
        assert!(milk().with_description("1L").validate().is_ok());
    }

    #[test]
    fn test_rules_in_order() {
        let mut product = milk();
        product.name = "  ".to_string();
        product.price = Decimal::ZERO;
        assert_eq!(validation_message(&product), NAME_REQUIRED);

        let mut product = milk();
        product.price = Decimal::ZERO;
        assert_eq!(validation_message(&product), PRICE_POSITIVE);

        let mut product = milk();
        product.cost = Decimal::new(-1, 0);
        assert_eq!(validation_message(&product), COST_NON_NEGATIVE);

        let mut product = milk();
        product.category_id = None;
        assert_eq!(validation_message(&product), CATEGORY_REQUIRED);

        let mut product = milk();
        product.brand_id = None;
        assert_eq!(validation_message(&product), BRAND_REQUIRED);

        let mut product = milk();
        product.stock = -1;
        assert_eq!(validation_message(&product), STOCK_NON_NEGATIVE);

        let mut product = milk();
        product.created_on = None;
        assert_eq!(validation_message(&product), CREATED_ON_REQUIRED);
    }

    #[test]
    fn test_zero_cost_and_stock_allowed() {
        let mut product = milk();
        product.cost = Decimal::ZERO;
        product.stock = 0;
        assert!(product.validate().is_ok());
    }

    #[test]
    fn test_blank_attached_barcode_rejected() {
        let product = milk().with_barcode(Barcode::new(" "));
        assert_eq!(validation_message(&product), BARCODE_REQUIRED);
    }

    #[test]
    fn test_overlong_attached_barcode_rejected() {
        let product = milk().with_barcode(Barcode::new("00123456789050"));
        assert_eq!(validation_message(&product), BARCODE_TOO_LONG);
    }

    #[test]
    fn test_without_barcode() {
        let product = milk().with_barcode(Barcode::new("0012345678905"));
        let row = product.without_barcode();
        assert!(row.barcode.is_none());
        assert_eq!(row.name, "Milk");
    }
}
