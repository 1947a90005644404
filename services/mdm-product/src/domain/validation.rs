//! 业务校验规则
//!
//! 每条规则失败时返回 [`AppError::Validation`]，消息原样暴露给调用方。

use errors::{AppError, AppResult};
use rust_decimal::Decimal;

pub const NAME_REQUIRED: &str = "Product name is required";
pub const PRICE_POSITIVE: &str = "Price must be greater than zero";
pub const COST_NON_NEGATIVE: &str = "Cost must be zero or greater";
pub const CATEGORY_REQUIRED: &str = "Category is required";
pub const BRAND_REQUIRED: &str = "Brand is required";
pub const STOCK_NON_NEGATIVE: &str = "Stock must be zero or greater";
pub const CREATED_ON_REQUIRED: &str = "Creation date is required";
pub const BARCODE_REQUIRED: &str = "Barcode (GTIN-13) is required";
pub const BARCODE_TOO_LONG: &str = "Barcode must be at most 13 characters";
pub const PRODUCT_ID_REQUIRED: &str = "Product id is required";

/// 与 `barcodes.code` 列宽一致
pub const BARCODE_MAX_CHARS: usize = 13;

pub fn require_not_blank(value: &str, message: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(())
}

/// 条码号非空且不超过 [`BARCODE_MAX_CHARS`] 个字符
pub fn require_barcode_code(code: &str) -> AppResult<()> {
    require_not_blank(code, BARCODE_REQUIRED)?;
    if code.chars().count() > BARCODE_MAX_CHARS {
        return Err(AppError::validation(BARCODE_TOO_LONG));
    }
    Ok(())
}

pub fn require_present<T>(value: Option<&T>, message: &str) -> AppResult<()> {
    match value {
        Some(_) => Ok(()),
        None => Err(AppError::validation(message)),
    }
}

pub fn require_positive(value: Decimal, message: &str) -> AppResult<()> {
    if value <= Decimal::ZERO {
        return Err(AppError::validation(message));
    }
    Ok(())
}

pub fn require_not_negative(value: Decimal, message: &str) -> AppResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::validation(message));
    }
    Ok(())
}

pub fn require_stock(value: i32, message: &str) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::validation(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_blank() {
        assert!(require_not_blank("Milk", NAME_REQUIRED).is_ok());
        assert!(require_not_blank("   ", NAME_REQUIRED).is_err());
        assert!(require_not_blank("", NAME_REQUIRED).is_err());
    }

    #[test]
    fn test_decimal_rules() {
        assert!(require_positive(Decimal::new(1, 2), PRICE_POSITIVE).is_ok());
        assert!(require_positive(Decimal::ZERO, PRICE_POSITIVE).is_err());
        assert!(require_not_negative(Decimal::ZERO, COST_NON_NEGATIVE).is_ok());
        assert!(require_not_negative(Decimal::new(-1, 2), COST_NON_NEGATIVE).is_err());
    }

    #[test]
    fn test_barcode_code() {
        assert!(require_barcode_code("0012345678905").is_ok());
        let err = require_barcode_code("00123456789050").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == BARCODE_TOO_LONG));
        let err = require_barcode_code("  ").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == BARCODE_REQUIRED));
    }

    #[test]
    fn test_message_is_kept() {
        let err = require_stock(-1, STOCK_NON_NEGATIVE).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == STOCK_NON_NEGATIVE));
    }
}
