//! 数据库行到领域对象的转换

use crate::domain::entities::{Barcode, Product};
use crate::domain::value_objects::ProductId;

use super::rows::{BarcodeRow, ProductRow};

/// 将 ProductRow 转换为 Product（不含条码）
pub fn product_from_row(row: ProductRow) -> Product {
    Product {
        id: Some(ProductId(row.id)),
        name: row.name,
        description: row.description,
        category_id: Some(row.category_id),
        brand_id: Some(row.brand_id),
        price: row.price,
        cost: row.cost,
        stock: row.stock,
        created_on: Some(row.created_on),
        barcode: None,
    }
}

pub fn barcode_from_row(row: BarcodeRow) -> Barcode {
    Barcode {
        product_id: Some(ProductId(row.product_id)),
        code: row.code,
        kind: Some(row.kind),
        active: row.active,
    }
}

/// 名称模糊匹配模式，转义 LIKE 通配符
pub fn name_pattern(name: &str) -> String {
    let escaped = name
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_product_from_row() {
        let product = product_from_row(ProductRow {
            id: 12,
            name: "Widget".to_string(),
            description: None,
            category_id: 1,
            brand_id: 1,
            price: Decimal::new(999, 2),
            cost: Decimal::new(400, 2),
            stock: 10,
            created_on: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        });

        assert_eq!(product.id, Some(ProductId(12)));
        assert_eq!(product.category_id, Some(1));
        assert_eq!(product.price.to_string(), "9.99");
        assert!(product.barcode.is_none());
    }

    #[test]
    fn test_barcode_from_row() {
        let barcode = barcode_from_row(BarcodeRow {
            product_id: 12,
            code: "0012345678905".to_string(),
            kind: "EAN13".to_string(),
            active: true,
        });

        assert_eq!(barcode.product_id, Some(ProductId(12)));
        assert_eq!(barcode.kind.as_deref(), Some("EAN13"));
    }

    #[test]
    fn test_name_pattern_escapes_wildcards() {
        assert_eq!(name_pattern("milk"), "%milk%");
        assert_eq!(name_pattern("100%"), "%100\\%%");
        assert_eq!(name_pattern("a_b"), "%a\\_b%");
    }
}
