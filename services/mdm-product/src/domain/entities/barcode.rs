//! 商品条码

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ProductId;

/// 未指定类型时使用的条码类型
pub const DEFAULT_BARCODE_KIND: &str = "EAN13";

/// 商品条码（GTIN-13）
///
/// 与商品 1:1，`product_id` 同时是条码的存储主键。
/// `code` 在所有条码之间唯一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barcode {
    pub product_id: Option<ProductId>,
    pub code: String,
    pub kind: Option<String>,
    pub active: bool,
}

impl Barcode {
    /// 尚未关联商品的条码，类型留空，持久化时补默认值
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            product_id: None,
            code: code.into(),
            kind: None,
            active: true,
        }
    }

    /// 为指定商品创建默认类型的条码
    pub fn for_product(product_id: ProductId, code: impl Into<String>) -> Self {
        Self {
            product_id: Some(product_id),
            code: code.into(),
            kind: Some(DEFAULT_BARCODE_KIND.to_string()),
            active: true,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// 条码类型，未设置时为 EAN13
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_BARCODE_KIND)
    }

    /// 补齐缺省类型
    pub fn ensure_kind(&mut self) {
        if self.kind.is_none() {
            self.kind = Some(DEFAULT_BARCODE_KIND.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_barcode_has_no_kind() {
        let barcode = Barcode::new("0012345678905");
        assert!(barcode.product_id.is_none());
        assert!(barcode.kind.is_none());
        assert!(barcode.active);
        assert_eq!(barcode.kind_or_default(), "EAN13");
    }

    #[test]
    fn test_ensure_kind_keeps_existing() {
        let mut upc = Barcode::new("012345678905").with_kind("UPCA");
        upc.ensure_kind();
        assert_eq!(upc.kind.as_deref(), Some("UPCA"));

        let mut plain = Barcode::new("0012345678905");
        plain.ensure_kind();
        assert_eq!(plain.kind.as_deref(), Some(DEFAULT_BARCODE_KIND));
    }

    #[test]
    fn test_for_product() {
        let barcode = Barcode::for_product(ProductId(3), "4006381333931");
        assert_eq!(barcode.product_id, Some(ProductId(3)));
        assert_eq!(barcode.kind.as_deref(), Some("EAN13"));
        assert!(barcode.active);
    }
}
