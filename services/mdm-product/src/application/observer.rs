//! 事务生命周期观察者
//!
//! 服务在事务开始、每个写入步骤、提交、回滚和失败时通知观察者。
//! 默认实现写结构化日志并累加 Prometheus 计数器。

use errors::{AppError, StorageError};
use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::domain::value_objects::ProductId;

/// 商品服务操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    CreateWithBarcode,
    Update,
    UpdateWithBarcode,
    Delete,
    FindById,
    FindAll,
    FindByName,
    FindByBarcode,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::CreateWithBarcode => "create_with_barcode",
            Self::Update => "update",
            Self::UpdateWithBarcode => "update_with_barcode",
            Self::Delete => "delete",
            Self::FindById => "find_by_id",
            Self::FindAll => "find_all",
            Self::FindByName => "find_by_name",
            Self::FindByBarcode => "find_by_barcode",
        }
    }

    /// 包装存储错误时使用的失败描述
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Create => "Failed to create product",
            Self::CreateWithBarcode => "Failed to create product with barcode",
            Self::Update => "Failed to update product",
            Self::UpdateWithBarcode => "Failed to update product with barcode",
            Self::Delete => "Failed to delete product",
            Self::FindById => "Failed to find product",
            Self::FindAll => "Failed to list products",
            Self::FindByName => "Failed to find products by name",
            Self::FindByBarcode => "Failed to find product by barcode",
        }
    }
}

/// 事务内完成的写入步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    ProductSaved(ProductId),
    ProductUpdated(ProductId),
    ProductDeleted(ProductId),
    BarcodeSaved { product_id: ProductId, code: &'a str },
    BarcodeUpdated { product_id: ProductId, code: &'a str },
    BarcodeDeleted(ProductId),
}

impl Step<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProductSaved(_) => "product_saved",
            Self::ProductUpdated(_) => "product_updated",
            Self::ProductDeleted(_) => "product_deleted",
            Self::BarcodeSaved { .. } => "barcode_saved",
            Self::BarcodeUpdated { .. } => "barcode_updated",
            Self::BarcodeDeleted(_) => "barcode_deleted",
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            Self::ProductSaved(id)
            | Self::ProductUpdated(id)
            | Self::ProductDeleted(id)
            | Self::BarcodeDeleted(id) => *id,
            Self::BarcodeSaved { product_id, .. } | Self::BarcodeUpdated { product_id, .. } => {
                *product_id
            }
        }
    }
}

/// 事务观察者
///
/// 所有回调都有空的默认实现，按需覆盖。
pub trait TransactionObserver: Send + Sync {
    fn on_begin(&self, _op: Operation) {}

    fn on_step(&self, _op: Operation, _step: Step<'_>) {}

    fn on_commit(&self, _op: Operation) {}

    fn on_rollback(&self, _op: Operation) {}

    /// 回滚本身失败，该错误已作为次要错误挂到主错误上
    fn on_rollback_failed(&self, _op: Operation, _error: &StorageError) {}

    /// 条码号已被其他商品占用
    fn on_duplicate_barcode(&self, _op: Operation, _code: &str) {}

    /// 事务失败，`error` 为返回给调用方的主错误
    fn on_error(&self, _op: Operation, _error: &AppError) {}
}

/// 不做任何事的观察者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransactionObserver;

impl TransactionObserver for NoopTransactionObserver {}

/// 基于 tracing + metrics 的观察者
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransactionObserver;

impl TransactionObserver for TracingTransactionObserver {
    fn on_begin(&self, op: Operation) {
        debug!(operation = op.as_str(), "Transaction started");
    }

    fn on_step(&self, op: Operation, step: Step<'_>) {
        match step {
            Step::BarcodeSaved { code, .. } | Step::BarcodeUpdated { code, .. } => info!(
                operation = op.as_str(),
                step = step.name(),
                product_id = %step.product_id(),
                barcode = code,
                "Transaction step completed"
            ),
            _ => info!(
                operation = op.as_str(),
                step = step.name(),
                product_id = %step.product_id(),
                "Transaction step completed"
            ),
        }
    }

    fn on_commit(&self, op: Operation) {
        info!(operation = op.as_str(), "Transaction committed");
        counter!("mdm_product_tx_commits_total", "operation" => op.as_str()).increment(1);
    }

    fn on_rollback(&self, op: Operation) {
        warn!(operation = op.as_str(), "Transaction rolled back");
        counter!("mdm_product_tx_rollbacks_total", "operation" => op.as_str()).increment(1);
    }

    fn on_rollback_failed(&self, op: Operation, error: &StorageError) {
        error!(operation = op.as_str(), error = %error, "Rollback failed");
    }

    fn on_duplicate_barcode(&self, op: Operation, code: &str) {
        warn!(operation = op.as_str(), barcode = code, "Barcode already assigned to another product");
    }

    fn on_error(&self, op: Operation, error: &AppError) {
        if error.is_validation() {
            warn!(operation = op.as_str(), error = %error, "Transaction rejected");
        } else {
            error!(operation = op.as_str(), error = %error, "Transaction failed");
        }
        counter!("mdm_product_tx_errors_total", "operation" => op.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_labels() {
        assert_eq!(Operation::CreateWithBarcode.as_str(), "create_with_barcode");
        assert_eq!(Operation::Delete.failure_message(), "Failed to delete product");
    }

    #[test]
    fn test_step_product_id() {
        let step = Step::BarcodeSaved {
            product_id: ProductId(8),
            code: "0012345678905",
        };
        assert_eq!(step.name(), "barcode_saved");
        assert_eq!(step.product_id(), ProductId(8));
        assert_eq!(Step::ProductDeleted(ProductId(2)).product_id(), ProductId(2));
    }

    #[test]
    fn test_tracing_observer_without_recorder() {
        // 未安装 recorder/subscriber 时所有回调都是空操作
        let observer = TracingTransactionObserver;
        observer.on_begin(Operation::Create);
        observer.on_step(Operation::Create, Step::ProductSaved(ProductId(1)));
        observer.on_commit(Operation::Create);
        observer.on_rollback(Operation::Update);
        observer.on_error(Operation::Update, &AppError::duplicate_barcode("0012345678905"));
    }
}
