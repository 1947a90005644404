//! mdm-product - 商品主数据服务
//!
//! 商品与条码（1:1）的事务性增删改查。写操作在单个事务内完成，
//! 失败时整体回滚；存储层通过 [`ports::ConnectionProvider`] 注入，
//! 提供 PostgreSQL 与内存两种实现。

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{
    NoopTransactionObserver, Operation, ProductService, ProductWithBarcode, Step,
    TracingTransactionObserver, TransactionObserver,
};
pub use domain::{Barcode, DEFAULT_BARCODE_KIND, Product, ProductId};
