//! 存储接口
//!
//! 所有方法都在调用方传入的连接上执行，从而参与同一个事务。

mod barcode_store;
mod product_store;

pub use barcode_store::*;
pub use product_store::*;
