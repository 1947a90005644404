//! 领域实体

mod barcode;
mod product;

pub use barcode::*;
pub use product::*;
