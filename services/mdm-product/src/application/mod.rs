//! 应用层
//!
//! 商品服务、事务观察者和带条码的商品 DTO

pub mod dto;
pub mod observer;
pub mod service;

pub use dto::*;
pub use observer::*;
pub use service::*;
