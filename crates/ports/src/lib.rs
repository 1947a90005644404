//! ports - 抽象 trait 层
//!
//! 定义存储连接与通用服务的抽象接口

mod connection;
mod service;

pub use connection::*;
pub use service::*;
