//! 持久化实现
//!
//! - [`postgres`]：基于 sqlx 的 PostgreSQL 存储与迁移
//! - [`memory`]：进程内存储，支持故障注入

pub mod converters;
pub mod memory;
pub mod postgres;
pub mod rows;

pub use memory::*;
pub use postgres::*;
