//! 领域层
//!
//! 商品与条码实体、强类型 ID、存储接口和业务校验

pub mod entities;
pub mod repositories;
pub mod validation;
pub mod value_objects;

pub use entities::*;
pub use repositories::*;
pub use value_objects::*;
