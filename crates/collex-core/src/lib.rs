//! # Collex Core
//!
//! 医疗服务平台的核心模块，提供数据模型、错误定义、存储接口和通用工具。

pub mod error;
pub mod models;
pub mod store;
pub mod utils;

pub use error::{codes, CollexError, ErrorKind, Result};
pub use models::*;
pub use store::Stores;
pub use utils::{Clock, FixedClock, SystemClock};
