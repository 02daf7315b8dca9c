//! # Collex Web服务模块
//!
//! HTTP边界：路由、认证中间件、统一响应信封与错误状态码映射

pub mod auth;
pub mod handlers;
pub mod response;
pub mod server;

pub use auth::{HmacTokenService, Identity, TokenService};
pub use response::{ApiError, ApiResponse, ApiResult};
pub use server::{create_app, AppState, WebServer};
