//! # Collex管理模块
//!
//! 提供分层配置加载、配置校验和日志初始化等运维功能

pub mod config;
pub mod logging;

pub use config::{
    CollexConfig, ConfigValidator, CorsConfig, DatabaseConfig, EmailConfig, LoggingConfig,
    PaymentConfig, ServerConfig, TokenConfig,
};
pub use logging::{init_tracing, LogFormat};
