//! 日志初始化
//!
//! `RUST_LOG` 优先于配置中的级别；格式为 pretty 或 json。

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// 构造过滤器：`RUST_LOG` 存在时使用它，否则使用配置级别
fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level '{}': {}", level, e)),
    }
}

/// 初始化全局 tracing 订阅者；重复调用返回错误
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let format = LogFormat::parse(&config.format)
        .ok_or_else(|| anyhow!("Unknown logging format '{}'", config.format))?;
    let filter = build_filter(&config.level)?;

    let result = match format {
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}
