//! 配置管理
//!
//! 分层加载：内置默认值 → 配置文件（可选）→ `COLLEX_` 前缀环境变量 → `SERVER_PORT`。
//! 加载后统一经过 [`ConfigValidator`] 校验。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "COLLEX";

/// 系统完整配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CollexConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 访问令牌配置
    pub token: TokenConfig,
    /// 支付服务商配置
    pub payment: PaymentConfig,
    /// 邮件配置（仅保留配置项）
    pub email: EmailConfig,
    /// 跨域配置
    pub cors: CorsConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    pub read_timeout_secs: u64,
    /// 写超时，同时作为请求处理超时
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// disable / allow / prefer / require / verify-ca / verify-full
    pub ssl_mode: String,
    /// 最大连接数
    pub max_open_conns: u32,
    /// 最小空闲连接数
    pub max_idle_conns: u32,
    pub conn_max_lifetime_secs: u64,
    pub conn_max_idle_time_secs: u64,
    /// 启动时执行建表
    pub auto_migrate: bool,
}

/// 访问令牌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// 签名密钥
    pub secret: String,
    pub access_expiry_secs: u64,
    pub refresh_expiry_secs: u64,
}

/// 支付服务商配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// 返回给客户端的公钥（key_id）
    pub public_key: String,
    /// 签名与API认证密钥
    pub secret_key: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// 孤儿支付对账间隔
    pub reconcile_interval_secs: u64,
    /// 临时支付行超过该时长才参与对账
    pub orphan_grace_secs: u64,
}

/// 邮件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_key: String,
    pub from_address: String,
    pub from_name: String,
    pub domain: String,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub template_dir: String,
}

/// 跨域配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 表达式
    pub level: String,
    /// pretty 或 json
    pub format: String,
}

impl CollexConfig {
    /// 按层加载配置并校验
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::load_unvalidated(path, std::env::var("SERVER_PORT").ok())?;
        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }

    fn load_unvalidated(path: Option<&Path>, server_port: Option<String>) -> Result<Self> {
        let defaults = Config::try_from(&CollexConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .with_list_parse_key("cors.allowed_methods")
                .with_list_parse_key("cors.allowed_headers")
                .with_list_parse_key("cors.exposed_headers"),
        );

        if let Some(port) = server_port {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("SERVER_PORT is not a valid port: {}", port))?;
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let config: CollexConfig = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match path {
            Some(path) => info!("Configuration loaded from {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&CollexConfig) -> Result<()>,
}

const SSL_MODES: &[&str] = &["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| {
                    if config.server.port == 0 {
                        anyhow::bail!("Server port cannot be 0");
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "database.max_open_conns",
                validator: |config| {
                    if config.database.max_open_conns == 0 {
                        anyhow::bail!("Database max open connections cannot be 0");
                    }
                    if config.database.max_idle_conns > config.database.max_open_conns {
                        anyhow::bail!(
                            "max_idle_conns ({}) exceeds max_open_conns ({})",
                            config.database.max_idle_conns,
                            config.database.max_open_conns
                        );
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "database.ssl_mode",
                validator: |config| {
                    if !SSL_MODES.contains(&config.database.ssl_mode.as_str()) {
                        anyhow::bail!("Unknown ssl mode '{}'", config.database.ssl_mode);
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "token.secret",
                validator: |config| {
                    if config.token.secret.trim().is_empty() {
                        anyhow::bail!("Token secret must be set");
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "payment.secret_key",
                validator: |config| {
                    if config.payment.secret_key.trim().is_empty() {
                        anyhow::bail!("Payment secret key must be set");
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "logging.format",
                validator: |config| {
                    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
                        anyhow::bail!("Unknown logging format '{}'", config.logging.format);
                    }
                    Ok(())
                },
            },
        ];

        Self { validation_rules }
    }

    pub fn validate(&self, config: &CollexConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(e.context(format!("Invalid configuration value {}", rule.field_path)));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 15,
            write_timeout_secs: 30,
            idle_timeout_secs: 60,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "collex".to_string(),
            ssl_mode: "disable".to_string(),
            max_open_conns: 25,
            max_idle_conns: 5,
            conn_max_lifetime_secs: 300,
            conn_max_idle_time_secs: 60,
            auto_migrate: false,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_expiry_secs: 15 * 60,
            refresh_expiry_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            secret_key: String::new(),
            api_base_url: "https://api.razorpay.com/v1".to_string(),
            request_timeout_secs: 10,
            reconcile_interval_secs: 60,
            orphan_grace_secs: 300,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_address: "no-reply@collex.local".to_string(),
            from_name: "Collex".to_string(),
            domain: String::new(),
            max_retries: 3,
            backoff_ms: 500,
            template_dir: "templates".to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["Authorization".to_string(), "Content-Type".to_string()],
            exposed_headers: vec!["x-request-id".to_string()],
            allow_credentials: false,
            max_age_secs: 3600,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CollexConfig {
        let mut config = CollexConfig::default();
        config.token.secret = "token-secret".to_string();
        config.payment.secret_key = "payment-secret".to_string();
        config
    }

    #[test]
    fn test_defaults_need_secrets() {
        let validator = ConfigValidator::new();
        assert!(validator.validate(&CollexConfig::default()).is_err());
        assert!(validator.validate(&valid()).is_ok());
    }

    #[test]
    fn test_validator_rules() {
        let validator = ConfigValidator::new();

        let mut config = valid();
        config.server.port = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = valid();
        config.database.max_idle_conns = 30;
        assert!(validator.validate(&config).is_err());

        let mut config = valid();
        config.database.ssl_mode = "sometimes".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = valid();
        config.logging.format = "xml".to_string();
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_file_layer_and_port_override() {
        let path = std::env::temp_dir().join(format!("collex-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[database]\nname = \"collex_test\"\nmax_open_conns = 10\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = CollexConfig::load_unvalidated(Some(&path), None).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.name, "collex_test");
        assert_eq!(config.database.max_open_conns, 10);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.logging.format, "json");

        let config = CollexConfig::load_unvalidated(Some(&path), Some("7070".to_string())).unwrap();
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.server.bind_address(), "0.0.0.0:7070");

        assert!(CollexConfig::load_unvalidated(Some(&path), Some("http".to_string())).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = Path::new("/nonexistent/collex.toml");
        assert!(CollexConfig::load_unvalidated(Some(path), None).is_err());
    }
}
