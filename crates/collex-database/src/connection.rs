//! 数据库连接管理

use collex_core::{CollexError, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// 连接池参数
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
}

impl DatabaseSettings {
    fn connect_options(&self) -> Result<PgConnectOptions> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode)
            .map_err(|e| CollexError::Config(format!("invalid ssl mode '{}': {}", self.ssl_mode, e)))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

/// 数据库连接池
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// 建立连接池
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_open_conns)
            .min_connections(settings.max_idle_conns.min(settings.max_open_conns))
            .max_lifetime(settings.conn_max_lifetime)
            .idle_timeout(settings.conn_max_idle_time)
            .connect_with(settings.connect_options()?)
            .await
            .map_err(|e| CollexError::Database(e.to_string()))?;

        info!(
            "Connected to database {}@{}:{}/{} (max {} connections)",
            settings.user, settings.host, settings.port, settings.name, settings.max_open_conns
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// 把sqlx错误转换为数据库错误
pub(crate) fn db_err(e: sqlx::Error) -> CollexError {
    CollexError::Database(e.to_string())
}

/// Postgres唯一约束冲突 (SQLSTATE 23505)
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
