//! Collex服务器主程序

use anyhow::{Context, Result};
use clap::Parser;
use collex_admin::{init_tracing, CollexConfig};
use collex_core::{Stores, SystemClock};
use collex_database::{migrate, DatabasePool, DatabaseSettings, PgStore};
use collex_integration::{RazorpayConfig, RazorpayConnector, SignatureVerifier};
use collex_web::{AppState, HmacTokenService, WebServer};
use collex_workflow::CollexEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Collex服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "collex-server")]
#[command(about = "Collex 医疗服务平台 HTTP 服务器")]
struct Args {
    /// 配置文件路径（toml/yaml/json）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 启动时执行建表，忽略 database.auto_migrate
    #[arg(long)]
    migrate: bool,
}

fn database_settings(config: &CollexConfig) -> DatabaseSettings {
    let db = &config.database;
    DatabaseSettings {
        host: db.host.clone(),
        port: db.port,
        user: db.user.clone(),
        password: db.password.clone(),
        name: db.name.clone(),
        ssl_mode: db.ssl_mode.clone(),
        max_open_conns: db.max_open_conns,
        max_idle_conns: db.max_idle_conns,
        conn_max_lifetime: Duration::from_secs(db.conn_max_lifetime_secs),
        conn_max_idle_time: Duration::from_secs(db.conn_max_idle_time_secs),
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000))
}

/// 后台孤儿支付对账
fn spawn_reconciler(engine: Arc<CollexEngine>, interval_secs: u64, grace_secs: u64) {
    if interval_secs == 0 {
        warn!("Payment reconciliation disabled");
        return;
    }
    let grace = seconds(grace_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.reconcile_payments(grace).await {
                error!("Payment reconciliation failed: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = CollexConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // 初始化日志
    init_tracing(&config.logging)?;

    info!("Starting collex server...");
    info!("  Listen address: {}", config.server.bind_address());
    info!(
        "  Database: {}@{}:{}/{}",
        config.database.user, config.database.host, config.database.port, config.database.name
    );
    info!("  Payment API: {}", config.payment.api_base_url);

    let db = DatabasePool::connect(&database_settings(&config))
        .await
        .context("Failed to connect to database")?;
    if args.migrate || config.database.auto_migrate {
        migrate(&db).await.context("Database migration failed")?;
    }

    let clock = Arc::new(SystemClock);
    let provider = RazorpayConnector::new(RazorpayConfig {
        key_id: config.payment.public_key.clone(),
        key_secret: config.payment.secret_key.clone(),
        api_base_url: config.payment.api_base_url.clone(),
        timeout: Duration::from_secs(config.payment.request_timeout_secs),
    })?;

    let engine = Arc::new(CollexEngine::new(
        Stores::from_single(Arc::new(PgStore::new(db.clone()))),
        Arc::new(provider),
        SignatureVerifier::new(config.payment.secret_key.as_bytes()),
        clock.clone(),
    ));
    spawn_reconciler(
        engine.clone(),
        config.payment.reconcile_interval_secs,
        config.payment.orphan_grace_secs,
    );

    let tokens = Arc::new(HmacTokenService::new(
        config.token.secret.as_bytes(),
        seconds(config.token.access_expiry_secs),
        clock,
    ));
    let state = AppState { engine, tokens };

    let result = WebServer::new(&config.server, &config.cors, state).run().await;
    db.close().await;

    match result {
        Ok(()) => {
            info!("Collex server stopped");
            Ok(())
        }
        Err(e) => {
            error!("Collex server failed: {}", e);
            Err(e.into())
        }
    }
}
