//! # Collex数据库模块
//!
//! 提供PostgreSQL连接池、表结构迁移，以及核心存储接口的两种实现：
//! 基于sqlx的 [`PgStore`] 和用于测试的 [`MemoryStore`]。

pub mod connection;
pub mod memory;
pub mod models;
pub mod schema;

mod appointments;
mod carts;
mod directory;
mod orders;
mod payments;

use sqlx::PgPool;

// 重新导出主要类型
pub use connection::{DatabasePool, DatabaseSettings};
pub use memory::MemoryStore;
pub use schema::migrate;

/// Postgres存储，实现全部存储接口
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabasePool,
}

impl PgStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}
