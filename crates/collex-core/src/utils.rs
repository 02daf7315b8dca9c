//! 通用工具函数：时钟与标识符生成

use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// 本地订单号最大长度
pub const LOCAL_ORDER_ID_MAX_LEN: usize = 40;

/// 时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// 当前UTC日期
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟，可在测试中手动推进
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// 生成新的实体ID
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// 生成本地订单号: "ORD" + unix秒 + 8位随机字符，最长40字符
pub fn generate_local_order_id(now: DateTime<Utc>) -> String {
    let mut id = format!("ORD{}{}", now.timestamp(), random_alphanumeric(8));
    id.truncate(LOCAL_ORDER_ID_MAX_LEN);
    id
}

/// 生成面向用户的订单编号: "CLX-YYYYMMDD-XXXXXXXX"
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    format!(
        "CLX-{}-{}",
        now.format("%Y%m%d"),
        random_alphanumeric(8).to_uppercase()
    )
}
