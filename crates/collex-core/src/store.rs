//! 存储接口
//!
//! 协调器只依赖这些trait；生产环境使用Postgres实现，测试使用内存实现。
//! 时段唯一性、支付状态转换和订单物化的原子性都由存储层保证。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// 预约存储
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// 写入单个预约；破坏时段唯一性时返回 `Conflict`
    async fn reserve(&self, appointment: &Appointment) -> Result<()>;

    /// 在一个事务中写入多个预约，任一冲突则全部回滚并返回 `Conflict`
    async fn reserve_all(&self, appointments: &[Appointment]) -> Result<()>;

    /// 时段是否已被未取消的预约占用
    async fn is_slot_taken(&self, doctor_id: Uuid, slot: &Slot) -> Result<bool>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>>;

    async fn update(&self, appointment: &Appointment) -> Result<()>;

    /// 按 (date, time) 升序
    async fn by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>>;

    async fn all_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>>;

    /// date ≥ today 且状态为 pending/confirmed
    async fn upcoming_by_doctor(&self, doctor_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>>;

    /// 终态，或 date < today
    async fn history_by_doctor(&self, doctor_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>>;

    async fn upcoming_by_patient(&self, patient_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>>;

    async fn history_by_patient(&self, patient_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>>;

    /// 发布可预约时段；已存在的 (doctor, date, time) 保持不变
    async fn publish_availability(&self, slots: &[AvailabilitySlot]) -> Result<()>;

    async fn availability_by_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>>;
}

/// 订单物化参数
#[derive(Debug, Clone)]
pub struct Materialization {
    pub cart_id: Uuid,
    pub draft: OrderDraft,
}

/// 支付成功结算参数
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment_id: Uuid,
    pub provider_payment_id: String,
    pub provider_signature: String,
    pub method: Option<String>,
    pub materialize: Option<Materialization>,
    pub settled_at: DateTime<Utc>,
}

/// 结算结果；`order` 仅在本次结算新建订单时为 Some
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub payment: Payment,
    pub order: Option<Order>,
}

/// 支付存储
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// 在调用支付服务商之前写入的临时支付行（无服务商订单号）
    async fn create_provisional(&self, payment: &Payment) -> Result<()>;

    async fn attach_provider_order(&self, payment_id: Uuid, provider_order_id: &str) -> Result<Payment>;

    /// 删除尚未关联服务商订单的临时行
    async fn discard(&self, payment_id: Uuid) -> Result<()>;

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>>;

    /// 仅 pending 状态会被置为 failed；返回当前行
    async fn mark_failed(&self, payment_id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<Payment>;

    /// 单事务：支付置为 success，并在需要时把购物车物化为订单、清空购物车。
    /// 同一支付最多物化一个订单。对 failed 支付返回 `InvalidInput`。
    async fn settle(&self, settlement: &Settlement) -> Result<SettlementOutcome>;

    /// 创建时间早于 cutoff 且仍未关联服务商订单的临时行
    async fn provisional_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>>;
}

/// 订单存储
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>>;

    /// 按创建时间倒序
    async fn by_user(&self, user_id: Uuid) -> Result<Vec<Order>>;

    async fn by_payment(&self, payment_id: Uuid) -> Result<Option<Order>>;

    /// 包含该药房任一订单行的订单，按创建时间倒序分页；返回 (订单, 总数)
    async fn by_pharmacy(
        &self,
        pharmacy_id: Uuid,
        status: Option<OrderStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64)>;

    /// 已送达或已取消的订单不再变更，返回ORDER_TERMINAL
    async fn update_status(&self, order_id: Uuid, status: OrderStatus, at: DateTime<Utc>) -> Result<Order>;
}

/// 购物车存储
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_by_id(&self, cart_id: Uuid) -> Result<Option<Cart>>;

    async fn get(&self, user_id: Uuid) -> Result<Option<Cart>>;

    /// 首次添加时创建购物车；已存在的药品数量累加
    async fn add(&self, user_id: Uuid, medicine_id: Uuid, delta: i32) -> Result<Cart>;

    /// 数量为0时删除该行
    async fn set_quantity(&self, user_id: Uuid, medicine_id: Uuid, quantity: i32) -> Result<Cart>;

    async fn remove(&self, user_id: Uuid, medicine_id: Uuid) -> Result<Cart>;

    async fn clear(&self, user_id: Uuid) -> Result<Option<Cart>>;

    async fn save_total(&self, cart_id: Uuid, total: Decimal) -> Result<()>;
}

/// 目录查询（用户、医生、药房、药品的读取端）
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>>;

    async fn doctor_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>>;

    async fn pharmacy_by_user(&self, user_id: Uuid) -> Result<Option<Pharmacy>>;

    async fn user(&self, id: Uuid) -> Result<Option<UserSummary>>;

    async fn users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>>;

    async fn medicine(&self, id: Uuid) -> Result<Option<Medicine>>;

    async fn medicines(&self, ids: &[Uuid]) -> Result<Vec<Medicine>>;
}

/// 所有存储句柄
#[derive(Clone)]
pub struct Stores {
    pub appointments: Arc<dyn AppointmentStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub orders: Arc<dyn OrderStore>,
    pub carts: Arc<dyn CartStore>,
    pub directory: Arc<dyn DirectoryStore>,
}

impl Stores {
    /// 由同时实现全部接口的单个存储构造
    pub fn from_single<S>(store: Arc<S>) -> Self
    where
        S: AppointmentStore + PaymentStore + OrderStore + CartStore + DirectoryStore + 'static,
    {
        Self {
            appointments: store.clone(),
            payments: store.clone(),
            orders: store.clone(),
            carts: store.clone(),
            directory: store,
        }
    }
}
