//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::error::{codes, CollexError, Result};

/// 预约默认时长（分钟）
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// 单次预约可选择的最大时段数
pub const MAX_SLOTS_PER_BOOKING: usize = 5;

/// 用户角色，使用小写slug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 普通用户（患者）
    Normal,
    Doctor,
    Pharmacy,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Doctor => "doctor",
            Role::Pharmacy => "pharmacy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Role::Normal),
            "doctor" => Some(Role::Doctor),
            "pharmacy" => Some(Role::Pharmacy),
            _ => None,
        }
    }
}

/// 预约状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::NoShow)
    }

    /// 仍然占用时段的状态
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/// 就诊方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationMode {
    Online,
    Offline,
}

impl ConsultationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    /// 只接受精确的 "online" / "offline"
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

/// "HH:MM" 格式的时段开始时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != 5 {
            return Err(CollexError::invalid(
                codes::INVALID_TIME,
                format!("Invalid time '{}', expected HH:MM", value),
            ));
        }
        NaiveTime::parse_from_str(value, "%H:%M")
            .map(SlotTime)
            .map_err(|_| {
                CollexError::invalid(
                    codes::INVALID_TIME,
                    format!("Invalid time '{}', expected HH:MM", value),
                )
            })
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SlotTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// 解析 "YYYY-MM-DD" 日期
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        CollexError::invalid(
            codes::INVALID_DATE,
            format!("Invalid date '{}', expected YYYY-MM-DD", value),
        )
    })
}

/// 一个(日期, 时间)时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: SlotTime,
}

impl Slot {
    pub fn new(date: NaiveDate, time: SlotTime) -> Self {
        Self { date, time }
    }

    /// 按UTC解释的时段开始时刻
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_time(self.time.as_naive()))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time)
    }
}

/// 就诊记录，在完成问诊时生成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub diagnosis: String,
    pub prescription: String,
    pub doctor_notes: String,
}

/// 预约：一个(医生, 患者, 日期, 时间)的占位
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    /// 同一次预约请求产生的所有时段共享的分组ID
    pub booking_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub reason: String,
    pub mode: ConsultationMode,
    pub status: AppointmentStatus,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub duration_minutes: i32,
    pub consultation_fee: Decimal,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub consultation: Option<Consultation>,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot::new(self.date, self.time)
    }
}

/// 预约分组视图：一次请求预约的多个时段合并为一项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingGroup {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub patient_id: Uuid,
    pub patient: String,
    pub reason: String,
    pub mode: ConsultationMode,
    pub status: AppointmentStatus,
    pub selected_slots: Vec<Slot>,
}

/// 医生发布的可预约时段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub created_at: DateTime<Utc>,
}

/// 医生档案
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: Option<String>,
    pub consultation_fee: Decimal,
    pub is_active: bool,
}

/// 药房档案
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pharmacy {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

/// 用户摘要（视图联表使用）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

impl UserSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// 药品
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
}

/// 购物车中的一行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub medicine_id: Uuid,
    pub quantity: i32,
}

/// 购物车，每个用户一个
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub total_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn quantity_of(&self, medicine_id: Uuid) -> Option<i32> {
        self.items
            .iter()
            .find(|item| item.medicine_id == medicine_id)
            .map(|item| item.quantity)
    }
}

/// 带价格的购物车行
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub medicine_id: Uuid,
    pub pharmacy_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// 购物车读取视图，总价按当前药价计算
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_id: Option<Uuid>,
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_amount: Decimal,
}

/// 按当前药价给购物车行定价；目录中已不存在的药品被跳过
pub fn price_cart_items(items: &[CartItem], medicines: &[Medicine]) -> (Vec<CartLine>, Decimal) {
    let mut lines = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;

    for item in items {
        let Some(medicine) = medicines.iter().find(|m| m.id == item.medicine_id) else {
            continue;
        };
        let subtotal = medicine.price * Decimal::from(item.quantity);
        total += subtotal;
        lines.push(CartLine {
            medicine_id: medicine.id,
            pharmacy_id: medicine.pharmacy_id,
            name: medicine.name.clone(),
            unit_price: medicine.price,
            quantity: item.quantity,
            subtotal,
        });
    }

    (lines, total)
}

/// 支付状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// 支付意图
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    /// 本地订单号，最长40字符
    pub order_id: String,
    /// 支付服务商订单号；在远端下单成功之前为空
    pub provider_order_id: Option<String>,
    pub user_id: Uuid,
    pub cart_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider_payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub provider_signature: Option<String>,
    pub method: Option<String>,
    pub failure_reason: Option<String>,
    pub delivery_address: String,
    /// 透传的备注（序列化后的JSON字符串）
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// 订单行
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub medicine_id: Uuid,
    pub pharmacy_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// 订单：成功支付的购物车快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub payment_id: Uuid,
    pub pharmacy_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn has_line_for(&self, pharmacy_id: Uuid) -> bool {
        self.items.iter().any(|item| item.pharmacy_id == pharmacy_id)
    }

    /// 从已定价的购物车行构造订单；空购物车返回None
    pub fn from_cart_lines(
        draft: &OrderDraft,
        payment: &Payment,
        lines: &[CartLine],
        now: DateTime<Utc>,
    ) -> Option<Order> {
        let first = lines.first()?;
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                order_id: draft.order_id,
                medicine_id: line.medicine_id,
                pharmacy_id: line.pharmacy_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
            })
            .collect();
        let total_amount = items.iter().map(|item| item.subtotal).sum();

        Some(Order {
            id: draft.order_id,
            order_number: draft.order_number.clone(),
            user_id: payment.user_id,
            payment_id: payment.id,
            pharmacy_id: first.pharmacy_id,
            items,
            total_amount,
            status: OrderStatus::Confirmed,
            delivery_address: payment.delivery_address.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// 订单物化所需的预分配标识
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_id: Uuid,
    pub order_number: String,
}

/// 药房订单列表中的一项：订单 + 下单用户
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyOrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<UserSummary>,
}

/// 分页请求：page ≥ 1，1 ≤ limit ≤ 100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if page < 1 {
            return Err(CollexError::invalid(
                codes::INVALID_PAGINATION,
                "page must be at least 1",
            ));
        }
        if !(1..=Self::MAX_LIMIT).contains(&limit) {
            return Err(CollexError::invalid(
                codes::INVALID_PAGINATION,
                format!("limit must be between 1 and {}", Self::MAX_LIMIT),
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + i64::from(self.limit) - 1) / i64::from(self.limit)
        }
    }
}
