//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use collex_core::models::*;
use collex_core::{CollexError, Result};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

fn corrupt(table: &str, field: &str, value: &str) -> CollexError {
    CollexError::Database(format!("{}.{} has unexpected value '{}'", table, field, value))
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub reason: String,
    pub mode: String,
    pub status: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i32,
    pub consultation_fee: Decimal,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub doctor_notes: Option<String>,
}

impl TryFrom<DbAppointment> for Appointment {
    type Error = CollexError;

    fn try_from(row: DbAppointment) -> Result<Self> {
        let mode = ConsultationMode::parse(&row.mode)
            .ok_or_else(|| corrupt("appointments", "mode", &row.mode))?;
        let status = AppointmentStatus::parse(&row.status)
            .ok_or_else(|| corrupt("appointments", "status", &row.status))?;
        let time = SlotTime::parse(&row.time).map_err(|_| corrupt("appointments", "time", &row.time))?;

        // 三项都为空说明尚未完成问诊
        let consultation = match (row.diagnosis, row.prescription, row.doctor_notes) {
            (None, None, None) => None,
            (diagnosis, prescription, doctor_notes) => Some(Consultation {
                diagnosis: diagnosis.unwrap_or_default(),
                prescription: prescription.unwrap_or_default(),
                doctor_notes: doctor_notes.unwrap_or_default(),
            }),
        };

        Ok(Appointment {
            id: row.id,
            booking_id: row.booking_id,
            doctor_id: row.doctor_id,
            patient_id: row.patient_id,
            reason: row.reason,
            mode,
            status,
            date: row.date,
            time,
            duration_minutes: row.duration_minutes,
            consultation_fee: row.consultation_fee,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
            cancelled_at: row.cancelled_at,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            completed_at: row.completed_at,
            consultation,
        })
    }
}

/// 数据库可预约时段表
#[derive(Debug, FromRow)]
pub struct DbAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAvailability> for AvailabilitySlot {
    type Error = CollexError;

    fn try_from(row: DbAvailability) -> Result<Self> {
        let time = SlotTime::parse(&row.time)
            .map_err(|_| corrupt("doctor_availability", "time", &row.time))?;
        Ok(AvailabilitySlot {
            doctor_id: row.doctor_id,
            date: row.date,
            time,
            created_at: row.created_at,
        })
    }
}

/// 数据库支付表
#[derive(Debug, FromRow)]
pub struct DbPayment {
    pub id: Uuid,
    pub order_id: String,
    pub razorpay_order_id: Option<String>,
    pub user_id: Uuid,
    pub cart_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub method: Option<String>,
    pub failure_reason: Option<String>,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPayment> for Payment {
    type Error = CollexError;

    fn try_from(row: DbPayment) -> Result<Self> {
        let status = PaymentStatus::parse(&row.status)
            .ok_or_else(|| corrupt("payments", "status", &row.status))?;
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            provider_order_id: row.razorpay_order_id,
            user_id: row.user_id,
            cart_id: row.cart_id,
            amount: row.amount,
            currency: row.currency,
            status,
            provider_payment_id: row.razorpay_payment_id,
            provider_signature: row.razorpay_signature,
            method: row.method,
            failure_reason: row.failure_reason,
            delivery_address: row.delivery_address,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库订单表
#[derive(Debug, FromRow)]
pub struct DbOrder {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub payment_id: Uuid,
    pub pharmacy_id: Uuid,
    pub total_amount: Decimal,
    pub status: String,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 数据库订单行表
#[derive(Debug, FromRow)]
pub struct DbOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub medicine_id: Uuid,
    pub pharmacy_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

impl From<DbOrderItem> for OrderItem {
    fn from(row: DbOrderItem) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            medicine_id: row.medicine_id,
            pharmacy_id: row.pharmacy_id,
            quantity: row.quantity,
            unit_price: row.price,
            subtotal: row.subtotal,
        }
    }
}

impl DbOrder {
    /// 与订单行组装为领域订单
    pub fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| corrupt("orders", "status", &self.status))?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            payment_id: self.payment_id,
            pharmacy_id: self.pharmacy_id,
            items,
            total_amount: self.total_amount,
            status,
            delivery_address: self.delivery_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 数据库购物车表
#[derive(Debug, FromRow)]
pub struct DbCart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl DbCart {
    pub fn into_cart(self, items: Vec<CartItem>) -> Cart {
        Cart {
            id: self.id,
            user_id: self.user_id,
            items,
            total_amount: self.total_amount,
            updated_at: self.updated_at,
        }
    }
}

/// 数据库购物车药品表
#[derive(Debug, FromRow)]
pub struct DbCartMedicine {
    pub medicine_id: Uuid,
    pub quantity: i32,
}

impl From<DbCartMedicine> for CartItem {
    fn from(row: DbCartMedicine) -> Self {
        CartItem {
            medicine_id: row.medicine_id,
            quantity: row.quantity,
        }
    }
}

/// 购物车行与当前药价的联表结果
#[derive(Debug, FromRow)]
pub struct DbPricedCartLine {
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub pharmacy_id: Uuid,
    pub name: String,
    pub price: Decimal,
}

impl From<DbPricedCartLine> for CartLine {
    fn from(row: DbPricedCartLine) -> Self {
        CartLine {
            medicine_id: row.medicine_id,
            pharmacy_id: row.pharmacy_id,
            name: row.name,
            unit_price: row.price,
            quantity: row.quantity,
            subtotal: row.price * Decimal::from(row.quantity),
        }
    }
}

/// 医生表与用户表的联表结果
#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: Option<String>,
    pub consultation_fee: Decimal,
    pub is_active: bool,
}

impl From<DbDoctor> for Doctor {
    fn from(row: DbDoctor) -> Self {
        Doctor {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            specialization: row.specialization,
            consultation_fee: row.consultation_fee,
            is_active: row.is_active,
        }
    }
}

/// 数据库药房表
#[derive(Debug, FromRow)]
pub struct DbPharmacy {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

impl From<DbPharmacy> for Pharmacy {
    fn from(row: DbPharmacy) -> Self {
        Pharmacy {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

/// 数据库用户表（摘要列）
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
}

impl TryFrom<DbUser> for UserSummary {
    type Error = CollexError;

    fn try_from(row: DbUser) -> Result<Self> {
        let role = Role::parse(&row.role).ok_or_else(|| corrupt("users", "role", &row.role))?;
        Ok(UserSummary {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role,
        })
    }
}

/// 数据库药品表
#[derive(Debug, FromRow)]
pub struct DbMedicine {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
}

impl From<DbMedicine> for Medicine {
    fn from(row: DbMedicine) -> Self {
        Medicine {
            id: row.id,
            pharmacy_id: row.pharmacy_id,
            name: row.name,
            price: row.price,
            stock: row.stock,
            is_active: row.is_active,
        }
    }
}
