//! # Collex工作流模块
//!
//! 提供医疗平台的核心业务流程，包括：
//! - 预约状态机：管理预约从待确认到完成/取消的生命周期
//! - 预约协调器：多时段预约、日程分组视图、医生可预约时段
//! - 购物车服务：按当前药价计算购物车
//! - 支付协调器：支付意图、回调校验与订单物化
//! - 订单服务：用户订单与药房订单管理

pub mod booking;
pub mod cart;
pub mod engine;
pub mod orders;
pub mod payment;
pub mod state_machine;

// 重新导出主要类型
pub use booking::{
    AppointmentCoordinator, AvailabilityRequest, BookingRequest, CompletionRequest,
    ConsultationHistory, SlotRequest,
};
pub use cart::CartService;
pub use engine::CollexEngine;
pub use orders::OrderService;
pub use payment::{
    CreateIntentRequest, PaymentCoordinator, PaymentIntent, ReconcileReport, VerificationResult,
    VerifyRequest,
};
pub use state_machine::{AppointmentEvent, AppointmentStateMachine};
