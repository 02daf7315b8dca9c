//! # Collex集成模块
//!
//! 提供与外部支付服务的集成功能，包括：
//! - 支付服务商接口，供协调器依赖
//! - Razorpay HTTPS连接器
//! - 支付回调的HMAC签名校验

pub mod provider;
pub mod razorpay;
pub mod signature;

pub use provider::{PaymentProvider, RemoteOrder, RemoteOrderRequest, RemotePayment};
pub use razorpay::{RazorpayConfig, RazorpayConnector};
pub use signature::SignatureVerifier;
