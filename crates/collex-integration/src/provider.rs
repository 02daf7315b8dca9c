//! 支付服务商接口
//!
//! 协调器只通过 [`PaymentProvider`] 与外部支付服务交互，
//! 生产环境使用Razorpay连接器，测试使用桩实现。

use async_trait::async_trait;
use collex_core::Result;
use serde::{Deserialize, Serialize};

/// 远端下单请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteOrderRequest {
    /// 以最小货币单位计的金额（如INR的paise）
    pub amount: i64,
    pub currency: String,
    /// 本地订单号，用于对账
    pub receipt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
}

/// 远端订单
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// 远端支付元数据
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemotePayment {
    pub id: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// 支付服务商
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// 返回给客户端的公钥
    fn public_key(&self) -> &str;

    async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder>;

    async fn fetch_payment(&self, provider_payment_id: &str) -> Result<RemotePayment>;

    /// 按receipt查找远端订单，用于孤儿订单对账
    async fn find_order_by_receipt(&self, receipt: &str) -> Result<Option<RemoteOrder>>;
}
