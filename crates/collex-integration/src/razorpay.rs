//! Razorpay连接器
//!
//! 通过HTTPS JSON接口创建远端订单、查询支付元数据。
//! 认证使用 key_id/key_secret 的HTTP基本认证。

use async_trait::async_trait;
use collex_core::{CollexError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::provider::{PaymentProvider, RemoteOrder, RemoteOrderRequest, RemotePayment};

/// 默认API地址
pub const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com/v1";

/// 连接器配置
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct OrderCollection {
    #[serde(default)]
    items: Vec<RemoteOrder>,
}

/// Razorpay连接器
pub struct RazorpayConnector {
    config: RazorpayConfig,
    client: reqwest::Client,
}

impl RazorpayConnector {
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollexError::Provider(format!("failed to build HTTP client: {}", e)))?;

        info!("Razorpay connector initialized for {}", config.api_base_url);
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.config.key_id, Some(&self.config.key_secret))
    }

    /// 发送请求并解析JSON响应
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| CollexError::Provider(format!("{} request failed: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Razorpay {} returned {}: {}", operation, status, body);
            return Err(CollexError::Provider(format!(
                "{} returned status {}",
                operation, status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CollexError::Provider(format!("{} response malformed: {}", operation, e)))
    }
}

#[async_trait]
impl PaymentProvider for RazorpayConnector {
    fn public_key(&self) -> &str {
        &self.config.key_id
    }

    async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder> {
        debug!(
            "Creating Razorpay order for receipt {} ({} {})",
            request.receipt, request.amount, request.currency
        );
        let order: RemoteOrder = self
            .send("create order", self.client.post(self.url("orders")).json(request))
            .await?;

        info!("Razorpay order {} created for receipt {}", order.id, request.receipt);
        Ok(order)
    }

    async fn fetch_payment(&self, provider_payment_id: &str) -> Result<RemotePayment> {
        self.send(
            "fetch payment",
            self.client.get(self.url(&format!("payments/{}", provider_payment_id))),
        )
        .await
    }

    async fn find_order_by_receipt(&self, receipt: &str) -> Result<Option<RemoteOrder>> {
        let collection: OrderCollection = self
            .send(
                "find order",
                self.client
                    .get(self.url("orders"))
                    .query(&[("receipt", receipt)]),
            )
            .await?;

        Ok(collection
            .items
            .into_iter()
            .find(|order| order.receipt.as_deref() == Some(receipt)))
    }
}
