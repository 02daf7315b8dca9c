//! 支付协调器
//!
//! 支付意图的创建、回调签名校验与结算、状态查询，以及孤儿远端订单的对账。
//!
//! 意图创建顺序：先写入没有服务商订单号的临时行，再调用服务商下单，
//! 成功后回填订单号，失败则删除临时行。进程在两步之间中断留下的临时行
//! 由 [`PaymentCoordinator::reconcile_provider_orphans`] 按receipt向服务商查询后处理。

use chrono::Duration;
use collex_core::store::{CartStore, Materialization, OrderStore, PaymentStore, Settlement};
use collex_core::utils::{generate_local_order_id, generate_order_number, new_id};
use collex_core::{
    codes, Clock, CollexError, Order, OrderDraft, Payment, PaymentStatus, Result, Stores,
};
use collex_integration::{PaymentProvider, RemoteOrderRequest, SignatureVerifier};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 默认币种
pub const DEFAULT_CURRENCY: &str = "INR";

/// 签名校验失败时记录的原因
pub const INVALID_SIGNATURE_REASON: &str = "Invalid signature";

/// 创建支付意图请求
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub cart_id: Option<Uuid>,
    pub delivery_address: String,
    pub notes: Option<serde_json::Value>,
}

/// 返回给客户端的支付意图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub order_id: String,
    pub razorpay_order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub key: String,
    pub notes: Option<serde_json::Value>,
}

/// 支付回调
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub order_id: String,
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub provider_signature: String,
}

/// 校验结果；`order` 为该支付对应的订单（本次新建或此前已建）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub payment: Payment,
    pub order: Option<Order>,
    pub order_created: bool,
}

/// 对账结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub attached: usize,
    pub discarded: usize,
    pub failed: usize,
}

/// 把金额转换为最小货币单位
fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

/// 支付协调器
pub struct PaymentCoordinator {
    payments: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderStore>,
    carts: Arc<dyn CartStore>,
    provider: Arc<dyn PaymentProvider>,
    verifier: SignatureVerifier,
    clock: Arc<dyn Clock>,
}

impl PaymentCoordinator {
    pub fn new(
        stores: &Stores,
        provider: Arc<dyn PaymentProvider>,
        verifier: SignatureVerifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payments: stores.payments.clone(),
            orders: stores.orders.clone(),
            carts: stores.carts.clone(),
            provider,
            verifier,
            clock,
        }
    }

    /// 创建支付意图
    pub async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent> {
        let amount_minor = to_minor_units(request.amount)
            .filter(|minor| *minor > 0)
            .ok_or_else(|| CollexError::invalid(codes::INVALID_AMOUNT, "Amount must be greater than 0"))?;

        let currency = request
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CollexError::invalid(
                codes::INVALID_INPUT,
                format!("Unsupported currency '{}'", currency),
            ));
        }

        if let Some(cart_id) = request.cart_id {
            let owned = self
                .carts
                .find_by_id(cart_id)
                .await?
                .map_or(false, |cart| cart.user_id == request.user_id);
            if !owned {
                return Err(CollexError::not_found(codes::CART_NOT_FOUND, "Cart not found"));
            }
        }

        let now = self.clock.now();
        let notes = request.notes.as_ref().map(serde_json::to_string).transpose()?;
        let provisional = Payment {
            id: new_id(),
            order_id: generate_local_order_id(now),
            provider_order_id: None,
            user_id: request.user_id,
            cart_id: request.cart_id,
            amount: request.amount,
            currency: currency.clone(),
            status: PaymentStatus::Pending,
            provider_payment_id: None,
            provider_signature: None,
            method: None,
            failure_reason: None,
            delivery_address: request.delivery_address.clone(),
            notes,
            created_at: now,
            updated_at: now,
        };
        self.payments.create_provisional(&provisional).await?;

        let remote = match self
            .provider
            .create_remote_order(&RemoteOrderRequest {
                amount: amount_minor,
                currency: currency.clone(),
                receipt: provisional.order_id.clone(),
                notes: request.notes.clone(),
            })
            .await
        {
            Ok(remote) => remote,
            Err(e) => {
                error!("Remote order creation failed for {}: {}", provisional.order_id, e);
                if let Err(discard_err) = self.payments.discard(provisional.id).await {
                    error!(
                        "Failed to discard provisional payment {}: {}",
                        provisional.order_id, discard_err
                    );
                }
                return Err(e);
            }
        };

        // 临时行可能已被对账任务清除，此时服务商订单只能人工处理
        let payment = match self.payments.attach_provider_order(provisional.id, &remote.id).await {
            Ok(payment) => payment,
            Err(e) => {
                error!(
                    "Provider order {} (receipt {}) is orphaned and needs manual reconciliation: {}",
                    remote.id, provisional.order_id, e
                );
                return Err(e);
            }
        };

        info!(
            "Payment intent {} created for user {} (provider order {})",
            payment.order_id, payment.user_id, remote.id
        );
        Ok(PaymentIntent {
            order_id: payment.order_id,
            razorpay_order_id: remote.id,
            amount: payment.amount,
            currency: payment.currency,
            key: self.provider.public_key().to_string(),
            notes: request.notes,
        })
    }

    /// 校验支付回调并结算
    pub async fn verify(&self, request: VerifyRequest) -> Result<VerificationResult> {
        let payment = self
            .payments
            .find_by_order_id(&request.order_id)
            .await?
            .ok_or_else(|| {
                CollexError::not_found(
                    codes::PAYMENT_NOT_FOUND,
                    format!("Payment {} not found", request.order_id),
                )
            })?;

        let order_matches = payment.provider_order_id.as_deref() == Some(request.provider_order_id.as_str());
        let signature_valid = self.verifier.verify(
            &request.provider_order_id,
            &request.provider_payment_id,
            &request.provider_signature,
        );

        if !(order_matches && signature_valid) {
            warn!("Invalid payment signature for {}", payment.order_id);
            // 已成功的支付不会被降级
            if payment.status == PaymentStatus::Pending {
                self.payments
                    .mark_failed(payment.id, INVALID_SIGNATURE_REASON, self.clock.now())
                    .await?;
            }
            return Err(CollexError::invalid(codes::INVALID_SIGNATURE, INVALID_SIGNATURE_REASON));
        }

        if payment.status == PaymentStatus::Failed {
            return Err(CollexError::invalid(
                codes::PAYMENT_ALREADY_FAILED,
                format!("Payment {} has already failed", payment.order_id),
            ));
        }

        let method = if payment.status == PaymentStatus::Pending {
            match self.provider.fetch_payment(&request.provider_payment_id).await {
                Ok(remote) => remote.method,
                Err(e) => {
                    warn!("Could not fetch payment method for {}: {}", request.provider_payment_id, e);
                    None
                }
            }
        } else {
            None
        };

        let now = self.clock.now();
        let materialize = payment.cart_id.map(|cart_id| Materialization {
            cart_id,
            draft: OrderDraft {
                order_id: new_id(),
                order_number: generate_order_number(now),
            },
        });

        let outcome = self
            .payments
            .settle(&Settlement {
                payment_id: payment.id,
                provider_payment_id: request.provider_payment_id,
                provider_signature: request.provider_signature,
                method,
                materialize,
                settled_at: now,
            })
            .await?;

        let order_created = outcome.order.is_some();
        let order = match outcome.order {
            Some(order) => {
                info!(
                    "Order {} materialized from payment {} ({} line(s))",
                    order.order_number,
                    outcome.payment.order_id,
                    order.items.len()
                );
                Some(order)
            }
            None => self.orders.by_payment(outcome.payment.id).await?,
        };

        info!("Payment {} verified", outcome.payment.order_id);
        Ok(VerificationResult {
            payment: outcome.payment,
            order,
            order_created,
        })
    }

    /// 查询支付状态，仅限本人
    pub async fn status(&self, order_id: &str, user_id: Uuid) -> Result<Payment> {
        let payment = self
            .payments
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| {
                CollexError::not_found(codes::PAYMENT_NOT_FOUND, format!("Payment {} not found", order_id))
            })?;
        if payment.user_id != user_id {
            return Err(CollexError::forbidden("Payment belongs to another user"));
        }
        Ok(payment)
    }

    /// 处理超过宽限期仍未关联服务商订单的临时行
    pub async fn reconcile_provider_orphans(&self, grace: Duration) -> Result<ReconcileReport> {
        let cutoff = self.clock.now() - grace;
        let orphans = self.payments.provisional_before(cutoff).await?;
        let mut report = ReconcileReport::default();

        for payment in orphans {
            match self.provider.find_order_by_receipt(&payment.order_id).await {
                Ok(Some(remote)) => {
                    self.payments.attach_provider_order(payment.id, &remote.id).await?;
                    info!("Reattached provider order {} to {}", remote.id, payment.order_id);
                    report.attached += 1;
                }
                Ok(None) => {
                    self.payments.discard(payment.id).await?;
                    debug!("Discarded provisional payment {}", payment.order_id);
                    report.discarded += 1;
                }
                Err(e) => {
                    warn!("Reconciliation lookup failed for {}: {}", payment.order_id, e);
                    report.failed += 1;
                }
            }
        }

        if report != ReconcileReport::default() {
            info!(
                "Payment reconciliation: {} attached, {} discarded, {} failed",
                report.attached, report.discarded, report.failed
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use collex_core::{FixedClock, Medicine, OrderStatus};
    use collex_database::MemoryStore;
    use collex_integration::{RemoteOrder, RemotePayment};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SECRET: &str = "test_secret";

    #[derive(Default)]
    struct StubProvider {
        fail_create: AtomicBool,
        fail_fetch: AtomicBool,
        created: AtomicUsize,
        fetched: AtomicUsize,
        remote_orders: Mutex<HashMap<String, RemoteOrder>>,
        discard_during_create: Mutex<Option<Arc<MemoryStore>>>,
    }

    impl StubProvider {
        fn remember(&self, receipt: &str, id: &str) {
            self.remote_orders.lock().unwrap().insert(
                receipt.to_string(),
                RemoteOrder {
                    id: id.to_string(),
                    amount: 0,
                    currency: "INR".to_string(),
                    receipt: Some(receipt.to_string()),
                    status: Some("created".to_string()),
                },
            );
        }
    }

    #[async_trait]
    impl PaymentProvider for StubProvider {
        fn public_key(&self) -> &str {
            "rzp_test_public"
        }

        async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(CollexError::Provider("connection reset".to_string()));
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            let id = format!("order_{}", n);
            self.remember(&request.receipt, &id);

            // 模拟对账任务在远程调用期间清除了临时行
            let store = self.discard_during_create.lock().unwrap().clone();
            if let Some(store) = store {
                if let Some(payment) = store.find_by_order_id(&request.receipt).await? {
                    store.discard(payment.id).await?;
                }
            }
            Ok(RemoteOrder {
                id,
                amount: request.amount,
                currency: request.currency.clone(),
                receipt: Some(request.receipt.clone()),
                status: Some("created".to_string()),
            })
        }

        async fn fetch_payment(&self, provider_payment_id: &str) -> Result<RemotePayment> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(CollexError::Provider("timeout".to_string()));
            }
            Ok(RemotePayment {
                id: provider_payment_id.to_string(),
                method: Some("upi".to_string()),
                status: Some("captured".to_string()),
            })
        }

        async fn find_order_by_receipt(&self, receipt: &str) -> Result<Option<RemoteOrder>> {
            Ok(self.remote_orders.lock().unwrap().get(receipt).cloned())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        provider: Arc<StubProvider>,
        clock: FixedClock,
        coordinator: PaymentCoordinator,
        user: Uuid,
        cart_id: Uuid,
    }

    /// 用户购物车：2 x 75.00 + 1 x 100.00 = 250.00
    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(StubProvider::default());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2030, 1, 15, 12, 0, 0).unwrap());
        let user = Uuid::new_v4();
        let pharmacy = Uuid::new_v4();

        for (price, quantity) in [(Decimal::new(7500, 2), 2), (Decimal::new(10000, 2), 1)] {
            let medicine = Medicine {
                id: Uuid::new_v4(),
                pharmacy_id: pharmacy,
                name: format!("Medicine {}", price),
                price,
                stock: 50,
                is_active: true,
            };
            store.insert_medicine(medicine.clone()).await;
            store.add(user, medicine.id, quantity).await.unwrap();
        }
        let cart_id = store.get(user).await.unwrap().unwrap().id;

        let coordinator = PaymentCoordinator::new(
            &Stores::from_single(store.clone()),
            provider.clone(),
            SignatureVerifier::new(SECRET),
            Arc::new(clock.clone()),
        );
        Fixture {
            store,
            provider,
            clock,
            coordinator,
            user,
            cart_id,
        }
    }

    fn intent_request(f: &Fixture) -> CreateIntentRequest {
        CreateIntentRequest {
            user_id: f.user,
            amount: Decimal::new(25000, 2),
            currency: None,
            cart_id: Some(f.cart_id),
            delivery_address: "221B Baker Street".to_string(),
            notes: Some(serde_json::json!({ "source": "app" })),
        }
    }

    fn callback(intent: &PaymentIntent, payment_id: &str) -> VerifyRequest {
        VerifyRequest {
            order_id: intent.order_id.clone(),
            provider_order_id: intent.razorpay_order_id.clone(),
            provider_payment_id: payment_id.to_string(),
            provider_signature: SignatureVerifier::new(SECRET).sign(&intent.razorpay_order_id, payment_id),
        }
    }

    #[tokio::test]
    async fn test_happy_path_materializes_order_once() {
        let f = fixture().await;
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();
        assert_eq!(intent.currency, "INR");
        assert_eq!(intent.key, "rzp_test_public");
        assert!(intent.order_id.starts_with("ORD"));
        assert!(intent.order_id.len() <= 40);

        let result = f.coordinator.verify(callback(&intent, "pay_Y")).await.unwrap();
        assert!(result.order_created);
        assert_eq!(result.payment.status, PaymentStatus::Success);
        assert_eq!(result.payment.method.as_deref(), Some("upi"));
        let order = result.order.unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total_amount, Decimal::new(25000, 2));
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.delivery_address, "221B Baker Street");
        assert!(f.store.get(f.user).await.unwrap().unwrap().items.is_empty());

        let again = f.coordinator.verify(callback(&intent, "pay_Y")).await.unwrap();
        assert!(!again.order_created);
        assert_eq!(again.order.unwrap().id, order.id);
        assert_eq!(f.store.order_count().await, 1);
        assert_eq!(f.provider.fetched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reverify_keeps_settled_payment_id() {
        let f = fixture().await;
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();

        let first = f.coordinator.verify(callback(&intent, "pay_Y")).await.unwrap();
        assert_eq!(first.payment.provider_payment_id.as_deref(), Some("pay_Y"));

        let second = f.coordinator.verify(callback(&intent, "pay_Z")).await.unwrap();
        assert!(!second.order_created);
        assert_eq!(second.payment.provider_payment_id.as_deref(), Some("pay_Y"));

        let payment = f.coordinator.status(&intent.order_id, f.user).await.unwrap();
        assert_eq!(payment.provider_payment_id.as_deref(), Some("pay_Y"));
        assert_eq!(
            payment.provider_signature,
            Some(SignatureVerifier::new(SECRET).sign(&intent.razorpay_order_id, "pay_Y"))
        );
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_intent_discarded_during_remote_call() {
        let f = fixture().await;
        *f.provider.discard_during_create.lock().unwrap() = Some(f.store.clone());

        let err = f.coordinator.create_intent(intent_request(&f)).await.unwrap_err();
        assert_eq!(err.code(), codes::PAYMENT_NOT_FOUND);
        assert_eq!(f.store.payment_count().await, 0);
        assert_eq!(f.provider.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_fails_payment_and_keeps_cart() {
        let f = fixture().await;
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();

        let mut tampered = callback(&intent, "pay_Y");
        tampered.provider_signature = SignatureVerifier::new("wrong").sign(&intent.razorpay_order_id, "pay_Y");
        let err = f.coordinator.verify(tampered).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_SIGNATURE);

        let payment = f.coordinator.status(&intent.order_id, f.user).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason.as_deref(), Some(INVALID_SIGNATURE_REASON));
        assert_eq!(f.store.get(f.user).await.unwrap().unwrap().items.len(), 2);
        assert_eq!(f.store.order_count().await, 0);

        let err = f.coordinator.verify(callback(&intent, "pay_Y")).await.unwrap_err();
        assert_eq!(err.code(), codes::PAYMENT_ALREADY_FAILED);
    }

    #[tokio::test]
    async fn test_bad_signature_does_not_downgrade_success() {
        let f = fixture().await;
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();
        f.coordinator.verify(callback(&intent, "pay_Y")).await.unwrap();

        let mut tampered = callback(&intent, "pay_Y");
        tampered.provider_signature = "00".repeat(32);
        let err = f.coordinator.verify(tampered).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_SIGNATURE);

        let payment = f.coordinator.status(&intent.order_id, f.user).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_mismatched_provider_order_is_rejected() {
        let f = fixture().await;
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();

        let verifier = SignatureVerifier::new(SECRET);
        let request = VerifyRequest {
            order_id: intent.order_id.clone(),
            provider_order_id: "order_other".to_string(),
            provider_payment_id: "pay_Y".to_string(),
            provider_signature: verifier.sign("order_other", "pay_Y"),
        };
        let err = f.coordinator.verify(request).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_SIGNATURE);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_row() {
        let f = fixture().await;
        f.provider.fail_create.store(true, Ordering::SeqCst);

        let err = f.coordinator.create_intent(intent_request(&f)).await.unwrap_err();
        assert_eq!(err.code(), codes::PROVIDER_ERROR);
        assert_eq!(f.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_fatal() {
        let f = fixture().await;
        f.provider.fail_fetch.store(true, Ordering::SeqCst);
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();

        let result = f.coordinator.verify(callback(&intent, "pay_Y")).await.unwrap();
        assert_eq!(result.payment.status, PaymentStatus::Success);
        assert!(result.payment.method.is_none());
    }

    #[tokio::test]
    async fn test_create_intent_validation() {
        let f = fixture().await;

        let mut request = intent_request(&f);
        request.amount = Decimal::ZERO;
        let err = f.coordinator.create_intent(request).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_AMOUNT);

        let mut request = intent_request(&f);
        request.user_id = Uuid::new_v4();
        let err = f.coordinator.create_intent(request).await.unwrap_err();
        assert_eq!(err.code(), codes::CART_NOT_FOUND);

        assert_eq!(f.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_status_is_owner_only() {
        let f = fixture().await;
        let intent = f.coordinator.create_intent(intent_request(&f)).await.unwrap();

        let err = f.coordinator.status(&intent.order_id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), collex_core::ErrorKind::Forbidden);

        let err = f.coordinator.status("ORD404", f.user).await.unwrap_err();
        assert_eq!(err.code(), codes::PAYMENT_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reconcile_orphans() {
        let f = fixture().await;
        let now = f.clock.now();
        let orphan = |order_id: &str| Payment {
            id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            provider_order_id: None,
            user_id: f.user,
            cart_id: None,
            amount: Decimal::ONE,
            currency: "INR".to_string(),
            status: PaymentStatus::Pending,
            provider_payment_id: None,
            provider_signature: None,
            method: None,
            failure_reason: None,
            delivery_address: String::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        f.store.create_provisional(&orphan("ORD_KNOWN")).await.unwrap();
        f.store.create_provisional(&orphan("ORD_LOST")).await.unwrap();
        f.provider.remember("ORD_KNOWN", "order_remote");

        let report = f
            .coordinator
            .reconcile_provider_orphans(Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(report, ReconcileReport::default());

        f.clock.advance(Duration::minutes(10));
        let report = f
            .coordinator
            .reconcile_provider_orphans(Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(report.attached, 1);
        assert_eq!(report.discarded, 1);

        let known = f.store.find_by_order_id("ORD_KNOWN").await.unwrap().unwrap();
        assert_eq!(known.provider_order_id.as_deref(), Some("order_remote"));
        assert!(f.store.find_by_order_id("ORD_LOST").await.unwrap().is_none());
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(25000, 2)), Some(25000));
        assert_eq!(to_minor_units(Decimal::new(1999, 3)), Some(200));
        assert_eq!(to_minor_units(Decimal::new(1, 3)), Some(0));
    }
}
