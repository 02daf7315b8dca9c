//! 应用引擎
//!
//! 持有所有协调器，是HTTP层与后台任务访问业务逻辑的唯一入口

use crate::{
    booking::AppointmentCoordinator,
    cart::CartService,
    orders::OrderService,
    payment::{PaymentCoordinator, ReconcileReport},
};
use chrono::Duration;
use collex_core::{Clock, Result, Stores};
use collex_integration::{PaymentProvider, SignatureVerifier};
use std::sync::Arc;

/// 应用引擎
///
/// 各协调器共享同一组存储句柄与时钟
pub struct CollexEngine {
    appointments: AppointmentCoordinator,
    payments: PaymentCoordinator,
    carts: CartService,
    orders: OrderService,
    clock: Arc<dyn Clock>,
}

impl CollexEngine {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn PaymentProvider>,
        verifier: SignatureVerifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::info!("Initializing collex engine");
        Self {
            appointments: AppointmentCoordinator::new(&stores, clock.clone()),
            payments: PaymentCoordinator::new(&stores, provider, verifier, clock.clone()),
            carts: CartService::new(&stores),
            orders: OrderService::new(&stores, clock.clone()),
            clock,
        }
    }

    pub fn appointments(&self) -> &AppointmentCoordinator {
        &self.appointments
    }

    pub fn payments(&self) -> &PaymentCoordinator {
        &self.payments
    }

    pub fn carts(&self) -> &CartService {
        &self.carts
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 一轮孤儿支付对账，由后台定时任务调用
    pub async fn reconcile_payments(&self, grace: Duration) -> Result<ReconcileReport> {
        self.payments.reconcile_provider_orphans(grace).await
    }
}
