//! 订单服务
//!
//! 用户查看自己的订单；药房分页查看包含自家药品的订单并推进订单状态。

use collex_core::store::{DirectoryStore, OrderStore};
use collex_core::{
    codes, Clock, CollexError, Order, OrderStatus, Page, PageRequest, Pharmacy, PharmacyOrderView,
    Result, Stores, UserSummary,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 订单服务
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    directory: Arc<dyn DirectoryStore>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(stores: &Stores, clock: Arc<dyn Clock>) -> Self {
        Self {
            orders: stores.orders.clone(),
            directory: stores.directory.clone(),
            clock,
        }
    }

    fn parse_status(value: &str) -> Result<OrderStatus> {
        OrderStatus::parse(value).ok_or_else(|| {
            CollexError::invalid(
                codes::INVALID_ORDER_STATUS,
                format!("Unknown order status '{}'", value),
            )
        })
    }

    async fn pharmacy_of(&self, pharmacy_user_id: Uuid) -> Result<Pharmacy> {
        self.directory
            .pharmacy_by_user(pharmacy_user_id)
            .await?
            .ok_or_else(|| {
                CollexError::not_found(codes::PHARMACY_NOT_FOUND, "Pharmacy profile not found")
            })
    }

    /// 当前用户的订单，最新的在前
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let orders = self.orders.by_user(user_id).await?;
        debug!("Loaded {} order(s) for user {}", orders.len(), user_id);
        Ok(orders)
    }

    pub async fn get(&self, user_id: Uuid, order_id: Uuid) -> Result<Order> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| CollexError::not_found(codes::ORDER_NOT_FOUND, "Order not found"))?;
        if order.user_id != user_id {
            return Err(CollexError::forbidden("Order belongs to another user"));
        }
        Ok(order)
    }

    /// 药房订单列表
    pub async fn pharmacy_orders(
        &self,
        pharmacy_user_id: Uuid,
        status: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<PharmacyOrderView>> {
        let status = status.map(Self::parse_status).transpose()?;
        let pharmacy = self.pharmacy_of(pharmacy_user_id).await?;

        let (orders, total) = self
            .orders
            .by_pharmacy(pharmacy.id, status, page.offset(), i64::from(page.limit))
            .await?;

        let mut customer_ids: Vec<Uuid> = orders.iter().map(|order| order.user_id).collect();
        customer_ids.sort();
        customer_ids.dedup();
        let customers: HashMap<Uuid, UserSummary> = self
            .directory
            .users(&customer_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let items = orders
            .into_iter()
            .map(|order| PharmacyOrderView {
                customer: customers.get(&order.user_id).cloned(),
                order,
            })
            .collect();

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total,
        })
    }

    /// 药房推进订单状态
    pub async fn update_status(
        &self,
        pharmacy_user_id: Uuid,
        order_id: Uuid,
        status: &str,
    ) -> Result<Order> {
        let target = Self::parse_status(status)?;
        let pharmacy = self.pharmacy_of(pharmacy_user_id).await?;

        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| CollexError::not_found(codes::ORDER_NOT_FOUND, "Order not found"))?;

        if !order.has_line_for(pharmacy.id) {
            warn!(
                "Pharmacy {} attempted to update foreign order {}",
                pharmacy.id, order.order_number
            );
            return Err(CollexError::forbidden("Order has no items from this pharmacy"));
        }
        if order.status.is_terminal() {
            return Err(CollexError::invalid(
                codes::ORDER_TERMINAL,
                format!("Order is already {}", order.status.as_str()),
            ));
        }

        let updated = self
            .orders
            .update_status(order.id, target, self.clock.now())
            .await?;
        info!(
            "Order {} moved from {} to {} by pharmacy {}",
            updated.order_number,
            order.status.as_str(),
            updated.status.as_str(),
            pharmacy.id
        );
        Ok(updated)
    }
}
