//! 购物车服务
//!
//! 读取时总是按当前药价重算总价并写回购物车。

use collex_core::store::{CartStore, DirectoryStore};
use collex_core::{codes, price_cart_items, CartView, CollexError, Medicine, Result, Stores};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 购物车服务
pub struct CartService {
    carts: Arc<dyn CartStore>,
    directory: Arc<dyn DirectoryStore>,
}

impl CartService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            carts: stores.carts.clone(),
            directory: stores.directory.clone(),
        }
    }

    async fn active_medicine(&self, medicine_id: Uuid) -> Result<Medicine> {
        let medicine = self.directory.medicine(medicine_id).await?.ok_or_else(|| {
            CollexError::not_found(codes::MEDICINE_NOT_FOUND, format!("Medicine {} not found", medicine_id))
        })?;
        if !medicine.is_active {
            return Err(CollexError::invalid(
                codes::MEDICINE_INACTIVE,
                format!("Medicine {} is not available", medicine.name),
            ));
        }
        Ok(medicine)
    }

    fn check_stock(medicine: &Medicine, quantity: i32) -> Result<()> {
        if quantity > medicine.stock {
            return Err(CollexError::invalid_with(
                codes::INSUFFICIENT_STOCK,
                format!("Only {} unit(s) of {} available", medicine.stock, medicine.name),
                serde_json::json!({ "available": medicine.stock }),
            ));
        }
        Ok(())
    }

    /// 读取购物车；没有购物车的用户得到空视图
    pub async fn get(&self, user_id: Uuid) -> Result<CartView> {
        let Some(cart) = self.carts.get(user_id).await? else {
            return Ok(CartView {
                cart_id: None,
                user_id,
                items: Vec::new(),
                total_amount: Decimal::ZERO,
            });
        };

        let ids: Vec<Uuid> = cart.items.iter().map(|item| item.medicine_id).collect();
        let medicines = self.directory.medicines(&ids).await?;
        let (items, total) = price_cart_items(&cart.items, &medicines);

        if total != cart.total_amount {
            self.carts.save_total(cart.id, total).await?;
            debug!("Cart {} total recomputed to {}", cart.id, total);
        }

        Ok(CartView {
            cart_id: Some(cart.id),
            user_id,
            items,
            total_amount: total,
        })
    }

    /// 加入购物车；已有的药品数量累加
    pub async fn add(&self, user_id: Uuid, medicine_id: Uuid, quantity: i32) -> Result<CartView> {
        if quantity < 1 {
            return Err(CollexError::invalid(codes::INVALID_QUANTITY, "Quantity must be at least 1"));
        }
        let medicine = self.active_medicine(medicine_id).await?;

        let existing = self
            .carts
            .get(user_id)
            .await?
            .and_then(|cart| cart.quantity_of(medicine_id))
            .unwrap_or(0);
        let total = existing.checked_add(quantity).ok_or_else(|| {
            CollexError::invalid(codes::INVALID_QUANTITY, "Quantity exceeds the allowed maximum")
        })?;
        Self::check_stock(&medicine, total)?;

        self.carts.add(user_id, medicine_id, quantity).await?;
        info!("User {} added {} x {} to cart", user_id, quantity, medicine.name);
        self.get(user_id).await
    }

    /// 设置数量；0表示删除该行
    pub async fn update(&self, user_id: Uuid, medicine_id: Uuid, quantity: i32) -> Result<CartView> {
        if quantity < 0 {
            return Err(CollexError::invalid(codes::INVALID_QUANTITY, "Quantity cannot be negative"));
        }
        if quantity > 0 {
            let medicine = self.active_medicine(medicine_id).await?;
            Self::check_stock(&medicine, quantity)?;
        }

        self.carts.set_quantity(user_id, medicine_id, quantity).await?;
        self.get(user_id).await
    }

    pub async fn remove(&self, user_id: Uuid, medicine_id: Uuid) -> Result<CartView> {
        self.carts.remove(user_id, medicine_id).await?;
        self.get(user_id).await
    }

    /// 清空购物车，可重复调用
    pub async fn clear(&self, user_id: Uuid) -> Result<CartView> {
        self.carts.clear(user_id).await?;
        self.get(user_id).await
    }
}
