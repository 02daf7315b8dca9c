//! 订单存储的Postgres实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collex_core::store::OrderStore;
use collex_core::{codes, CollexError, Order, OrderItem, OrderStatus, Result};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::connection::db_err;
use crate::models::{DbOrder, DbOrderItem};
use crate::PgStore;

/// 在事务中写入订单及其订单行
pub(crate) async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, user_id, payment_id, pharmacy_id, total_amount, status,
            delivery_address, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.payment_id)
    .bind(order.pharmacy_id)
    .bind(order.total_amount)
    .bind(order.status.as_str())
    .bind(&order.delivery_address)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, medicine_id, pharmacy_id, quantity, price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.medicine_id)
        .bind(item.pharmacy_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.subtotal)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    }

    Ok(())
}

impl PgStore {
    /// 批量加载订单行并与订单组装
    async fn attach_items(&self, rows: Vec<DbOrder>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let items = sqlx::query_as::<_, DbOrderItem>(
            "SELECT * FROM order_items WHERE order_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(item.into());
        }

        rows.into_iter()
            .map(|row| {
                let items = grouped.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    async fn single_order(&self, row: Option<DbOrder>) -> Result<Option<Order>> {
        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

pub(crate) fn order_terminal(order: &Order) -> CollexError {
    CollexError::invalid(
        codes::ORDER_TERMINAL,
        format!("Order is already {}", order.status.as_str()),
    )
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, DbOrder>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        self.single_order(row).await
    }

    async fn by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, DbOrder>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        self.attach_items(rows).await
    }

    async fn by_payment(&self, payment_id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, DbOrder>("SELECT * FROM orders WHERE payment_id = $1")
            .bind(payment_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        self.single_order(row).await
    }

    async fn by_pharmacy(
        &self,
        pharmacy_id: Uuid,
        status: Option<OrderStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64)> {
        let status = status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM orders o
            WHERE EXISTS (
                SELECT 1 FROM order_items oi WHERE oi.order_id = o.id AND oi.pharmacy_id = $1
            )
            AND ($2::text IS NULL OR o.status = $2)
            "#,
        )
        .bind(pharmacy_id)
        .bind(status)
        .fetch_one(self.pool())
        .await
        .map_err(db_err)?;

        let rows = sqlx::query_as::<_, DbOrder>(
            r#"
            SELECT o.* FROM orders o
            WHERE EXISTS (
                SELECT 1 FROM order_items oi WHERE oi.order_id = o.id AND oi.pharmacy_id = $1
            )
            AND ($2::text IS NULL OR o.status = $2)
            ORDER BY o.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(pharmacy_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        Ok((self.attach_items(rows).await?, total))
    }

    async fn update_status(&self, order_id: Uuid, status: OrderStatus, at: DateTime<Utc>) -> Result<Order> {
        let row = sqlx::query_as::<_, DbOrder>(
            r#"
            UPDATE orders SET status = $2, updated_at = $3
            WHERE id = $1 AND status NOT IN ('delivered', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;

        if let Some(order) = self.single_order(row).await? {
            return Ok(order);
        }
        match OrderStore::find_by_id(self, order_id).await? {
            Some(current) => Err(order_terminal(&current)),
            None => Err(CollexError::not_found(
                codes::ORDER_NOT_FOUND,
                format!("Order {} not found", order_id),
            )),
        }
    }
}
