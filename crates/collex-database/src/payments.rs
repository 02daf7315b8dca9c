//! 支付存储的Postgres实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collex_core::store::{PaymentStore, Settlement, SettlementOutcome};
use collex_core::{codes, CartLine, CollexError, Order, Payment, PaymentStatus, Result};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::connection::db_err;
use crate::models::{DbPayment, DbPricedCartLine};
use crate::orders::insert_order;
use crate::PgStore;

fn payment_not_found(id: impl std::fmt::Display) -> CollexError {
    CollexError::not_found(codes::PAYMENT_NOT_FOUND, format!("Payment {} not found", id))
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create_provisional(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, razorpay_order_id, user_id, cart_id, amount, currency, status,
                delivery_address, notes, created_at, updated_at
            )
            VALUES ($1, $2, NULL, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.order_id)
        .bind(payment.user_id)
        .bind(payment.cart_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.delivery_address)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn attach_provider_order(&self, payment_id: Uuid, provider_order_id: &str) -> Result<Payment> {
        let row = sqlx::query_as::<_, DbPayment>(
            r#"
            UPDATE payments SET razorpay_order_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(provider_order_id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?
        .ok_or_else(|| payment_not_found(payment_id))?;

        Payment::try_from(row)
    }

    async fn discard(&self, payment_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM payments WHERE id = $1 AND razorpay_order_id IS NULL")
            .bind(payment_id)
            .execute(self.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        row.map(Payment::try_from).transpose()
    }

    async fn mark_failed(&self, payment_id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<Payment> {
        sqlx::query(
            r#"
            UPDATE payments SET status = 'failed', failure_reason = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(reason)
        .bind(at)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        let row = sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?
            .ok_or_else(|| payment_not_found(payment_id))?;

        Payment::try_from(row)
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettlementOutcome> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        let current = sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(settlement.payment_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| payment_not_found(settlement.payment_id))?;

        if current.status == PaymentStatus::Failed.as_str() {
            return Err(CollexError::invalid(
                codes::PAYMENT_ALREADY_FAILED,
                format!("Payment {} has already failed", current.order_id),
            ));
        }

        // 已成功的支付保持结算时的记录不变
        let payment = if current.status == PaymentStatus::Success.as_str() {
            Payment::try_from(current)?
        } else {
            let row = sqlx::query_as::<_, DbPayment>(
                r#"
                UPDATE payments SET
                    status = 'success',
                    razorpay_payment_id = $2,
                    razorpay_signature = $3,
                    method = COALESCE($4, method),
                    failure_reason = NULL,
                    updated_at = $5
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(settlement.payment_id)
            .bind(&settlement.provider_payment_id)
            .bind(&settlement.provider_signature)
            .bind(&settlement.method)
            .bind(settlement.settled_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            Payment::try_from(row)?
        };

        let mut order = None;
        if let Some(materialize) = &settlement.materialize {
            let already_materialized = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM orders WHERE payment_id = $1)",
            )
            .bind(payment.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            if !already_materialized {
                // 锁住购物车，防止物化过程中被并发修改
                sqlx::query("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                    .bind(materialize.cart_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;

                let lines: Vec<CartLine> = sqlx::query_as::<_, DbPricedCartLine>(
                    r#"
                    SELECT cm.medicine_id, cm.quantity, m.pharmacy_id, m.name, m.price
                    FROM cart_medicines cm
                    JOIN medicines m ON m.id = cm.medicine_id
                    WHERE cm.cart_id = $1
                    ORDER BY cm.created_at ASC, cm.medicine_id ASC
                    "#,
                )
                .bind(materialize.cart_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(CartLine::from)
                .collect();

                if let Some(new_order) =
                    Order::from_cart_lines(&materialize.draft, &payment, &lines, settlement.settled_at)
                {
                    insert_order(&mut tx, &new_order).await?;

                    sqlx::query("DELETE FROM cart_medicines WHERE cart_id = $1")
                        .bind(materialize.cart_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                    sqlx::query("UPDATE carts SET total_amount = $2, updated_at = $3 WHERE id = $1")
                        .bind(materialize.cart_id)
                        .bind(Decimal::ZERO)
                        .bind(settlement.settled_at)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;

                    order = Some(new_order);
                }
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(SettlementOutcome { payment, order })
    }

    async fn provisional_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, DbPayment>(
            r#"
            SELECT * FROM payments
            WHERE razorpay_order_id IS NULL AND status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
