//! 购物车存储的Postgres实现

use async_trait::async_trait;
use chrono::Utc;
use collex_core::store::CartStore;
use collex_core::{codes, Cart, CartItem, CollexError, Result};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::connection::db_err;
use crate::models::{DbCart, DbCartMedicine};
use crate::PgStore;

fn cart_not_found() -> CollexError {
    CollexError::not_found(codes::CART_NOT_FOUND, "Cart not found")
}

fn item_not_in_cart(medicine_id: Uuid) -> CollexError {
    CollexError::not_found(
        codes::ITEM_NOT_IN_CART,
        format!("Medicine {} is not in the cart", medicine_id),
    )
}

impl PgStore {
    async fn load_cart(&self, row: Option<DbCart>) -> Result<Option<Cart>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, DbCartMedicine>(
            r#"
            SELECT medicine_id, quantity FROM cart_medicines
            WHERE cart_id = $1
            ORDER BY created_at ASC, medicine_id ASC
            "#,
        )
        .bind(row.id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?
        .into_iter()
        .map(CartItem::from)
        .collect();

        Ok(Some(row.into_cart(items)))
    }

    async fn cart_id_for(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)
    }

    async fn require_cart(&self, user_id: Uuid) -> Result<Cart> {
        self.get(user_id).await?.ok_or_else(cart_not_found)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn find_by_id(&self, cart_id: Uuid) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, DbCart>("SELECT * FROM carts WHERE id = $1")
            .bind(cart_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        self.load_cart(row).await
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, DbCart>("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        self.load_cart(row).await
    }

    async fn add(&self, user_id: Uuid, medicine_id: Uuid, delta: i32) -> Result<Cart> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        let cart_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO carts (id, user_id, total_amount, updated_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO cart_medicines (cart_id, medicine_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, medicine_id)
            DO UPDATE SET quantity = cart_medicines.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(cart_id)
        .bind(medicine_id)
        .bind(delta)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        self.require_cart(user_id).await
    }

    async fn set_quantity(&self, user_id: Uuid, medicine_id: Uuid, quantity: i32) -> Result<Cart> {
        let cart_id = self.cart_id_for(user_id).await?.ok_or_else(cart_not_found)?;

        let result = if quantity == 0 {
            sqlx::query("DELETE FROM cart_medicines WHERE cart_id = $1 AND medicine_id = $2")
                .bind(cart_id)
                .bind(medicine_id)
                .execute(self.pool())
                .await
                .map_err(db_err)?
        } else {
            sqlx::query(
                "UPDATE cart_medicines SET quantity = $3 WHERE cart_id = $1 AND medicine_id = $2",
            )
            .bind(cart_id)
            .bind(medicine_id)
            .bind(quantity)
            .execute(self.pool())
            .await
            .map_err(db_err)?
        };

        if result.rows_affected() == 0 {
            return Err(item_not_in_cart(medicine_id));
        }
        self.require_cart(user_id).await
    }

    async fn remove(&self, user_id: Uuid, medicine_id: Uuid) -> Result<Cart> {
        let cart_id = self.cart_id_for(user_id).await?.ok_or_else(cart_not_found)?;

        let result = sqlx::query("DELETE FROM cart_medicines WHERE cart_id = $1 AND medicine_id = $2")
            .bind(cart_id)
            .bind(medicine_id)
            .execute(self.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(item_not_in_cart(medicine_id));
        }
        self.require_cart(user_id).await
    }

    async fn clear(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let Some(cart_id) = self.cart_id_for(user_id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool().begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM cart_medicines WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("UPDATE carts SET total_amount = $2, updated_at = $3 WHERE id = $1")
            .bind(cart_id)
            .bind(Decimal::ZERO)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        self.get(user_id).await
    }

    async fn save_total(&self, cart_id: Uuid, total: Decimal) -> Result<()> {
        sqlx::query("UPDATE carts SET total_amount = $2 WHERE id = $1")
            .bind(cart_id)
            .bind(total)
            .execute(self.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
