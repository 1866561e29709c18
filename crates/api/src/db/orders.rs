//! Order repository and checkout transaction scripts.
//!
//! Every multi-row operation here runs inside one database transaction:
//! creating an order decrements stock, writes the order and its lines, and
//! clears the cart as a single unit, so a failure partway leaves nothing
//! half-applied. Stock decrements are guarded (`stock >= quantity`) and
//! stock is decremented exactly once, at order creation; cancellation and
//! deletion put it back.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use mercantile_core::{OrderId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::order::{Order, OrderItem, OrderWithItems, ShippingAddress, total_price};

/// Columns that make up the [`Order`] struct.
const ORDER_COLUMNS: &str = "id, user_id, total_price, status, shipping_address, shipping_city, \
     shipping_country, shipping_postal, payment_session_id, paid_at, created_at";

/// Errors from order operations, beyond plain repository failures.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Checkout attempted with an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line asked for more units than are on hand.
    #[error("not enough stock for \"{name}\"")]
    InsufficientStock { product_id: ProductId, name: String },

    /// The requested status change is not a legal lifecycle step.
    #[error("order cannot go from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order is not in a state the caller may cancel.
    #[error("order can no longer be cancelled")]
    NotCancellable,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Payment details carried by a completed checkout session.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    /// Gateway session id. Unique per order; redeliveries are deduplicated
    /// against it.
    pub session_id: String,
    /// Shipping destination collected by the gateway.
    pub shipping: ShippingAddress,
}

/// One cart line joined with the product fields checkout needs.
#[derive(Debug, sqlx::FromRow)]
struct CheckoutLine {
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
    name: String,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn a user's cart into an order.
    ///
    /// With a [`PaymentConfirmation`] the order is created already `paid`
    /// (the webhook path); without one it is created `pending` (the admin
    /// path). In one transaction this locks the products, decrements stock
    /// with a `stock >= quantity` guard, snapshots line prices, writes the
    /// order and its items, and empties the cart.
    ///
    /// Idempotent per session: if an order for the confirmation's session
    /// id already exists, that order is returned and nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` or `OrderError::InsufficientStock`
    /// when the cart can't be fulfilled.
    pub async fn create_from_cart(
        &self,
        user_id: UserId,
        payment: Option<&PaymentConfirmation>,
    ) -> Result<OrderWithItems, OrderError> {
        if let Some(payment) = payment
            && let Some(existing) = self.get_by_session(&payment.session_id).await?
        {
            return Ok(existing);
        }

        let mut tx = self.pool.begin().await?;

        // Lock products in a stable order so concurrent checkouts can't
        // deadlock against each other.
        let lines = sqlx::query_as::<_, CheckoutLine>(
            "SELECT c.product_id, c.quantity, p.price, p.name
             FROM cart_items c
             JOIN products p ON p.id = c.product_id
             WHERE c.user_id = $1
             ORDER BY p.id
             FOR UPDATE OF p",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        for line in &lines {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = now()
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id,
                    name: line.name.clone(),
                });
            }
        }

        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
            })
            .collect();
        let total = total_price(&items);

        let (status, session_id, shipping, paid_at) = match payment {
            Some(payment) => (
                OrderStatus::Paid,
                Some(payment.session_id.as_str()),
                payment.shipping.clone(),
                Some(Utc::now()),
            ),
            None => (OrderStatus::Pending, None, ShippingAddress::default(), None),
        };

        let query = format!(
            "INSERT INTO orders
                 (user_id, total_price, status, shipping_address, shipping_city,
                  shipping_country, shipping_postal, payment_session_id, paid_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Order>(&query)
            .bind(user_id)
            .bind(total)
            .bind(status)
            .bind(&shipping.shipping_address)
            .bind(&shipping.shipping_city)
            .bind(&shipping.shipping_country)
            .bind(&shipping.shipping_postal)
            .bind(session_id)
            .bind(paid_at)
            .fetch_one(&mut *tx)
            .await;

        let order = match inserted {
            Ok(order) => order,
            // Lost a race with a redelivered webhook: the other delivery's
            // order stands, this transaction is abandoned.
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() && payment.is_some() =>
            {
                drop(tx);
                let session_id = payment.map_or("", |p| p.session_id.as_str());
                return self
                    .get_by_session(session_id)
                    .await?
                    .ok_or(OrderError::Repository(RepositoryError::NotFound));
            }
            Err(sqlx::Error::Database(db_err)) => {
                return Err(sqlx::Error::Database(db_err).into());
            }
            Err(err) => return Err(err.into()),
        };

        for item in &items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(OrderWithItems { order, items })
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let Some(order) = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };
        let items = self.items_for(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Get an order with its items, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
        let Some(order) = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };
        let items = self.items_for(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    async fn get_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session_id = $1");
        let Some(order) = sqlx::query_as::<_, Order>(&query)
            .bind(session_id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };
        let items = self.items_for(order.id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    async fn items_for(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT product_id, quantity, price FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let orders = sqlx::query_as::<_, Order>(&query)
            .bind(user_id)
            .bind(limit)
            .bind((page - 1) * limit)
            .fetch_all(self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok((orders, total))
    }

    /// List every order, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE $1::order_status IS NULL OR status = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let orders = sqlx::query_as::<_, Order>(&query)
            .bind(status)
            .bind(limit)
            .bind((page - 1) * limit)
            .fetch_all(self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE $1::order_status IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;
        Ok((orders, total))
    }

    /// Move an order to a new lifecycle status (admin).
    ///
    /// Moving to `cancelled` restores the ordered stock; moving to `paid`
    /// stamps `paid_at`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` when the step is not legal,
    /// `RepositoryError::NotFound` when the order doesn't exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderError::Repository(RepositoryError::NotFound))?;

        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            });
        }

        if new_status == OrderStatus::Cancelled {
            restore_stock(&mut tx, id).await?;
        }

        let query = format!(
            "UPDATE orders
             SET status = $2,
                 paid_at = CASE WHEN $2 = 'paid'::order_status THEN now() ELSE paid_at END
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(new_status)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Cancel an order, restoring stock.
    ///
    /// With `owner` set the cancel is scoped to that user's orders; `None`
    /// skips the ownership check (admin). Only `pending` and `paid` orders
    /// can be cancelled.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotCancellable` for shipped, delivered, or
    /// already-cancelled orders, `RepositoryError::NotFound` when no
    /// matching order exists.
    pub async fn cancel(&self, id: OrderId, owner: Option<UserId>) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)
             FOR UPDATE"
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderError::Repository(RepositoryError::NotFound))?;

        if !order.status.is_cancellable() {
            return Err(OrderError::NotCancellable);
        }

        restore_stock(&mut tx, id).await?;

        let query = format!(
            "UPDATE orders SET status = 'cancelled' WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let cancelled = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(cancelled)
    }

    /// Delete an order (admin), restoring stock unless it was already
    /// cancelled (cancellation restored it once; restoring again would
    /// double-count).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when the order doesn't exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let status = status.ok_or(OrderError::Repository(RepositoryError::NotFound))?;

        if status != OrderStatus::Cancelled {
            restore_stock(&mut tx, id).await?;
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Put an order's line quantities back into product stock.
async fn restore_stock(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products p
         SET stock = p.stock + i.quantity, updated_at = now()
         FROM order_items i
         WHERE i.order_id = $1 AND p.id = i.product_id",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
