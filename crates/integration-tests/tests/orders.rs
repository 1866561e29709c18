//! Stock accounting across the order lifecycle, against a real database.
//!
//! Stock is decremented exactly once, at order creation, and restored
//! exactly once, on cancellation or on deleting a non-cancelled order.

use rust_decimal::Decimal;
use sqlx::PgPool;

use mercantile_core::OrderStatus;

use mercantile_api::db::{CartRepository, OrderError, OrderRepository};
use mercantile_integration_tests::{seed_product, seed_user, stock_of};

#[sqlx::test(migrations = "../api/migrations")]
async fn checkout_decrements_stock_and_empties_the_cart(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 5).await;
    let cart = CartRepository::new(&pool);
    cart.upsert(user.id, product.id, 3).await.expect("add");

    let order = OrderRepository::new(&pool)
        .create_from_cart(user.id, None)
        .await
        .expect("checkout");

    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.total_price, Decimal::from(75));
    assert_eq!(stock_of(&pool, &product).await, 2);
    assert!(cart.list(user.id).await.expect("listing").is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
async fn checkout_rejects_when_stock_is_short(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 2).await;
    CartRepository::new(&pool)
        .upsert(user.id, product.id, 3)
        .await
        .expect("add");

    let result = OrderRepository::new(&pool)
        .create_from_cart(user.id, None)
        .await;

    assert!(matches!(
        result,
        Err(OrderError::InsufficientStock { product_id, .. }) if product_id == product.id
    ));
    assert_eq!(
        stock_of(&pool, &product).await,
        2,
        "a failed checkout must leave stock untouched"
    );
}

#[sqlx::test(migrations = "../api/migrations")]
async fn cancelling_a_pending_order_restores_stock_once(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 5).await;
    CartRepository::new(&pool)
        .upsert(user.id, product.id, 3)
        .await
        .expect("add");
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create_from_cart(user.id, None)
        .await
        .expect("checkout");
    assert_eq!(stock_of(&pool, &product).await, 2);

    let cancelled = orders
        .cancel(order.order.id, Some(user.id))
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&pool, &product).await, 5);

    let again = orders.cancel(order.order.id, Some(user.id)).await;
    assert!(matches!(again, Err(OrderError::NotCancellable)));
    assert_eq!(
        stock_of(&pool, &product).await,
        5,
        "a second cancel must not restore stock again"
    );
}

#[sqlx::test(migrations = "../api/migrations")]
async fn admin_can_cancel_another_users_order(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 5).await;
    CartRepository::new(&pool)
        .upsert(user.id, product.id, 1)
        .await
        .expect("add");
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create_from_cart(user.id, None)
        .await
        .expect("checkout");

    // No owner scope: the admin path.
    let cancelled = orders.cancel(order.order.id, None).await.expect("cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&pool, &product).await, 5);
}

#[sqlx::test(migrations = "../api/migrations")]
async fn cancelling_a_shipped_order_changes_nothing(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 5).await;
    CartRepository::new(&pool)
        .upsert(user.id, product.id, 3)
        .await
        .expect("add");
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create_from_cart(user.id, None)
        .await
        .expect("checkout");
    orders
        .update_status(order.order.id, OrderStatus::Paid)
        .await
        .expect("to paid");
    orders
        .update_status(order.order.id, OrderStatus::Shipped)
        .await
        .expect("to shipped");

    let result = orders.cancel(order.order.id, Some(user.id)).await;
    assert!(matches!(result, Err(OrderError::NotCancellable)));
    assert_eq!(stock_of(&pool, &product).await, 2);
}

#[sqlx::test(migrations = "../api/migrations")]
async fn deleting_a_pending_order_restores_stock(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 5).await;
    CartRepository::new(&pool)
        .upsert(user.id, product.id, 3)
        .await
        .expect("add");
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create_from_cart(user.id, None)
        .await
        .expect("checkout");

    orders.delete(order.order.id).await.expect("delete");
    assert_eq!(stock_of(&pool, &product).await, 5);
}

#[sqlx::test(migrations = "../api/migrations")]
async fn deleting_a_cancelled_order_does_not_restore_again(pool: PgPool) {
    let user = seed_user(&pool, "buyer@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 5).await;
    CartRepository::new(&pool)
        .upsert(user.id, product.id, 3)
        .await
        .expect("add");
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create_from_cart(user.id, None)
        .await
        .expect("checkout");
    orders
        .cancel(order.order.id, Some(user.id))
        .await
        .expect("cancel");
    assert_eq!(stock_of(&pool, &product).await, 5);

    orders.delete(order.order.id).await.expect("delete");
    assert_eq!(
        stock_of(&pool, &product).await,
        5,
        "cancellation already restored this stock"
    );
}
