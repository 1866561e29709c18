//! Cart upsert semantics against a real database.

use rust_decimal::Decimal;
use sqlx::PgPool;

use mercantile_api::db::CartRepository;
use mercantile_integration_tests::{seed_product, seed_user};

#[sqlx::test(migrations = "../api/migrations")]
async fn readding_a_product_keeps_one_row_with_latest_quantity(pool: PgPool) {
    let user = seed_user(&pool, "shopper@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 10).await;
    let cart = CartRepository::new(&pool);

    cart.upsert(user.id, product.id, 2).await.expect("first add");
    cart.upsert(user.id, product.id, 5)
        .await
        .expect("second add");

    let items = cart.list(user.id).await.expect("cart listing");
    assert_eq!(items.len(), 1, "re-adding must not create a second row");
    assert_eq!(items[0].quantity, 5, "the latest quantity wins");
}

#[sqlx::test(migrations = "../api/migrations")]
async fn carts_are_scoped_per_user(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 10).await;
    let cart = CartRepository::new(&pool);

    cart.upsert(alice.id, product.id, 1).await.expect("add");
    cart.upsert(bob.id, product.id, 4).await.expect("add");
    cart.clear(alice.id).await.expect("clear");

    assert!(cart.list(alice.id).await.expect("listing").is_empty());
    let bobs = cart.list(bob.id).await.expect("listing");
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].quantity, 4);
}
