//! Rating aggregate maintenance, against a real database.

use rust_decimal::Decimal;
use sqlx::PgPool;

use mercantile_api::db::{ProductRepository, ProductSelector, ReviewRepository};
use mercantile_integration_tests::{seed_product, seed_user};

async fn ratings(pool: &PgPool, id: mercantile_core::ProductId) -> (Decimal, i32) {
    let product = ProductRepository::new(pool)
        .get(&ProductSelector::Id(id))
        .await
        .expect("product lookup")
        .expect("product exists");
    (product.ratings_average, product.ratings_count)
}

#[sqlx::test(migrations = "../api/migrations")]
async fn aggregates_follow_review_create_and_delete(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 10).await;
    let reviews = ReviewRepository::new(&pool);

    let eight = reviews
        .create(alice.id, product.id, 8, Some("decent"))
        .await
        .expect("first review");
    reviews
        .create(bob.id, product.id, 10, None)
        .await
        .expect("second review");

    assert_eq!(ratings(&pool, product.id).await, (Decimal::from(9), 2));

    reviews.delete(eight.id, None).await.expect("delete");
    assert_eq!(ratings(&pool, product.id).await, (Decimal::from(10), 1));
}

#[sqlx::test(migrations = "../api/migrations")]
async fn aggregates_follow_review_update(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 10).await;
    let reviews = ReviewRepository::new(&pool);

    let review = reviews
        .create(alice.id, product.id, 4, None)
        .await
        .expect("review");
    assert_eq!(ratings(&pool, product.id).await, (Decimal::from(4), 1));

    reviews
        .update(review.id, Some(alice.id), Some(9), None)
        .await
        .expect("update");
    assert_eq!(ratings(&pool, product.id).await, (Decimal::from(9), 1));
}

#[sqlx::test(migrations = "../api/migrations")]
async fn second_review_of_a_product_is_rejected(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 10).await;
    let reviews = ReviewRepository::new(&pool);

    reviews
        .create(alice.id, product.id, 8, None)
        .await
        .expect("first review");
    let second = reviews.create(alice.id, product.id, 9, None).await;
    assert!(second.is_err(), "one review per user per product");
    assert_eq!(ratings(&pool, product.id).await, (Decimal::from(8), 1));
}

#[sqlx::test(migrations = "../api/migrations")]
async fn admin_can_edit_another_users_review(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;
    let product = seed_product(&pool, "Desk Lamp", Decimal::from(25), 10).await;
    let reviews = ReviewRepository::new(&pool);

    let review = reviews
        .create(alice.id, product.id, 2, Some("spam"))
        .await
        .expect("review");

    // No owner scope: the admin path.
    let edited = reviews
        .update(review.id, None, Some(5), Some("moderated"))
        .await
        .expect("admin edit");
    assert_eq!(edited.rate, 5);
    assert_eq!(ratings(&pool, product.id).await, (Decimal::from(5), 1));
}
