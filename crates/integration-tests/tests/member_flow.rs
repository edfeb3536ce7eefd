//! End-to-end member flow against `PostgreSQL`.
//!
//! These tests require a scratch database at `TEST_DATABASE_URL`.
//! Migrations are applied on first use.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use secrecy::ExposeSecret;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use la_red_core::{ProductId, Tokens};
use la_red_integration_tests::{TestApp, database_url};
use la_red_storefront::db::ProductRepository;
use la_red_storefront::db::products::ProductUpsert;

async fn migrated_pool() -> PgPool {
    let pool = PgPool::connect(database_url().expose_secret())
        .await
        .unwrap();
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .unwrap();
    pool
}

async fn seed_product(pool: &PgPool, price: i64) -> ProductId {
    let product = ProductRepository::new(pool)
        .upsert(&ProductUpsert {
            id: None,
            name: format!("Camiseta {}", Uuid::new_v4()),
            description: None,
            price_tokens: Tokens::new(price),
            image: None,
            category: "ropa".to_string(),
            active: true,
        })
        .await
        .unwrap();
    product.id
}

fn unique_email() -> String {
    format!("fan-{}@laredmafia.com", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "Requires PostgreSQL at TEST_DATABASE_URL"]
async fn test_guest_to_member_checkout() {
    let pool = migrated_pool().await;
    let product_id = seed_product(&pool, 40).await;
    let mut app = TestApp::with_pool(pool);

    // Guest fills a cart.
    for _ in 0..2 {
        let resp = app
            .post("/api/cart/items", json!({ "product_id": product_id }))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }
    let resp = app.get("/api/cart").await;
    assert_eq!(resp.body["store"], "guest");
    assert_eq!(resp.body["count"], 2);
    assert_eq!(resp.body["total"], 80);

    // Registering provisions the account but does not merge.
    let email = unique_email();
    let resp = app
        .post(
            "/api/auth/register",
            json!({ "email": email, "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["user"]["email"], email);
    assert_eq!(resp.body["balance"], 100);
    assert_eq!(
        resp.body["profile"]["username"],
        email.split('@').next().unwrap()
    );

    let resp = app.get("/api/cart").await;
    assert_eq!(resp.body["store"], "member");
    assert_eq!(resp.body["count"], 0);

    let resp = app.post("/api/cart/merge-guest", json!({})).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["report"]["lines_added"], 1);
    assert_eq!(resp.body["cart"]["count"], 2);

    // 80 of 100 tokens.
    let resp = app.post("/api/checkout", json!({})).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["total_tokens"], 80);
    assert_eq!(resp.body["status"], "paid");

    let resp = app.get("/api/account").await;
    assert_eq!(resp.body["balance"], 20);
    assert_eq!(app.get("/api/cart").await.body["count"], 0);

    // 40 with 20 left.
    app.post("/api/cart/items", json!({ "product_id": product_id }))
        .await;
    let resp = app.post("/api/checkout", json!({})).await;
    assert_eq!(resp.status, StatusCode::PAYMENT_REQUIRED);

    let resp = app.get("/api/account/orders").await;
    assert_eq!(resp.body.as_array().unwrap().len(), 1);

    // Signing out drops back to the (now empty) guest cart.
    let resp = app.post("/api/auth/logout", json!({})).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    let resp = app.get("/api/cart").await;
    assert_eq!(resp.body["store"], "guest");
    assert_eq!(resp.body["count"], 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL at TEST_DATABASE_URL"]
async fn test_login_wrong_password_and_settings() {
    let pool = migrated_pool().await;
    let mut app = TestApp::with_pool(pool);
    let email = unique_email();

    let resp = app
        .post(
            "/api/auth/register",
            json!({ "email": email, "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post(
            "/api/auth/register",
            json!({ "email": email, "password": "another password" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    app.post("/api/auth/logout", json!({})).await;
    app.forget_session();

    let resp = app
        .post(
            "/api/auth/login",
            json!({ "email": email, "password": "wrong password" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post(
            "/api/auth/login",
            json!({ "email": email, "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["settings"]["theme"], "dark");

    let resp = app
        .patch("/api/account/settings", json!({ "theme": "light" }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["theme"], "light");
    assert_eq!(resp.body["language"], "es");

    let resp = app.get("/api/account").await;
    assert_eq!(resp.body["settings"]["theme"], "light");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL at TEST_DATABASE_URL"]
async fn test_address_book() {
    let pool = migrated_pool().await;
    let mut app = TestApp::with_pool(pool);

    app.post(
        "/api/auth/register",
        json!({ "email": unique_email(), "password": "correct horse battery" }),
    )
    .await;

    let address = json!({
        "full_name": "Ana Torres",
        "line1": "Av. Reforma 100",
        "city": "CDMX",
        "region": "CDMX",
        "postal_code": "06600",
        "country": "MX",
        "is_default": true,
    });
    let resp = app.post("/api/account/addresses", address.clone()).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let id = resp.body["id"].as_str().unwrap().to_string();

    let mut blank = address;
    blank["city"] = json!("  ");
    let resp = app.post("/api/account/addresses", blank).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], "Bad request: city is required");

    let resp = app.get("/api/account/addresses").await;
    assert_eq!(resp.body.as_array().unwrap().len(), 1);

    // Checkout to an address that is not ours.
    let resp = app
        .post(
            "/api/checkout",
            json!({ "address_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app.delete(&format!("/api/account/addresses/{id}")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    let resp = app.delete(&format!("/api/account/addresses/{id}")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
