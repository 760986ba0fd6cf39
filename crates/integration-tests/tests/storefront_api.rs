//! End-to-end tests for the storefront API.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`mb-cli migrate`)
//! - The storefront server running (`cargo run -p mercadoboom-storefront`)
//! - For the checkout flow, an admin account in `TEST_ADMIN_EMAIL` /
//!   `TEST_ADMIN_PASSWORD`
//!
//! Run with: cargo test -p mercadoboom-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use mercadoboom_integration_tests::{TEST_PASSWORD, TestContext, address_body, json_body};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

// ============================================================================
// Health & Public
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let resp = ctx.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = ctx.get("/health/ready").await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_public_catalog() {
    let ctx = TestContext::new();

    let resp = ctx.get("/api/products?limit=5&sort=price_asc").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;
    assert!(page["items"].is_array());
    assert_eq!(page["limit"], 5);

    let resp = ctx.get("/api/categories").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx.get("/api/payments/config").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx.get("/api/products/2147483647").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_me_logout() {
    let ctx = TestContext::new();
    let user = ctx.register().await;
    assert_eq!(user["is_admin"], false);

    let resp = ctx.get("/api/auth/me").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["email"], user["email"]);

    let resp = ctx.post("/api/auth/logout", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ctx.get("/api/auth/me").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_duplicate_registration_and_bad_login() {
    let ctx = TestContext::new();
    let user = ctx.register().await;
    let email = user["email"].as_str().unwrap();

    let other = TestContext::new();
    let resp = other
        .post(
            "/api/auth/register",
            &json!({
                "email": email,
                "password": TEST_PASSWORD,
                "first_name": "Otra",
                "last_name": "Persona",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = other
        .post(
            "/api/auth/login",
            &json!({ "email": email, "password": "not-the-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = other
        .post(
            "/api/auth/login",
            &json!({ "email": email, "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["user"]["email"], email);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_anonymous_requests_are_rejected() {
    let ctx = TestContext::new();
    for path in [
        "/api/cart",
        "/api/orders",
        "/api/addresses",
        "/api/tickets",
        "/api/account/profile",
        "/api/admin/dashboard",
    ] {
        let resp = ctx.get(path).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_customers_cannot_reach_admin() {
    let ctx = TestContext::new();
    ctx.register().await;

    let resp = ctx.get("/api/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = ctx
        .put(
            "/api/admin/settings/payment",
            &json!({ "mercadopago_enabled": false, "transfer_enabled": true }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Addresses
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_address_lifecycle() {
    let ctx = TestContext::new();
    ctx.register().await;

    let resp = ctx.post("/api/addresses", &address_body()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first = json_body(resp).await;

    let resp = ctx.post("/api/addresses", &address_body()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let second = json_body(resp).await;

    let resp = ctx
        .put(&format!("/api/addresses/{}/default", second["id"]), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx.get("/api/addresses").await;
    let addresses: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(addresses.len(), 2);
    let defaults: Vec<_> = addresses
        .iter()
        .filter(|a| a["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], second["id"]);

    let resp = ctx.delete(&format!("/api/addresses/{}", first["id"])).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ctx.get(&format!("/api/addresses/{}", first["id"])).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let mut invalid = address_body();
    invalid["street"] = json!("  ");
    let resp = ctx.post("/api/addresses", &invalid).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_addresses_are_private() {
    let owner = TestContext::new();
    owner.register().await;
    let resp = owner.post("/api/addresses", &address_body()).await;
    let address = json_body(resp).await;

    let stranger = TestContext::new();
    stranger.register().await;
    let resp = stranger
        .get(&format!("/api/addresses/{}", address["id"]))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_rejects_unknown_product() {
    let ctx = TestContext::new();
    ctx.register().await;

    let resp = ctx.get("/api/cart").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cart = json_body(resp).await;
    assert_eq!(cart["item_count"], 0);

    let resp = ctx
        .post(
            "/api/cart/items",
            &json!({ "product_id": 2_147_483_647, "quantity": 1 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx
        .post("/api/cart/items", &json!({ "product_id": 1, "quantity": 0 }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Support tickets
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_ticket_lifecycle() {
    let ctx = TestContext::new();
    ctx.register().await;

    let resp = ctx
        .post(
            "/api/tickets",
            &json!({ "subject": "¿Cuándo llega mi pedido?", "message": "Hola, compré ayer." }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let thread = json_body(resp).await;
    let id = &thread["id"];

    let resp = ctx
        .post(
            &format!("/api/tickets/{id}/messages"),
            &json!({ "message": "Sigo esperando." }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = ctx.get(&format!("/api/tickets/{id}")).await;
    let thread = json_body(resp).await;
    assert_eq!(thread["messages"].as_array().unwrap().len(), 2);

    let resp = ctx
        .post(&format!("/api/tickets/{id}/close"), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .post(
            &format!("/api/tickets/{id}/messages"),
            &json!({ "message": "¿Hola?" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .post(
            "/api/tickets",
            &json!({ "subject": "Pedido ajeno", "message": "x", "order_id": 2_147_483_647 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Direct transfer checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server, database and admin credentials"]
async fn test_direct_transfer_checkout() {
    let admin = TestContext::new();
    if admin.login_admin().await.is_none() {
        return; // Skip without admin credentials
    }

    let resp = admin
        .put(
            "/api/admin/settings/payment",
            &json!({
                "mercadopago_enabled": true,
                "transfer_enabled": true,
                "bank_name": "Banco de Prueba",
                "alias": "MERCADO.BOOM.TEST",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = admin
        .post(
            "/api/admin/products",
            &json!({
                "name": format!("Producto integración {}", Uuid::new_v4()),
                "price": "1000.00",
                "stock": 5,
                "shipping_cost": "500.00",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product = json_body(resp).await;
    let product_id = product["id"].clone();

    let customer = TestContext::new();
    customer.register().await;
    let address = json_body(customer.post("/api/addresses", &address_body()).await).await;

    let resp = customer
        .post(
            "/api/cart/items",
            &json!({ "product_id": product_id, "quantity": 6 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "more than stock");

    let resp = customer
        .post(
            "/api/cart/items",
            &json!({ "product_id": product_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = customer
        .post(
            "/api/payments/create-direct-transfer",
            &json!({ "address_id": address["id"] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let checkout = json_body(resp).await;
    let orders = checkout["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "PENDIENTE");
    assert_eq!(orders[0]["payment_type"], "direct_transfer");
    assert_eq!(checkout["bank_details"]["alias"], "MERCADO.BOOM.TEST");
    let order_id = orders[0]["id"].clone();

    let cart = json_body(customer.get("/api/cart").await).await;
    assert_eq!(cart["item_count"], 0, "checkout empties the cart");

    let resp = admin
        .post(
            &format!("/api/admin/orders/{order_id}/verify-transfer"),
            &json!({ "approved": true }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order = json_body(resp).await;
    assert_eq!(order["status"], "PAGADO");
    assert_eq!(order["payment_status"], "approved");
    assert_eq!(order["stock_applied"], true);

    let product = json_body(admin.get(&format!("/api/admin/products/{product_id}")).await).await;
    assert_eq!(product["stock"], 3);

    let resp = customer
        .post(&format!("/api/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "paid orders are final for buyers");
}

// ============================================================================
// Blocked accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server, database and admin credentials"]
async fn test_blocked_user_is_locked_out() {
    let admin = TestContext::new();
    if admin.login_admin().await.is_none() {
        return; // Skip without admin credentials
    }

    let customer = TestContext::new();
    let user = customer.register().await;
    assert_eq!(customer.get("/api/cart").await.status(), StatusCode::OK);

    let resp = admin
        .put(
            &format!("/api/admin/users/{}/blocked", user["id"]),
            &json!({ "blocked": true }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["is_blocked"], true);

    // The session from before the block no longer works.
    let resp = customer.get("/api/cart").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let fresh = TestContext::new();
    let resp = fresh
        .post(
            "/api/auth/login",
            &json!({ "email": user["email"], "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(fresh.get("/api/auth/me").await.status(), StatusCode::UNAUTHORIZED);

    // A wrong password still reads as bad credentials, not as blocked.
    let resp = fresh
        .post(
            "/api/auth/login",
            &json!({ "email": user["email"], "password": "not-the-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = admin
        .put(
            &format!("/api/admin/users/{}/blocked", user["id"]),
            &json!({ "blocked": false }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = fresh
        .post(
            "/api/auth/login",
            &json!({ "email": user["email"], "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
