//! Integration tests for the MercadoBoom storefront API.
//!
//! These run against a live server backed by a migrated database:
//!
//! ```bash
//! mb-cli migrate
//! cargo run -p mercadoboom-storefront &
//! cargo test -p mercadoboom-integration-tests -- --ignored
//! ```
//!
//! - `STOREFRONT_URL` - server base URL (default `http://localhost:3000`)
//! - `TEST_ADMIN_EMAIL` / `TEST_ADMIN_PASSWORD` - an admin created with
//!   `mb-cli admin create`; admin tests are skipped without them

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password accepted by the registration rules.
pub const TEST_PASSWORD: &str = "Integration-Test-1";

/// Base URL of the server under test.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client with its own cookie jar, so each context is its own session.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    /// Anonymous context.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: storefront_url(),
        }
    }

    /// Register a fresh customer and keep the session. Returns the user JSON.
    ///
    /// # Panics
    ///
    /// Panics if registration does not return 201.
    pub async fn register(&self) -> Value {
        let email = format!("integration-{}@example.com", Uuid::new_v4());
        let resp = self
            .post(
                "/api/auth/register",
                &json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "first_name": "Integración",
                    "last_name": "Test",
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED, "register {email}");
        json_body(resp).await
    }

    /// Log in with the admin credentials from the environment.
    ///
    /// Returns `None` when they are not configured.
    pub async fn login_admin(&self) -> Option<Value> {
        let email = std::env::var("TEST_ADMIN_EMAIL").ok()?;
        let password = std::env::var("TEST_ADMIN_PASSWORD").ok()?;
        let resp = self
            .post(
                "/api/auth/login",
                &json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK, "admin login");
        Some(json_body(resp).await)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT failed")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE failed")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a JSON response body.
///
/// # Panics
///
/// Panics if the body is not JSON.
#[allow(clippy::expect_used)]
pub async fn json_body(resp: Response) -> Value {
    resp.json().await.expect("Failed to decode JSON body")
}

/// A valid address body.
#[must_use]
pub fn address_body() -> Value {
    json!({
        "recipient": "Integración Test",
        "street": "Av. Corrientes",
        "number": "1234",
        "apartment": "5B",
        "city": "CABA",
        "province": "Buenos Aires",
        "postal_code": "C1043",
        "phone": "+541155550000",
    })
}
