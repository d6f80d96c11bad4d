//! Router-level API tests with doubled-out collaborators.
//!
//! Each test drives the real router (sessions, handlers, state machines)
//! through `tower::ServiceExt::oneshot`, with the catalog, gateway, and
//! identity provider replaced by in-process fakes.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use diya_core::{GatewayOrderId, Money, PhoneNumber, ProductId, ReceiptRef, ShippingPolicy, Uid};
use diya_storefront::config::{FirebaseConfig, RazorpayConfig, StorefrontConfig};
use diya_storefront::services::catalog::{CatalogError, Product, ProductCatalog};
use diya_storefront::services::identity::{
    ChallengeHandle, Identity, IdentityError, IdentityProvider, MemoryProfileRepository,
};
use diya_storefront::services::payment::{
    ContactPrefill, GatewayError, GatewayOrder, PaymentCallback, PaymentGateway,
};
use diya_storefront::state::AppState;

// =============================================================================
// Fakes
// =============================================================================

struct FakeCatalog {
    products: HashMap<ProductId, Product>,
}

impl FakeCatalog {
    fn seeded() -> Self {
        let mut products = HashMap::new();
        for product in [
            Product {
                id: ProductId::new("rudraksha-mala-108"),
                name: "Rudraksha Mala (108 beads)".to_owned(),
                category: "Malas".to_owned(),
                price: Decimal::from(2999),
                original_price: Some(Decimal::from(3499)),
                tax_rate_percent: Decimal::from(5),
                stock: Some(10),
                image: None,
            },
            Product {
                id: ProductId::new("brass-diya"),
                name: "Brass Diya".to_owned(),
                category: "Lamps".to_owned(),
                price: Decimal::from(249),
                original_price: None,
                tax_rate_percent: Decimal::from(12),
                stock: None,
                image: None,
            },
        ] {
            products.insert(product.id.clone(), product);
        }
        Self { products }
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.products.get(id).cloned())
    }
}

#[derive(Default)]
struct FakeGateway {
    orders_created: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        amount: Money,
        receipt: &ReceiptRef,
        _prefill: &ContactPrefill,
    ) -> Result<GatewayOrder, GatewayError> {
        let n = self.orders_created.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            order_id: GatewayOrderId::new(format!("order_{n}")),
            amount,
            receipt: receipt.clone(),
        })
    }

    fn verify_signature(&self, callback: &PaymentCallback) -> bool {
        callback.signature == "valid"
    }
}

#[derive(Default)]
struct FakeProvider {
    challenges_issued: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn issue_challenge(
        &self,
        _phone: &PhoneNumber,
        _bot_token: &str,
    ) -> Result<ChallengeHandle, IdentityError> {
        let n = self.challenges_issued.fetch_add(1, Ordering::SeqCst);
        Ok(ChallengeHandle::new(format!("challenge_{n}")))
    }

    async fn confirm_challenge(
        &self,
        _handle: &ChallengeHandle,
        code: &str,
    ) -> Result<Identity, IdentityError> {
        if code != "123456" {
            return Err(IdentityError::InvalidCode);
        }
        Ok(Identity {
            uid: Uid::new("uid-1"),
            phone: PhoneNumber::parse("9876543210").unwrap(),
            email: None,
        })
    }
}

// =============================================================================
// Harness
// =============================================================================

fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        host: "127.0.0.1".parse::<IpAddr>().unwrap(),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        razorpay: RazorpayConfig {
            base_url: "https://api.razorpay.com".to_owned(),
            key_id: "rzp_test_key".to_owned(),
            key_secret: SecretString::from("k7Jq2xPv9wL4mN8rT3yB6cD1"),
        },
        firebase: FirebaseConfig {
            base_url: "https://identitytoolkit.googleapis.com".to_owned(),
            api_key: SecretString::from("AIzaFakeKey123"),
        },
        catalog_base_url: "http://localhost:4000".to_owned(),
        shipping: ShippingPolicy::default(),
        otp_resend_cooldown: Duration::from_secs(60),
        sentry_dsn: None,
        sentry_environment: "test".to_owned(),
    }
}

/// A router plus the session cookie captured from the first response.
struct TestApp {
    router: Router,
    cookie: Option<String>,
}

impl TestApp {
    fn new() -> Self {
        let state = AppState::with_collaborators(
            test_config(),
            Arc::new(FakeCatalog::seeded()),
            Arc::new(FakeGateway::default()),
            Arc::new(FakeProvider::default()),
            Arc::new(MemoryProfileRepository::new()),
        );
        Self {
            router: diya_storefront::app(state),
            cookie: None,
        }
    }

    async fn request(
        &mut self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie.clone());
        }
        let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
        let request = builder.body(body).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        // Keep the session cookie for subsequent requests.
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_owned();
            self.cookie = Some(pair);
        }

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }
}

fn address_body() -> Value {
    json!({
        "fullName": "Asha Rao",
        "phone": "9876543210",
        "email": "asha@example.com",
        "address": "14 Temple Street",
        "city": "Mysuru",
        "state": "Karnataka",
        "pincode": "570001"
    })
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn cart_totals_follow_the_ledger() {
    let mut app = TestApp::new();

    let (status, cart) = app
        .post("/cart/items", json!({ "productId": "rudraksha-mala-108" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["itemCount"], 1);
    assert_eq!(cart["subtotal"], "2999");
    assert_eq!(cart["totalTax"], "149.95");
    assert_eq!(cart["shipping"], "0");
    assert_eq!(cart["grandTotal"], "3148.95");
    assert_eq!(cart["cgst"], cart["sgst"]);
    assert_eq!(cart["igst"], "0");

    // Same product again merges into the existing line.
    let (_, cart) = app
        .post(
            "/cart/items",
            json!({ "productId": "rudraksha-mala-108", "quantity": 2 }),
        )
        .await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart["itemCount"], 3);

    let (_, count) = app.get("/cart/count").await;
    assert_eq!(count["itemCount"], 3);
}

#[tokio::test]
async fn cheap_cart_pays_flat_shipping() {
    let mut app = TestApp::new();

    let (_, cart) = app
        .post("/cart/items", json!({ "productId": "brass-diya" }))
        .await;
    assert_eq!(cart["subtotal"], "249");
    assert_eq!(cart["shipping"], "50");
    // 249 + 29.88 GST + 50 shipping
    assert_eq!(cart["grandTotal"], "328.88");
}

#[tokio::test]
async fn unknown_product_is_ignored() {
    let mut app = TestApp::new();

    let (status, cart) = app
        .post("/cart/items", json!({ "productId": "no-such-product" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["itemCount"], 0);
    assert!(cart["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn update_to_zero_removes_the_line() {
    let mut app = TestApp::new();

    let (_, cart) = app
        .post("/cart/items", json!({ "productId": "brass-diya", "quantity": 3 }))
        .await;
    let line_id = cart["lines"][0]["id"].clone();

    let (_, cart) = app
        .post("/cart/update", json!({ "lineId": line_id, "quantity": 0 }))
        .await;
    assert_eq!(cart["itemCount"], 0);
    assert_eq!(cart["grandTotal"], "50");
}

#[tokio::test]
async fn oversized_quantities_saturate_instead_of_overflowing() {
    let mut app = TestApp::new();

    app.post(
        "/cart/items",
        json!({ "productId": "rudraksha-mala-108", "quantity": u32::MAX }),
    )
    .await;
    let (status, cart) = app
        .post(
            "/cart/items",
            json!({ "productId": "rudraksha-mala-108", "quantity": 1 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"][0]["quantity"], u32::MAX);
    assert_eq!(cart["itemCount"], u32::MAX);
}

#[tokio::test]
async fn sessions_do_not_share_carts() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "brass-diya" }))
        .await;

    // A request without the cookie starts a fresh session.
    app.cookie = None;
    let (_, cart) = app.get("/cart").await;
    assert_eq!(cart["itemCount"], 0);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn blank_address_fields_are_reported() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "brass-diya" }))
        .await;

    let mut body = address_body();
    body["city"] = json!("  ");
    body["pincode"] = json!("");

    let (status, error) = app.post("/checkout/address", body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["missingFields"], json!(["city", "pincode"]));

    // Cart stays editable.
    let (_, cart) = app.get("/cart").await;
    assert_eq!(cart["locked"], false);
}

#[tokio::test]
async fn empty_cart_cannot_enter_checkout() {
    let mut app = TestApp::new();

    let (status, _) = app.post("/checkout/address", address_body()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn payment_amount_is_snapshotted_and_cart_frozen() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "rudraksha-mala-108" }))
        .await;

    let (status, view) = app.post("/checkout/address", address_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "awaitingPayment");
    assert_eq!(view["amountDue"], "3148.95");

    // Mutations while frozen are no-ops.
    let (_, cart) = app
        .post("/cart/items", json!({ "productId": "brass-diya" }))
        .await;
    assert_eq!(cart["itemCount"], 1);
    assert_eq!(cart["locked"], true);

    let (status, order) = app.post("/checkout/pay", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["amount"], 314_895);
    assert_eq!(order["currency"], "INR");
    assert_eq!(order["keyId"], "rzp_test_key");
    assert!(order["receipt"].as_str().unwrap().starts_with("order_"));
}

#[tokio::test]
async fn happy_path_confirms_order_and_clears_cart() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "rudraksha-mala-108" }))
        .await;
    app.post("/checkout/address", address_body()).await;
    let (_, order) = app.post("/checkout/pay", json!({})).await;

    let (status, view) = app
        .post(
            "/checkout/callback",
            json!({
                "order_id": order["orderId"],
                "payment_id": "pay_1",
                "signature": "valid"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "confirmed");
    assert_eq!(view["amount"], "3148.95");
    assert!(view["estimatedDelivery"].is_string());

    let (_, cart) = app.get("/cart").await;
    assert_eq!(cart["itemCount"], 0);
    assert_eq!(cart["locked"], false);
}

#[tokio::test]
async fn forged_signature_is_rejected_and_retry_works() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "rudraksha-mala-108" }))
        .await;
    app.post("/checkout/address", address_body()).await;
    let (_, first_order) = app.post("/checkout/pay", json!({})).await;

    let (status, _) = app
        .post(
            "/checkout/callback",
            json!({
                "order_id": first_order["orderId"],
                "payment_id": "pay_1",
                "signature": "forged"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Cart is intact and still frozen; a fresh attempt succeeds.
    let (_, cart) = app.get("/cart").await;
    assert_eq!(cart["itemCount"], 1);
    assert_eq!(cart["locked"], true);

    let (_, second_order) = app.post("/checkout/pay", json!({})).await;
    assert_ne!(second_order["orderId"], first_order["orderId"]);

    let (status, view) = app
        .post(
            "/checkout/callback",
            json!({
                "order_id": second_order["orderId"],
                "payment_id": "pay_2",
                "signature": "valid"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "confirmed");
}

#[tokio::test]
async fn failed_attempt_keeps_checkout_retryable() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "brass-diya" }))
        .await;
    app.post("/checkout/address", address_body()).await;
    let (_, order) = app.post("/checkout/pay", json!({})).await;

    let (status, view) = app
        .post("/checkout/failed", json!({ "orderId": order["orderId"] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "awaitingPayment");
    assert_eq!(view["paymentPending"], false);

    // A late callback for the failed attempt cannot confirm.
    let (status, _) = app
        .post(
            "/checkout/callback",
            json!({
                "order_id": order["orderId"],
                "payment_id": "pay_1",
                "signature": "valid"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stepping_back_unlocks_cart_and_keeps_draft() {
    let mut app = TestApp::new();
    app.post("/cart/items", json!({ "productId": "brass-diya" }))
        .await;
    app.post("/checkout/address", address_body()).await;

    let (status, view) = app.post("/checkout/back", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "collectingAddress");
    assert_eq!(view["draft"]["fullName"], "Asha Rao");

    let (_, cart) = app.get("/cart").await;
    assert_eq!(cart["locked"], false);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn short_phone_number_is_rejected() {
    let mut app = TestApp::new();

    let (status, _) = app
        .post(
            "/auth/phone",
            json!({ "phone": "987654321", "botToken": "token" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, view) = app.get("/auth/session").await;
    assert_eq!(view["stage"], "phoneEntry");
}

#[tokio::test]
async fn first_time_sign_in_walks_to_profile_completion() {
    let mut app = TestApp::new();

    let (status, view) = app
        .post(
            "/auth/phone",
            json!({ "phone": "9876543210", "botToken": "token" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["stage"], "codeEntry");
    assert_eq!(view["phone"], "+919876543210");
    assert_eq!(view["canResend"], false);

    // Wrong code keeps the challenge open.
    let (status, _) = app.post("/auth/verify", json!({ "code": "654321" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Five digits never reaches the provider.
    let (status, _) = app.post("/auth/verify", json!({ "code": "12345" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, view) = app.post("/auth/verify", json!({ "code": "123456" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["stage"], "profileIncomplete");
    assert_eq!(view["profile"]["profileCompleted"], false);

    // Email without a dot in the domain is rejected.
    let (status, _) = app
        .post(
            "/auth/profile",
            json!({ "fullName": "Asha Rao", "email": "asha@nodot" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, view) = app
        .post(
            "/auth/profile",
            json!({ "fullName": "Asha Rao", "email": "asha@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["stage"], "authenticated");
    assert_eq!(view["profile"]["fullName"], "Asha Rao");
    assert_eq!(view["profile"]["email"], "asha@example.com");
    assert_eq!(view["profile"]["profileCompleted"], true);
}

#[tokio::test]
async fn resend_is_blocked_until_cooldown_elapses() {
    let mut app = TestApp::new();
    app.post(
        "/auth/phone",
        json!({ "phone": "9876543210", "botToken": "token" }),
    )
    .await;

    let (status, error) = app.post("/auth/resend", json!({ "botToken": "token" })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(error["retryInSecs"].as_u64().unwrap() <= 60);
}

#[tokio::test]
async fn change_number_restarts_at_phone_entry() {
    let mut app = TestApp::new();
    app.post(
        "/auth/phone",
        json!({ "phone": "9876543210", "botToken": "token" }),
    )
    .await;

    let (status, view) = app.post("/auth/change-number", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["stage"], "phoneEntry");

    // A code for the abandoned challenge has nowhere to go.
    let (status, _) = app.post("/auth/verify", json!({ "code": "123456" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
