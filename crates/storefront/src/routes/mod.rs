//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart
//! GET  /cart                   - Cart contents with totals
//! GET  /cart/count             - Item count badge
//! POST /cart/items             - Add a product to the cart
//! POST /cart/update            - Set a line's quantity
//! POST /cart/remove            - Remove a line
//! POST /cart/clear             - Empty the cart
//!
//! # Checkout
//! GET  /checkout               - Current checkout step
//! POST /checkout/address       - Submit shipping address
//! POST /checkout/back          - Return to the address step
//! POST /checkout/pay           - Create a gateway order for payment
//! POST /checkout/callback      - Gateway completion callback
//! POST /checkout/failed        - Record a failed payment attempt
//!
//! # Auth
//! POST /auth/phone             - Submit phone number, send OTP
//! POST /auth/verify            - Submit the OTP code
//! POST /auth/resend            - Re-send the OTP
//! POST /auth/change-number     - Abandon the challenge, re-enter phone
//! POST /auth/profile           - Complete a first-time profile
//! GET  /auth/session           - Current sign-in stage
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/address", post(checkout::submit_address))
        .route("/back", post(checkout::back))
        .route("/pay", post(checkout::pay))
        .route("/callback", post(checkout::callback))
        .route("/failed", post(checkout::failed))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/phone", post(auth::submit_phone))
        .route("/verify", post(auth::verify))
        .route("/resend", post(auth::resend))
        .route("/change-number", post(auth::change_number))
        .route("/profile", post(auth::complete_profile))
        .route("/session", get(auth::session))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
}
