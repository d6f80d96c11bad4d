//! Checkout route handlers.
//!
//! The checkout session lives server-side; every response reports the
//! current step so the client can render the matching screen.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use diya_core::GatewayOrderId;

use crate::error::Result;
use crate::services::checkout::{CheckoutSession, CheckoutStep, ShippingAddress};
use crate::services::payment::PaymentCallback;
use crate::state::AppState;

/// The checkout as rendered to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum CheckoutView {
    #[serde(rename_all = "camelCase")]
    CollectingAddress {
        #[serde(skip_serializing_if = "Option::is_none")]
        draft: Option<ShippingAddress>,
    },
    #[serde(rename_all = "camelCase")]
    AwaitingPayment {
        address: ShippingAddress,
        /// Amount due as a decimal string, in rupees.
        amount_due: rust_decimal::Decimal,
        payment_pending: bool,
    },
    #[serde(rename_all = "camelCase")]
    Confirmed {
        address: ShippingAddress,
        order_id: GatewayOrderId,
        receipt: diya_core::ReceiptRef,
        amount: rust_decimal::Decimal,
        estimated_delivery: chrono::DateTime<Utc>,
    },
}

impl CheckoutView {
    fn render(checkout: Option<&CheckoutSession>) -> Self {
        let Some(checkout) = checkout else {
            return Self::CollectingAddress { draft: None };
        };
        match checkout.step() {
            CheckoutStep::CollectingAddress { draft } => Self::CollectingAddress {
                draft: draft.clone(),
            },
            CheckoutStep::AwaitingPayment {
                address,
                amount_due,
                attempt,
            } => Self::AwaitingPayment {
                address: address.clone(),
                amount_due: amount_due.amount,
                payment_pending: attempt.is_some(),
            },
            CheckoutStep::Confirmed {
                address,
                receipt,
                estimated_delivery,
            } => Self::Confirmed {
                address: address.clone(),
                order_id: receipt.order_id.clone(),
                receipt: receipt.receipt.clone(),
                amount: receipt.amount.amount,
                estimated_delivery: *estimated_delivery,
            },
        }
    }
}

/// Failed-payment notice body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBody {
    pub order_id: GatewayOrderId,
}

/// GET /checkout - Current checkout step.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let guard = entry.lock().await;
    Ok(Json(CheckoutView::render(guard.checkout.as_ref())))
}

/// POST /checkout/address - Submit the shipping address.
///
/// On success the cart total is snapshotted, the ledger freezes, and the
/// checkout advances to the payment step.
#[instrument(skip_all)]
pub async fn submit_address(
    State(state): State<AppState>,
    session: Session,
    Json(candidate): Json<ShippingAddress>,
) -> Result<Json<CheckoutView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;
    let session_state = &mut *guard;

    let checkout = session_state
        .checkout
        .get_or_insert_with(CheckoutSession::new);
    checkout.submit_address(candidate, &mut session_state.cart, &state.config().shipping)?;

    Ok(Json(CheckoutView::render(session_state.checkout.as_ref())))
}

/// POST /checkout/back - Return from payment to the address step.
#[instrument(skip_all)]
pub async fn back(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;
    let session_state = &mut *guard;

    let checkout = session_state
        .checkout
        .get_or_insert_with(CheckoutSession::new);
    checkout.back_to_address(&mut session_state.cart)?;

    Ok(Json(CheckoutView::render(session_state.checkout.as_ref())))
}

/// POST /checkout/pay - Create a gateway order for the snapshotted amount.
///
/// Returns what the payment widget needs: the gateway order, the amount in
/// minor units, and the public key id.
#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    let checkout = guard.checkout.get_or_insert_with(CheckoutSession::new);
    let order = checkout.begin_payment(state.gateway(), Utc::now()).await?;

    Ok(Json(json!({
        "orderId": order.order_id,
        "amount": order.amount.to_minor_units(),
        "currency": order.amount.currency.code(),
        "receipt": order.receipt,
        "keyId": state.config().razorpay.key_id,
    })))
}

/// POST /checkout/callback - Gateway completion callback.
///
/// Verifies the signature server-side; on success the order confirms and the
/// cart empties.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<CheckoutView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;
    let session_state = &mut *guard;

    let checkout = session_state
        .checkout
        .get_or_insert_with(CheckoutSession::new);
    checkout.complete_payment(
        &callback,
        state.gateway(),
        &mut session_state.cart,
        Utc::now(),
    )?;

    Ok(Json(CheckoutView::render(session_state.checkout.as_ref())))
}

/// POST /checkout/failed - Record that the outstanding attempt failed.
///
/// The checkout stays at the payment step, ready for a retry.
#[instrument(skip_all)]
pub async fn failed(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<FailedBody>,
) -> Result<Json<CheckoutView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    let checkout = guard.checkout.get_or_insert_with(CheckoutSession::new);
    checkout.fail_payment(&body.order_id);

    Ok(Json(CheckoutView::render(guard.checkout.as_ref())))
}
