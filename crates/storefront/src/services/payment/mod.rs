//! Payment gateway collaborator.
//!
//! The gateway is an external party: order creation happens over its REST
//! API and the buyer completes payment in the gateway's own widget. The only
//! authoritative success signal is the signature check on the completion
//! callback, which must happen server-side — client-reported success is
//! never trusted on its own.

mod razorpay;

pub use razorpay::RazorpayClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use diya_core::{GatewayOrderId, GatewayPaymentId, Money, ReceiptRef};

/// Errors from the payment gateway collaborator.
///
/// All of these are retryable from the buyer's point of view: the checkout
/// stays in its payment step and the buyer may try again.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure reaching the gateway.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request.
    #[error("gateway rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The gateway answered with a body we could not interpret.
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}

/// Buyer contact details passed to the gateway so its widget can prefill
/// the payment form.
#[derive(Debug, Clone, Serialize)]
pub struct ContactPrefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

/// A gateway-side order created for one payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_id: GatewayOrderId,
    pub amount: Money,
    pub receipt: ReceiptRef,
}

/// The completion callback delivered after the buyer finishes (or the
/// gateway fails) a payment attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub order_id: GatewayOrderId,
    pub payment_id: GatewayPaymentId,
    pub signature: String,
}

/// Payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway order for `amount`, tagged with a client-generated
    /// idempotent `receipt` reference.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the gateway is unreachable, rejects
    /// the request, or answers with an uninterpretable body.
    async fn create_order(
        &self,
        amount: Money,
        receipt: &ReceiptRef,
        prefill: &ContactPrefill,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Verify the signature on a completion callback.
    ///
    /// Pure computation over the shared secret; the authoritative check for
    /// payment success.
    fn verify_signature(&self, callback: &PaymentCallback) -> bool;
}
