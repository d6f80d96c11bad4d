//! Razorpay payment gateway client.
//!
//! Orders are created via `POST /v1/orders` with basic auth; amounts travel
//! in paise. Completion callbacks carry an HMAC-SHA256 signature over
//! `"{order_id}|{payment_id}"` keyed with the key secret, hex-encoded.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::instrument;

use diya_core::{GatewayOrderId, Money, ReceiptRef};

use crate::config::RazorpayConfig;

use super::{ContactPrefill, GatewayError, GatewayOrder, PaymentCallback, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

/// Client for the Razorpay Orders API.
pub struct RazorpayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

/// Order response body, reduced to the fields we keep.
#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
}

/// Error response body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    description: String,
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    #[must_use]
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    fn signing_mac(&self, callback: &PaymentCallback) -> Option<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(self.key_secret.expose_secret().as_bytes()).ok()?;
        mac.update(callback.order_id.as_str().as_bytes());
        mac.update(b"|");
        mac.update(callback.payment_id.as_str().as_bytes());
        Some(mac)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, prefill), fields(receipt = %receipt))]
    async fn create_order(
        &self,
        amount: Money,
        receipt: &ReceiptRef,
        prefill: &ContactPrefill,
    ) -> Result<GatewayOrder, GatewayError> {
        let body = json!({
            "amount": amount.to_minor_units(),
            "currency": amount.currency.code(),
            "receipt": receipt.as_str(),
            "notes": {
                "customer_name": prefill.name,
                "customer_email": prefill.email,
                "customer_phone": prefill.contact,
            },
        });

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |e| e.error.description);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let order: OrderResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if order.amount != amount.to_minor_units() {
            return Err(GatewayError::MalformedResponse(format!(
                "gateway echoed amount {} for requested {}",
                order.amount,
                amount.to_minor_units()
            )));
        }

        Ok(GatewayOrder {
            order_id: GatewayOrderId::new(order.id),
            amount,
            receipt: receipt.clone(),
        })
    }

    fn verify_signature(&self, callback: &PaymentCallback) -> bool {
        let Ok(provided) = hex::decode(&callback.signature) else {
            return false;
        };
        // verify_slice is constant-time.
        self.signing_mac(callback)
            .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
    }
}
