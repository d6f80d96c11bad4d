//! Checkout state machine.
//!
//! One buyer walks forward through address collection, payment, and
//! confirmation, and may walk back from payment to the address step. The
//! amount due is snapshotted on entry to the payment step and the cart
//! ledger is frozen for the duration, so what the gateway charges is exactly
//! what the buyer saw.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use diya_core::{CartLedger, GatewayPaymentId, Money, ReceiptRef, ShippingPolicy};

use crate::services::payment::{
    ContactPrefill, GatewayError, GatewayOrder, PaymentCallback, PaymentGateway,
};

/// Days between payment confirmation and the estimated delivery date.
const ESTIMATED_DELIVERY_DAYS: i64 = 5;

// ============================================================================
// Address
// ============================================================================

/// Shipping address collected at the first checkout step.
///
/// Validation is presence-only: every field must be non-blank. Postal
/// correctness is the courier's problem, not ours.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// Fields of [`ShippingAddress`], used to report which ones failed
/// validation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AddressField {
    FullName,
    Phone,
    Email,
    Address,
    City,
    State,
    Pincode,
}

impl ShippingAddress {
    /// Returns every field that is blank (empty or whitespace-only).
    #[must_use]
    pub fn missing_fields(&self) -> Vec<AddressField> {
        let checks = [
            (AddressField::FullName, &self.full_name),
            (AddressField::Phone, &self.phone),
            (AddressField::Email, &self.email),
            (AddressField::Address, &self.address),
            (AddressField::City, &self.city),
            (AddressField::State, &self.state),
            (AddressField::Pincode, &self.pincode),
        ];
        checks
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect()
    }

    fn prefill(&self) -> ContactPrefill {
        ContactPrefill {
            name: self.full_name.clone(),
            email: self.email.clone(),
            contact: self.phone.clone(),
        }
    }
}

// ============================================================================
// States and errors
// ============================================================================

/// An in-flight payment attempt: the gateway order we are waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub order: GatewayOrder,
}

/// The record of a verified, successful payment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub order_id: diya_core::GatewayOrderId,
    pub payment_id: GatewayPaymentId,
    pub receipt: ReceiptRef,
    pub amount: Money,
}

/// Where the buyer is in the checkout.
#[derive(Debug, Clone)]
pub enum CheckoutStep {
    /// Collecting the shipping address. Holds the previously submitted
    /// address as a draft when the buyer stepped back from payment.
    CollectingAddress { draft: Option<ShippingAddress> },
    /// Address accepted, amount snapshotted, ledger frozen. `attempt` is the
    /// outstanding gateway order, if one has been created.
    AwaitingPayment {
        address: ShippingAddress,
        amount_due: Money,
        attempt: Option<PaymentAttempt>,
    },
    /// Payment verified; the order is placed. Terminal.
    Confirmed {
        address: ShippingAddress,
        receipt: PaymentReceipt,
        estimated_delivery: DateTime<Utc>,
    },
}

/// Errors from checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The submitted address has blank fields.
    #[error("address is missing required fields")]
    InvalidAddress { fields: Vec<AddressField> },

    /// Checkout cannot start with an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The operation does not apply to the current step.
    #[error("cannot {action} at this checkout step")]
    InvalidState { action: &'static str },

    /// The payment gateway failed; the buyer may retry.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The callback's signature did not verify. Treated as a failed attempt.
    #[error("payment signature verification failed")]
    SignatureMismatch,

    /// The callback references a gateway order we are not waiting on.
    #[error("callback references an unknown gateway order")]
    UnknownOrder,
}

// ============================================================================
// Session
// ============================================================================

/// One buyer's checkout session.
///
/// All transitions take `&mut self`, so two operations on the same session
/// cannot interleave; a response for a superseded payment attempt is rejected
/// by the order-id match in [`CheckoutSession::complete_payment`].
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    step: CheckoutStep,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutSession {
    /// Start a checkout at the address step.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            step: CheckoutStep::CollectingAddress { draft: None },
        }
    }

    /// The current step.
    #[must_use]
    pub const fn step(&self) -> &CheckoutStep {
        &self.step
    }

    /// The amount snapshotted for payment, when at or past the payment step.
    #[must_use]
    pub const fn amount_due(&self) -> Option<Money> {
        match &self.step {
            CheckoutStep::AwaitingPayment { amount_due, .. } => Some(*amount_due),
            CheckoutStep::Confirmed { receipt, .. } => Some(receipt.amount),
            CheckoutStep::CollectingAddress { .. } => None,
        }
    }

    /// Submit the shipping address and advance to the payment step.
    ///
    /// Snapshots the cart's grand total as the amount due and freezes the
    /// ledger until the payment resolves or the buyer steps back.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidAddress`] listing the blank fields,
    /// [`CheckoutError::EmptyCart`] when there is nothing to buy, and
    /// [`CheckoutError::InvalidState`] when not at the address step.
    pub fn submit_address(
        &mut self,
        candidate: ShippingAddress,
        ledger: &mut CartLedger,
        policy: &ShippingPolicy,
    ) -> Result<(), CheckoutError> {
        let CheckoutStep::CollectingAddress { .. } = &self.step else {
            return Err(CheckoutError::InvalidState {
                action: "submit an address",
            });
        };

        let missing = candidate.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::InvalidAddress { fields: missing });
        }

        if ledger.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let amount_due = Money::inr(ledger.grand_total(policy));
        ledger.lock();
        self.step = CheckoutStep::AwaitingPayment {
            address: candidate,
            amount_due,
            attempt: None,
        };
        Ok(())
    }

    /// Step back from payment to the address form.
    ///
    /// Unfreezes the ledger, discards any outstanding payment attempt, and
    /// keeps the submitted address as an editable draft. If the discarded
    /// attempt's callback arrives later it will fail the order-id match.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] when not at the payment step.
    pub fn back_to_address(&mut self, ledger: &mut CartLedger) -> Result<(), CheckoutError> {
        let CheckoutStep::AwaitingPayment { address, .. } = &self.step else {
            return Err(CheckoutError::InvalidState {
                action: "return to the address step",
            });
        };

        let draft = address.clone();
        ledger.unlock();
        self.step = CheckoutStep::CollectingAddress { draft: Some(draft) };
        Ok(())
    }

    /// Create a gateway order for the snapshotted amount.
    ///
    /// Each call mints a fresh receipt reference, so a retry after a failed
    /// attempt is a new order on the gateway side, never a replay. The
    /// attempt is recorded only when the gateway accepts; on failure the
    /// session stays at the payment step with no outstanding attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] when not at the payment step
    /// and [`CheckoutError::Gateway`] when order creation fails.
    pub async fn begin_payment(
        &mut self,
        gateway: &dyn PaymentGateway,
        now: DateTime<Utc>,
    ) -> Result<GatewayOrder, CheckoutError> {
        let CheckoutStep::AwaitingPayment {
            address,
            amount_due,
            attempt,
        } = &mut self.step
        else {
            return Err(CheckoutError::InvalidState {
                action: "begin payment",
            });
        };

        let receipt = ReceiptRef::generate(now);
        let order = gateway
            .create_order(*amount_due, &receipt, &address.prefill())
            .await?;

        *attempt = Some(PaymentAttempt {
            order: order.clone(),
        });
        Ok(order)
    }

    /// Resolve a completion callback from the gateway.
    ///
    /// The callback must reference the outstanding attempt's gateway order
    /// and carry a valid signature. On success the cart is emptied (through
    /// the lock) and the checkout reaches its terminal confirmed step, with
    /// an estimated delivery date five days out.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownOrder`] when the callback does not
    /// match the outstanding attempt (including attempts discarded by
    /// stepping back) and [`CheckoutError::SignatureMismatch`] when the
    /// signature fails to verify; a mismatch discards the attempt.
    pub fn complete_payment(
        &mut self,
        callback: &PaymentCallback,
        gateway: &dyn PaymentGateway,
        ledger: &mut CartLedger,
        now: DateTime<Utc>,
    ) -> Result<PaymentReceipt, CheckoutError> {
        let CheckoutStep::AwaitingPayment {
            address,
            amount_due,
            attempt,
        } = &mut self.step
        else {
            return Err(CheckoutError::InvalidState {
                action: "complete payment",
            });
        };

        let matches = attempt
            .as_ref()
            .is_some_and(|a| a.order.order_id == callback.order_id);
        if !matches {
            return Err(CheckoutError::UnknownOrder);
        }

        if !gateway.verify_signature(callback) {
            *attempt = None;
            return Err(CheckoutError::SignatureMismatch);
        }

        // The match above guarantees an attempt is present.
        let Some(confirmed) = attempt.take() else {
            return Err(CheckoutError::UnknownOrder);
        };

        let receipt = PaymentReceipt {
            order_id: callback.order_id.clone(),
            payment_id: callback.payment_id.clone(),
            receipt: confirmed.order.receipt,
            amount: *amount_due,
        };
        let address = address.clone();

        ledger.clear_after_payment();
        self.step = CheckoutStep::Confirmed {
            address,
            receipt: receipt.clone(),
            estimated_delivery: now + Duration::days(ESTIMATED_DELIVERY_DAYS),
        };
        Ok(receipt)
    }

    /// Record that the outstanding attempt failed or was abandoned.
    ///
    /// Discards the attempt when `order_id` matches it; a stale failure
    /// notice for some other order is ignored. The session stays at the
    /// payment step with the ledger still frozen, ready for a retry.
    pub fn fail_payment(&mut self, order_id: &diya_core::GatewayOrderId) {
        if let CheckoutStep::AwaitingPayment { attempt, .. } = &mut self.step
            && attempt
                .as_ref()
                .is_some_and(|a| a.order.order_id == *order_id)
        {
            *attempt = None;
        }
    }
}
