//! Cart route handlers.
//!
//! Every mutation responds with the full recomputed cart view, so the client
//! never does its own arithmetic. Amounts serialize as decimal strings.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use diya_core::{CartLedger, CartLine, LineId, NewCartLine, ProductId, ShippingPolicy};

use crate::error::Result;
use crate::services::catalog::Product;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One cart line as rendered to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub id: LineId,
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_unit_price: Option<Decimal>,
    pub quantity: u32,
    pub line_total: Decimal,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            category: line.category.clone(),
            unit_price: line.unit_price,
            original_unit_price: line.original_unit_price,
            quantity: line.quantity,
            line_total: line.line_total(),
        }
    }
}

/// The full cart with derived totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_tax: Decimal,
    pub shipping: Decimal,
    pub grand_total: Decimal,
    pub locked: bool,
}

impl CartView {
    /// Render a ledger under the given shipping policy.
    #[must_use]
    pub fn render(cart: &CartLedger, policy: &ShippingPolicy) -> Self {
        let breakdown = cart.tax_breakdown();
        Self {
            lines: cart.lines().iter().map(CartLineView::from).collect(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
            cgst: breakdown.cgst.amount,
            sgst: breakdown.sgst.amount,
            igst: breakdown.igst.amount,
            total_tax: cart.total_tax(),
            shipping: cart.shipping_charge(policy),
            grand_total: cart.grand_total(policy),
            locked: cart.is_locked(),
        }
    }
}

// =============================================================================
// Request bodies
// =============================================================================

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemBody {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub line_id: Uuid,
    pub quantity: u32,
}

/// Line removal request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBody {
    pub line_id: Uuid,
}

fn snapshot(product: Product, quantity: u32) -> NewCartLine {
    NewCartLine {
        product_id: product.id,
        name: product.name,
        category: product.category,
        unit_price: product.price,
        original_unit_price: product.original_price,
        quantity,
        tax_rate_percent: product.tax_rate_percent,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /cart - Cart contents with totals.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let guard = entry.lock().await;
    Ok(Json(CartView::render(&guard.cart, &state.config().shipping)))
}

/// GET /cart/count - Item count badge.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let guard = entry.lock().await;
    Ok(Json(json!({ "itemCount": guard.cart.item_count() })))
}

/// POST /cart/items - Add a product to the cart.
///
/// The catalog is consulted once and the listing snapshotted into the line;
/// an unknown product id leaves the cart unchanged. Stock is advisory only:
/// an add past the stock figure is logged, not rejected.
#[instrument(skip_all, fields(product = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemBody>,
) -> Result<Json<CartView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;

    let product = state.catalog().product(&body.product_id).await?;

    let mut guard = entry.lock().await;
    match product {
        Some(product) => {
            let quantity = body.quantity.unwrap_or(1);
            if let Some(stock) = product.stock {
                let in_cart = guard
                    .cart
                    .lines()
                    .iter()
                    .find(|line| line.product_id == product.id)
                    .map_or(0, |line| line.quantity);
                let requested = in_cart.saturating_add(quantity.max(1));
                if requested > stock {
                    tracing::warn!(
                        product = %product.id,
                        stock,
                        requested,
                        "add exceeds advisory stock figure"
                    );
                }
            }
            guard.cart.add_item(snapshot(product, quantity));
        }
        None => {
            tracing::warn!(product = %body.product_id, "add for unknown product ignored");
        }
    }

    Ok(Json(CartView::render(&guard.cart, &state.config().shipping)))
}

/// POST /cart/update - Set a line's quantity; zero removes the line.
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<UpdateBody>,
) -> Result<Json<CartView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;
    guard
        .cart
        .update_quantity(&LineId::from(body.line_id), body.quantity);
    Ok(Json(CartView::render(&guard.cart, &state.config().shipping)))
}

/// POST /cart/remove - Remove a line.
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RemoveBody>,
) -> Result<Json<CartView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;
    guard.cart.remove_item(&LineId::from(body.line_id));
    Ok(Json(CartView::render(&guard.cart, &state.config().shipping)))
}

/// POST /cart/clear - Empty the cart.
#[instrument(skip_all)]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;
    guard.cart.clear();
    Ok(Json(CartView::render(&guard.cart, &state.config().shipping)))
}
