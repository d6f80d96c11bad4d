//! The cart ledger: the authoritative set of items a buyer intends to
//! purchase, with deterministic, reproducible price totals.
//!
//! All arithmetic uses [`Decimal`] so totals are exact to two fraction digits
//! of currency precision no matter how many lines are added. Derived values
//! (subtotal, tax, shipping, grand total) are never stored; they are
//! recomputed from the lines on every call.
//!
//! Every operation is a total function: out-of-range quantities are clamped
//! or treated as removal, and operating on an absent line is a no-op. The
//! ledger has no I/O and cannot fail.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::id::{LineId, ProductId};

/// One distinct product entry in the cart, uniquely keyed by product id.
///
/// Display fields (`name`, `category`, prices) are snapshotted when the
/// product is added, not live-joined to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    /// Opaque line identifier assigned at insertion time.
    pub id: LineId,
    /// Catalog entry this line was created from.
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    /// Price charged per unit; the only price that feeds totals.
    pub unit_price: Decimal,
    /// Pre-discount price, shown struck through. Never used for totals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_unit_price: Option<Decimal>,
    /// Always at least 1; a line is removed rather than kept at zero.
    pub quantity: u32,
    /// Per-line GST rate in percent; varies by product category.
    pub tax_rate_percent: Decimal,
}

impl CartLine {
    /// Line total before tax (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// GST owed on this line.
    #[must_use]
    pub fn tax_amount(&self) -> Decimal {
        self.line_total() * self.tax_rate_percent / Decimal::from(100)
    }
}

/// Candidate for [`CartLedger::add_item`]: a [`CartLine`] minus the id,
/// which the ledger assigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCartLine {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_unit_price: Option<Decimal>,
    pub quantity: u32,
    pub tax_rate_percent: Decimal,
}

/// One component of the GST breakdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxComponent {
    pub amount: Decimal,
}

/// GST split across its central, state, and inter-state components.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxBreakdown {
    pub cgst: TaxComponent,
    pub sgst: TaxComponent,
    pub igst: TaxComponent,
}

/// Shipping fee rules: a flat fee waived above a subtotal threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Subtotals strictly above this ship free.
    pub free_threshold: Decimal,
    /// Flat fee charged at or below the threshold.
    pub flat_fee: Decimal,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_threshold: Decimal::from(999),
            flat_fee: Decimal::from(50),
        }
    }
}

/// The cart ledger.
///
/// Owns an ordered collection of [`CartLine`]; insertion order matters only
/// for display, never for pricing. The ledger upholds one structural
/// invariant: no two lines share a `product_id` — adding an existing product
/// merges into its line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartLedger {
    lines: Vec<CartLine>,
    /// While locked (payment in flight) mutations are ignored so the charged
    /// amount cannot drift from the snapshot taken at payment entry.
    #[serde(default)]
    locked: bool,
}

impl CartLedger {
    /// Create an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            locked: false,
        }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the ledger holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether mutations are currently ignored.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Freeze the ledger for the duration of a payment attempt.
    pub const fn lock(&mut self) {
        self.locked = true;
    }

    /// Re-enable mutations.
    pub const fn unlock(&mut self) {
        self.locked = false;
    }

    /// Add a product to the cart.
    ///
    /// If a line for the same product already exists, its quantity is
    /// incremented by the candidate's quantity, saturating at `u32::MAX`;
    /// otherwise a new line is created with a fresh id. A candidate quantity
    /// of zero is treated as 1. Stock limits are not enforced here; the
    /// catalog's stock figure is an advisory courtesy check for the UI.
    ///
    /// Returns the id of the affected line, or `None` when the ledger is
    /// locked.
    pub fn add_item(&mut self, item: NewCartLine) -> Option<LineId> {
        if self.locked {
            return None;
        }

        let quantity = item.quantity.max(1);

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            return Some(line.id);
        }

        let id = LineId::generate();
        self.lines.push(CartLine {
            id,
            product_id: item.product_id,
            name: item.name,
            category: item.category,
            unit_price: item.unit_price,
            original_unit_price: item.original_unit_price,
            quantity,
            tax_rate_percent: item.tax_rate_percent,
        });
        Some(id)
    }

    /// Remove a line. No-op (not an error) when the id is absent.
    pub fn remove_item(&mut self, line_id: &LineId) {
        if self.locked {
            return;
        }
        self.lines.retain(|line| line.id != *line_id);
    }

    /// Set a line's quantity exactly (not additively).
    ///
    /// A quantity of zero removes the line. No-op when the id is absent.
    pub fn update_quantity(&mut self, line_id: &LineId, quantity: u32) {
        if self.locked {
            return;
        }

        if quantity == 0 {
            self.remove_item(line_id);
            return;
        }

        if let Some(line) = self.lines.iter_mut().find(|line| line.id == *line_id) {
            line.quantity = quantity;
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        if self.locked {
            return;
        }
        self.lines.clear();
    }

    /// Empty the cart regardless of the lock.
    ///
    /// Used once per checkout, after payment success is confirmed, while the
    /// ledger is still frozen.
    pub fn clear_after_payment(&mut self) {
        self.lines.clear();
        self.locked = false;
    }

    /// Sum of quantities across lines (badge displays), saturating at
    /// `u32::MAX`.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |count, line| count.saturating_add(line.quantity))
    }

    /// Sum over lines of `unit_price * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total GST: sum over lines of
    /// `unit_price * quantity * tax_rate_percent / 100`.
    #[must_use]
    pub fn total_tax(&self) -> Decimal {
        self.lines.iter().map(CartLine::tax_amount).sum()
    }

    /// GST split into CGST, SGST, and IGST components.
    ///
    /// Intra-state supply is assumed: the total is halved into co-equal
    /// CGST and SGST components and IGST is always zero. A
    /// jurisdiction-aware split would need the buyer's and seller's states;
    /// this mirrors the observed storefront behavior.
    #[must_use]
    pub fn tax_breakdown(&self) -> TaxBreakdown {
        let total = self.total_tax();
        let half = total / Decimal::from(2);
        TaxBreakdown {
            cgst: TaxComponent { amount: half },
            sgst: TaxComponent { amount: half },
            igst: TaxComponent {
                amount: Decimal::ZERO,
            },
        }
    }

    /// Shipping charge under `policy`: free strictly above the threshold,
    /// otherwise the flat fee.
    #[must_use]
    pub fn shipping_charge(&self, policy: &ShippingPolicy) -> Decimal {
        if self.subtotal() > policy.free_threshold {
            Decimal::ZERO
        } else {
            policy.flat_fee
        }
    }

    /// `subtotal + total tax + shipping`.
    #[must_use]
    pub fn grand_total(&self, policy: &ShippingPolicy) -> Decimal {
        self.subtotal() + self.total_tax() + self.shipping_charge(policy)
    }
}
