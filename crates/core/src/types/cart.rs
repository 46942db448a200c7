//! Cart DTOs and the total arithmetic shared by every cart code path.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId};

/// Variant selection for a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct LineOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl LineOptions {
    /// Options with neither size nor color selected.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            size: None,
            color: None,
        }
    }
}

/// A line in the shopping cart.
///
/// Invariant: `subtotal == price * quantity`, saturating at `Decimal::MAX`.
/// Use [`CartItem::with_quantity`] or [`CartItem::normalized`] rather than
/// writing `quantity` directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub subtotal: Decimal,
}

impl CartItem {
    /// Whether this line matches a product and variant selection.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, options: &LineOptions) -> bool {
        &self.product_id == product_id && self.size == options.size && self.color == options.color
    }

    /// Return a copy with a new quantity and a recomputed subtotal.
    #[must_use]
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            subtotal: line_subtotal(self.price, quantity),
            ..self.clone()
        }
    }

    /// Recompute the subtotal from price and quantity.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.subtotal = line_subtotal(self.price, self.quantity);
        self
    }

    /// Whether the line exists only locally.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.id.is_offline()
    }
}

fn line_subtotal(price: Decimal, quantity: u32) -> Decimal {
    price.saturating_mul(Decimal::from(quantity))
}

/// Cart payload from `GET /cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub item_count: u32,
    #[serde(default)]
    pub total: Decimal,
}

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    /// Sum of line quantities.
    pub total_items: u32,
    /// Sum of line subtotals.
    pub total_amount: Decimal,
}

impl CartTotals {
    /// Sum quantities and subtotals over a set of lines.
    #[must_use]
    pub fn from_items(items: &[CartItem]) -> Self {
        items.iter().fold(Self::default(), |acc, item| Self {
            total_items: acc.total_items.saturating_add(item.quantity),
            total_amount: acc.total_amount.saturating_add(item.subtotal),
        })
    }
}
