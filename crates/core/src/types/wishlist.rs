//! Wishlist DTO.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::id::{ProductId, WishlistItemId};

/// A saved product.
///
/// Entries created while the backend was unreachable carry no embedded
/// product until the next successful fetch replaces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    pub added_at: DateTime<Utc>,
}
