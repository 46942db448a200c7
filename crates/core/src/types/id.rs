//! Newtype IDs for type-safe entity references.
//!
//! The backend issues opaque string identifiers. Use the `define_id!` macro
//! to create wrappers that prevent accidentally mixing IDs from different
//! entity types.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use larkspur_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::new("u_1");
/// let order_id = OrderId::new("o_1");
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the underlying identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ProductId);
define_id!(CollectionId);
define_id!(CartItemId);
define_id!(WishlistItemId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(AddressId);
define_id!(FeedbackId);

/// Prefix marking entries created locally while the backend was unreachable.
pub const OFFLINE_ID_PREFIX: &str = "offline-";

impl CartItemId {
    /// Build an ID for a cart line created without the backend.
    #[must_use]
    pub fn offline(product_id: &ProductId, timestamp_millis: i64) -> Self {
        Self(format!("{OFFLINE_ID_PREFIX}{product_id}-{timestamp_millis}"))
    }

    /// Whether this line was created locally and never confirmed by the backend.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.0.starts_with(OFFLINE_ID_PREFIX)
    }
}

impl WishlistItemId {
    /// Build an ID for a wishlist entry created without the backend.
    #[must_use]
    pub fn offline(product_id: &ProductId, timestamp_millis: i64) -> Self {
        Self(format!("{OFFLINE_ID_PREFIX}wishlist-{product_id}-{timestamp_millis}"))
    }

    /// Whether this entry was created locally and never confirmed by the backend.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.0.starts_with(OFFLINE_ID_PREFIX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_cart_item_id() {
        let id = CartItemId::offline(&ProductId::new("p1"), 1_700_000_000_000);
        assert_eq!(id.as_str(), "offline-p1-1700000000000");
        assert!(id.is_offline());
        assert!(!CartItemId::new("ci_42").is_offline());
    }

    #[test]
    fn test_offline_wishlist_item_id() {
        let id = WishlistItemId::offline(&ProductId::new("p9"), 5);
        assert_eq!(id.as_str(), "offline-wishlist-p9-5");
        assert!(id.is_offline());
    }

    #[test]
    fn test_id_is_transparent_on_the_wire() {
        let id = ProductId::new("prod_123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"prod_123\"");
        let parsed: ProductId = serde_json::from_str("\"prod_123\"").unwrap();
        assert_eq!(parsed, id);
    }
}
