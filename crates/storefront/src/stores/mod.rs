//! Domain stores: cart, wishlist and product catalog.
//!
//! Each store owns its item list behind an async `RwLock` and exposes a
//! cloneable handle. Locks are never held across a network call, so two
//! overlapping mutations race and the later response wins.
//!
//! Store operations report where their data came from with [`Synced`]:
//! a fresh server round-trip, a local fallback alongside the error that
//! forced it, or nothing at all.

mod cart;
mod products;
mod wishlist;

pub use cart::{CartState, CartStore, CartSync};
pub use products::{ProductState, ProductStore, SearchOutcome};
pub use wishlist::{WishlistState, WishlistStore};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Result of a cache-aside store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Synced<T> {
    /// The backend answered; `T` reflects server state.
    Fresh(T),
    /// The backend failed; `T` is local state (cached or optimistic).
    Stale { value: T, error: ApiError },
    /// The backend failed and nothing local could stand in.
    Empty { error: ApiError },
}

impl<T> Synced<T> {
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Fresh(value) | Self::Stale { value, .. } => Some(value),
            Self::Empty { .. } => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Fresh(value) | Self::Stale { value, .. } => Some(value),
            Self::Empty { .. } => None,
        }
    }

    #[must_use]
    pub const fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Fresh(_) => None,
            Self::Stale { error, .. } | Self::Empty { error } => Some(error),
        }
    }

    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        match self {
            Self::Fresh(value) => Synced::Fresh(f(value)),
            Self::Stale { value, error } => Synced::Stale {
                value: f(value),
                error,
            },
            Self::Empty { error } => Synced::Empty { error },
        }
    }

    /// Convert to a `Result`, treating stale data as success.
    ///
    /// # Errors
    ///
    /// Returns the error of an [`Synced::Empty`] result.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Fresh(value) | Self::Stale { value, .. } => Ok(value),
            Self::Empty { error } => Err(error),
        }
    }
}

/// On-disk shape of the cart and wishlist caches.
#[derive(Debug, Serialize, Deserialize)]
struct CachedItems<T> {
    items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_accessors() {
        let fresh = Synced::Fresh(3);
        assert_eq!(fresh.value(), Some(&3));
        assert!(fresh.is_fresh());

        let stale = Synced::Stale {
            value: 2,
            error: ApiError::Timeout,
        };
        assert_eq!(stale.error(), Some(&ApiError::Timeout));
        assert_eq!(stale.clone().map(|v| v * 10).value(), Some(&20));
        assert_eq!(stale.into_result(), Ok(2));

        let empty: Synced<i32> = Synced::Empty {
            error: ApiError::ServerUnavailable,
        };
        assert!(empty.value().is_none());
        assert_eq!(empty.into_result(), Err(ApiError::ServerUnavailable));
    }
}
