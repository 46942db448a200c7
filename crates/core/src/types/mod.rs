//! Core types for Larkspur.
//!
//! Newtype wrappers for domain concepts plus the DTOs exchanged with the
//! storefront backend. DTOs use camelCase field names on the wire.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod filter;
pub mod id;
pub mod order;
pub mod price;
pub mod status;
pub mod user;
pub mod wishlist;

pub use cart::{CartItem, CartResponse, CartTotals, LineOptions};
pub use catalog::{Collection, Feedback, FeedbackAuthor, Pagination, Product, ProductPage};
pub use email::{Email, EmailError};
pub use filter::{Facet, FilterChoice, FilterGroup, FilterOptions, SortBy};
pub use id::*;
pub use order::{Order, OrderItem};
pub use price::{CurrencyCode, Price, round_cents};
pub use status::*;
pub use user::{Address, User, UserAddress};
pub use wishlist::WishlistItem;
