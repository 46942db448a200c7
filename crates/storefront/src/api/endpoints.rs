//! Backend REST endpoint paths, relative to the API base URL.
//!
//! Functions take raw identifiers and percent-encode them as path segments.

/// Server-availability check.
pub const HEALTH: &str = "/health";

pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGOUT: &str = "/auth/logout";
    pub const REFRESH: &str = "/auth/refresh";
    pub const VERIFY: &str = "/auth/verify";
    pub const PROFILE: &str = "/auth/profile";
}

pub mod products {
    use super::segment;

    pub const LIST: &str = "/products";
    pub const FEATURED: &str = "/products/featured";
    pub const SUGGESTIONS: &str = "/search/suggestions";
    pub const FILTER_OPTIONS: &str = "/filter-options";
    /// Admin product creation.
    pub const CREATE: &str = "/products";

    #[must_use]
    pub fn by_id(id: &str) -> String {
        format!("/products/{}", segment(id))
    }

    /// Admin product update.
    #[must_use]
    pub fn update(id: &str) -> String {
        by_id(id)
    }

    /// Admin product deletion.
    #[must_use]
    pub fn delete(id: &str) -> String {
        by_id(id)
    }
}

pub mod collections {
    use super::segment;

    pub const LIST: &str = "/collections";

    /// Collections are addressable by id or by name.
    #[must_use]
    pub fn by_id_or_name(key: &str) -> String {
        format!("/collections/{}", segment(key))
    }

    #[must_use]
    pub fn products(key: &str) -> String {
        format!("/collections/{}/products", segment(key))
    }
}

pub mod cart {
    use super::segment;

    pub const GET: &str = "/cart";
    pub const ADD: &str = "/cart/add";
    pub const CLEAR: &str = "/cart/clear";

    #[must_use]
    pub fn item(item_id: &str) -> String {
        format!("/cart/item/{}", segment(item_id))
    }
}

pub mod wishlist {
    use super::segment;

    pub const GET: &str = "/wishlist";
    pub const ADD: &str = "/wishlist/add";
    pub const CLEAR: &str = "/wishlist/clear";

    #[must_use]
    pub fn remove(product_id: &str) -> String {
        format!("/wishlist/remove/{}", segment(product_id))
    }

    #[must_use]
    pub fn check(product_id: &str) -> String {
        format!("/wishlist/check/{}", segment(product_id))
    }

    #[must_use]
    pub fn move_to_cart(product_id: &str) -> String {
        format!("/wishlist/move-to-cart/{}", segment(product_id))
    }
}

pub mod orders {
    use super::segment;

    pub const LIST: &str = "/orders";
    pub const CREATE: &str = "/orders";

    #[must_use]
    pub fn by_id(id: &str) -> String {
        format!("/orders/{}", segment(id))
    }
}

pub mod payments {
    pub const CREATE_PAYMENT_INTENT: &str = "/payments/create-payment-intent";
}

pub mod addresses {
    use super::segment;

    pub const LIST: &str = "/addresses";
    pub const CREATE: &str = "/addresses";

    #[must_use]
    pub fn by_id(id: &str) -> String {
        format!("/addresses/{}", segment(id))
    }
}

pub mod users {
    use super::segment;

    pub const LIST: &str = "/users";

    #[must_use]
    pub fn update_role(id: &str) -> String {
        format!("/users/{}/role", segment(id))
    }

    #[must_use]
    pub fn delete(id: &str) -> String {
        format!("/users/{}", segment(id))
    }
}

pub mod reviews {
    pub const CREATE: &str = "/reviews";
}

pub mod feedback {
    pub const FEATURED: &str = "/feedback/featured";
    pub const CREATE: &str = "/feedback";
}

/// Append an encoded query string to a path. Empty `pairs` leave it untouched.
#[must_use]
pub fn with_query<K, V>(path: &str, pairs: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
        any = true;
    }
    if any {
        format!("{path}?{}", serializer.finish())
    } else {
        path.to_string()
    }
}

/// Percent-encode a single path segment, slashes included.
fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_encoded_as_single_segments() {
        assert_eq!(cart::item("abc-123"), "/cart/item/abc-123");
        assert_eq!(
            collections::products("summer sale/2024"),
            "/collections/summer%20sale%2F2024/products"
        );
        assert_eq!(users::update_role("u1"), "/users/u1/role");
        assert_eq!(products::by_id("café"), "/products/caf%C3%A9");
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query::<&str, &str>(products::LIST, []), "/products");
        assert_eq!(
            with_query(products::LIST, [("search", "red shirt"), ("inStock", "true")]),
            "/products?search=red+shirt&inStock=true"
        );
    }
}
