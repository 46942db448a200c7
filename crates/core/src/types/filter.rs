//! Product listing filters and their backend query-string form.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Listing sort order selected in the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Rating,
}

impl SortBy {
    /// Backend `(sortBy, sortOrder)` pair.
    #[must_use]
    pub const fn backend_params(self) -> (&'static str, &'static str) {
        match self {
            Self::PriceAsc => ("price", "asc"),
            Self::PriceDesc => ("price", "desc"),
            Self::NameAsc => ("name", "asc"),
            Self::NameDesc => ("name", "desc"),
            Self::Rating => ("rating", "desc"),
            Self::Newest => ("createdAt", "desc"),
        }
    }
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "name_asc" => Ok(Self::NameAsc),
            "name_desc" => Ok(Self::NameDesc),
            "rating" => Ok(Self::Rating),
            _ => Err(format!("invalid sort key: {s}")),
        }
    }
}

/// Attribute facets offered by the filter sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facet {
    Type,
    Style,
    Brand,
    Material,
    Color,
    Pattern,
    Size,
}

impl Facet {
    /// Query parameter name for the facet.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Style => "style",
            Self::Brand => "brand",
            Self::Material => "material",
            Self::Color => "color",
            Self::Pattern => "pattern",
            Self::Size => "size",
        }
    }
}

/// Filters applied to a product listing.
///
/// Two filter sets with the same [`signature`](Self::signature) produce the
/// same backend request and share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    /// Minimum average rating (1-5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_sale: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<Facet, Vec<String>>,
}

impl FilterOptions {
    /// Select values for a facet, replacing any previous selection.
    #[must_use]
    pub fn with_facet(mut self, facet: Facet, values: impl IntoIterator<Item = String>) -> Self {
        let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            self.facets.remove(&facet);
        } else {
            self.facets.insert(facet, values);
        }
        self
    }

    /// Query parameters in a stable order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category".to_string(), category.to_string()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice".to_string(), min.normalize().to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice".to_string(), max.normalize().to_string()));
        }
        if let Some(rating) = self.rating {
            pairs.push(("rating".to_string(), rating.to_string()));
        }
        if let Some(in_stock) = self.in_stock {
            pairs.push(("inStock".to_string(), in_stock.to_string()));
        }
        if let Some(on_sale) = self.on_sale {
            pairs.push(("onSale".to_string(), on_sale.to_string()));
        }
        for (facet, values) in &self.facets {
            pairs.push((facet.param().to_string(), values.join(",")));
        }
        if let Some(sort) = self.sort_by {
            let (by, order) = sort.backend_params();
            pairs.push(("sortBy".to_string(), by.to_string()));
            pairs.push(("sortOrder".to_string(), order.to_string()));
        }
        pairs
    }

    /// Deterministic cache key for this filter set.
    #[must_use]
    pub fn signature(&self) -> String {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return "all".to_string();
        }
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// One selectable value in a filter group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChoice {
    pub label: String,
    pub value: String,
}

/// A group of filter choices offered by `GET /filter-options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub title: String,
    /// Query parameter the choices are sent under.
    pub key: String,
    #[serde(default)]
    pub options: Vec<FilterChoice>,
}
