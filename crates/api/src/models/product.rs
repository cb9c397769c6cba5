//! Catalog domain types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use toybox_core::{Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub sub_category: String,
    pub bestseller: bool,
    /// Hosted image URLs, in upload slot order.
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// First image, used as the cart thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Validated data for inserting a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub sub_category: String,
    pub bestseller: bool,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
}

/// Result ordering for catalog searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    PriceAsc,
    PriceDesc,
    Name,
}

impl SortBy {
    /// Sort products in place. Ties keep their existing order.
    pub fn apply(self, products: &mut [Product]) {
        match self {
            Self::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price)),
            Self::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
            Self::Name => products.sort_by_cached_key(|p| p.name.to_lowercase()),
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price-asc" | "priceAsc" | "low-high" => Ok(Self::PriceAsc),
            "price-desc" | "priceDesc" | "high-low" => Ok(Self::PriceDesc),
            "name" => Ok(Self::Name),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Conjunctive catalog filter. `None` fields do not constrain results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub bestseller: Option<bool>,
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub sort_by: Option<SortBy>,
}

impl ProductFilter {
    /// Whether `product` satisfies every constraint.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        self.category.as_ref().is_none_or(|c| product.category == *c)
            && self
                .sub_category
                .as_ref()
                .is_none_or(|c| product.sub_category == *c)
            && self.bestseller.is_none_or(|b| product.bestseller == b)
            && self.search.as_ref().is_none_or(|needle| {
                product
                    .name
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            })
            && self.min_price.is_none_or(|min| product.price >= min)
            && self.max_price.is_none_or(|max| product.price <= max)
    }
}
