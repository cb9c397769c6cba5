//! Catalog reads and admin product management.

use std::path::Path;

use futures::future::try_join_all;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use toybox_core::{Price, ProductId};

use crate::db::{RepositoryError, Store};
use crate::models::{NewProduct, Product, ProductFilter, SortBy};
use crate::services::assets::{AssetError, AssetHost, TempUpload};

/// Number of image slots on a product (`image1` through `image4`).
pub const MAX_IMAGES: usize = 4;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Bad product data or search parameters.
    #[error("{0}")]
    Validation(String),

    #[error("Product not found")]
    NotFound,

    /// Images were sent but no asset host is configured.
    #[error("image hosting is not configured")]
    AssetHostUnavailable,

    #[error("asset upload failed: {0}")]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Catalog search parameters as they arrive on the query string.
///
/// Every key is optional and blank values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub bestseller: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort_by: Option<String>,
}

impl SearchParams {
    /// Validate and convert into a store filter.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for unparseable values or an
    /// inverted price range.
    pub fn into_filter(self) -> Result<ProductFilter, CatalogError> {
        let bestseller = match non_blank(self.bestseller).as_deref() {
            None => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => {
                return Err(CatalogError::Validation(format!(
                    "bestseller must be true or false, got {other}"
                )));
            }
        };

        let min_price = parse_bound("minPrice", self.min_price)?;
        let max_price = parse_bound("maxPrice", self.max_price)?;
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            return Err(CatalogError::Validation(
                "minPrice cannot be greater than maxPrice".to_string(),
            ));
        }

        let sort_by = non_blank(self.sort_by)
            .map(|s| s.parse::<SortBy>())
            .transpose()
            .map_err(CatalogError::Validation)?;

        Ok(ProductFilter {
            category: non_blank(self.category),
            sub_category: non_blank(self.sub_category),
            bestseller,
            search: non_blank(self.search),
            min_price,
            max_price,
            sort_by,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_bound(field: &str, value: Option<String>) -> Result<Option<Price>, CatalogError> {
    non_blank(value)
        .map(|v| Price::parse(&v))
        .transpose()
        .map_err(|e| CatalogError::Validation(format!("{field}: {e}")))
}

/// Text fields of the admin product form.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    /// JSON array of size labels, e.g. `["S","M"]`.
    pub sizes: Option<String>,
    /// `"true"` marks a bestseller; anything else does not.
    pub bestseller: Option<String>,
}

impl ProductForm {
    /// Validate the form into a product with no images yet.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` naming the first bad field.
    pub fn validate(self) -> Result<NewProduct, CatalogError> {
        let name = required("name", self.name)?;
        let description = required("description", self.description)?;
        let category = required("category", self.category)?;
        let sub_category = required("subCategory", self.sub_category)?;

        let price = Price::parse(&required("price", self.price)?)
            .map_err(|e| CatalogError::Validation(format!("price: {e}")))?;

        let sizes = match non_blank(self.sizes) {
            None => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).map_err(|_| {
                CatalogError::Validation("sizes must be a JSON array of strings".to_string())
            })?,
        };

        Ok(NewProduct {
            name,
            description,
            price,
            category,
            sub_category,
            bestseller: self.bestseller.as_deref().map(str::trim) == Some("true"),
            images: Vec::new(),
            sizes,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, CatalogError> {
    non_blank(value).ok_or_else(|| CatalogError::Validation(format!("{field} is required")))
}

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// 1-based slot from the field name (`image2` is slot 2).
    pub slot: u8,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Map a multipart field name to its image slot.
    #[must_use]
    pub fn slot_for_field(field: &str) -> Option<u8> {
        let slot: u8 = field.strip_prefix("image")?.parse().ok()?;
        (1..=4).contains(&slot).then_some(slot)
    }
}

/// Catalog service.
pub struct CatalogService<'a> {
    store: &'a dyn Store,
    assets: Option<&'a dyn AssetHost>,
    upload_dir: &'a Path,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        assets: Option<&'a dyn AssetHost>,
        upload_dir: &'a Path,
    ) -> Self {
        Self {
            store,
            assets,
            upload_dir,
        }
    }

    /// All products in creation order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.list_products().await?)
    }

    /// A single product by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown or malformed ids.
    pub async fn get(&self, id: &str) -> Result<Product, CatalogError> {
        let id: ProductId = id.parse().map_err(|_| CatalogError::NotFound)?;
        self.store
            .product_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.search_products(filter).await?)
    }

    /// Validate, upload images, and insert a product.
    ///
    /// Nothing is uploaded when the form is invalid. Scratch copies of the
    /// images are removed before this returns.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for bad form data,
    /// `CatalogError::AssetHostUnavailable` or `CatalogError::Asset` when
    /// images cannot be stored.
    #[instrument(skip(self, form, images), fields(image_count = images.len()))]
    pub async fn add(
        &self,
        form: ProductForm,
        mut images: Vec<ImageUpload>,
    ) -> Result<Product, CatalogError> {
        let mut product = form.validate()?;

        images.sort_by_key(|image| image.slot);
        images.dedup_by_key(|image| image.slot);
        if images.len() > MAX_IMAGES {
            return Err(CatalogError::Validation(format!(
                "At most {MAX_IMAGES} images are allowed"
            )));
        }

        if !images.is_empty() {
            let assets = self.assets.ok_or(CatalogError::AssetHostUnavailable)?;

            let mut spooled = Vec::with_capacity(images.len());
            for image in &images {
                spooled.push(
                    TempUpload::write(self.upload_dir, image.file_name.as_deref(), &image.bytes)
                        .await?,
                );
            }

            // `spooled` outlives the uploads and removes every scratch file on drop
            product.images =
                try_join_all(spooled.iter().map(|file| assets.upload_image(file.path()))).await?;
        }

        let product = self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, "Product added");
        Ok(product)
    }

    /// Delete a product. Existing orders keep their item snapshots.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if nothing was deleted.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<(), CatalogError> {
        let id: ProductId = id.parse().map_err(|_| CatalogError::NotFound)?;
        if !self.store.delete_product(id).await? {
            return Err(CatalogError::NotFound);
        }
        tracing::info!(product_id = %id, "Product removed");
        Ok(())
    }
}
