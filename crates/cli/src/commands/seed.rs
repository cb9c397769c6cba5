//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! - name: Cotton Tee
//!   description: Relaxed fit, heavyweight cotton.
//!   price: "499.00"
//!   category: Men
//!   subCategory: Topwear
//!   sizes: [S, M, L]
//!   bestseller: true
//!   images:
//!     - https://res.cloudinary.com/demo/image/upload/tee.jpg
//! ```
//!
//! Prices are quoted so they parse as exact decimals. Images must already be
//! hosted; nothing is uploaded.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use toybox_api::db::{PgStore, ProductStore, RepositoryError};
use toybox_api::models::NewProduct;
use toybox_core::Price;

use super::{CommandError, connect};

const MAX_IMAGES: usize = 4;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One product entry in the seed file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedProduct {
    name: String,
    description: String,
    price: Price,
    category: String,
    sub_category: String,
    #[serde(default)]
    sizes: Vec<String>,
    #[serde(default)]
    bestseller: bool,
    #[serde(default)]
    images: Vec<String>,
}

impl SeedProduct {
    fn validate(self) -> Result<NewProduct, String> {
        for (field, value) in [
            ("name", &self.name),
            ("description", &self.description),
            ("category", &self.category),
            ("subCategory", &self.sub_category),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        if !self.price.is_positive() {
            return Err("price must be greater than zero".to_string());
        }
        if self.images.len() > MAX_IMAGES {
            return Err(format!("at most {MAX_IMAGES} images are allowed"));
        }

        Ok(NewProduct {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price: self.price,
            category: self.category.trim().to_string(),
            sub_category: self.sub_category.trim().to_string(),
            bestseller: self.bestseller,
            images: self.images,
            sizes: self.sizes,
        })
    }
}

/// Parse and validate every entry, reporting all problems at once.
fn parse_products(content: &str) -> Result<Vec<NewProduct>, SeedError> {
    let entries: Vec<SeedProduct> = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(entries.len());
    let mut errors = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry.name.clone();
        match entry.validate() {
            Ok(product) => products.push(product),
            Err(e) => {
                error!("  - entry {index} ({name}): {e}");
                errors += 1;
            }
        }
    }

    if errors > 0 {
        return Err(SeedError::Invalid(errors));
    }
    Ok(products)
}

/// Insert every product in the file.
///
/// The file is validated in full before connecting to the database.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_string()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_products(&content)?;
    info!(products = products.len(), "Configuration validated successfully");

    let store = PgStore::new(connect().await?);

    for product in &products {
        let created = store.insert_product(product).await?;
        info!(product_id = %created.id, name = %created.name, "Inserted product");
    }

    info!("Seeding complete! {} products inserted", products.len());
    Ok(())
}
