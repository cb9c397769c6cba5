//! Catalog route handlers.

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::routes::{ApiResponse, Message};
use crate::services::{CatalogService, ImageUpload, ProductForm, SearchParams};
use crate::state::AppState;

/// Product removal request.
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ProductsBody {
    pub count: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.store(), state.assets(), &state.config().upload_dir)
}

/// Search the catalog.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<impl IntoResponse> {
    let filter = params.into_filter()?;
    let products = catalog(&state).search(&filter).await?;

    Ok(ApiResponse::ok(ProductsBody {
        count: products.len(),
        products,
    }))
}

/// Every product.
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let products = catalog(&state).list().await?;

    Ok(ApiResponse::ok(ProductsBody {
        count: products.len(),
        products,
    }))
}

/// One product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let product = catalog(&state).get(&id).await?;
    Ok(ApiResponse::ok(ProductBody { product }))
}

/// Create a product from a multipart form.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = ProductForm::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if let Some(slot) = ImageUpload::slot_for_field(&name) {
            let file_name = field.file_name().map(str::to_owned);
            let bytes = field.bytes().await?;
            // Browsers send empty parts for unused file inputs
            if !bytes.is_empty() {
                images.push(ImageUpload {
                    slot,
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let target = match name.as_str() {
            "name" => &mut form.name,
            "description" => &mut form.description,
            "price" => &mut form.price,
            "category" => &mut form.category,
            "subCategory" => &mut form.sub_category,
            "sizes" => &mut form.sizes,
            "bestseller" => &mut form.bestseller,
            _ => continue,
        };
        *target = Some(field.text().await?);
    }

    let product = catalog(&state).add(form, images).await?;

    Ok(ApiResponse::ok(ProductBody { product }))
}

/// Delete a product.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %req.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(req): ApiJson<RemoveRequest>,
) -> Result<impl IntoResponse> {
    catalog(&state).remove(&req.id).await?;

    Ok(ApiResponse::ok(Message {
        message: "Product removed",
    }))
}
