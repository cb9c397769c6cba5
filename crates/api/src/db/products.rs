//! `PostgreSQL` product repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use toybox_core::{Price, ProductId};

use super::{PgStore, ProductStore, RepositoryError};
use crate::models::{NewProduct, Product, ProductFilter, SortBy};

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, sub_category, \
                               bestseller, images, sizes, created_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Price,
    category: String,
    sub_category: String,
    bestseller: bool,
    images: Vec<String>,
    sizes: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            sub_category: row.sub_category,
            bestseller: row.bestseller,
            images: row.images,
            sizes: row.sizes,
            created_at: row.created_at,
        }
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the search query for `filter`.
fn search_query(filter: &ProductFilter) -> QueryBuilder<'_, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

    if let Some(category) = &filter.category {
        query.push(" AND category = ").push_bind(category);
    }
    if let Some(sub_category) = &filter.sub_category {
        query.push(" AND sub_category = ").push_bind(sub_category);
    }
    if let Some(bestseller) = filter.bestseller {
        query.push(" AND bestseller = ").push_bind(bestseller);
    }
    if let Some(search) = &filter.search {
        query
            .push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    if let Some(min) = filter.min_price {
        query.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND price <= ").push_bind(max);
    }

    query.push(match filter.sort_by {
        Some(SortBy::PriceAsc) => " ORDER BY price ASC, created_at ASC, id ASC",
        Some(SortBy::PriceDesc) => " ORDER BY price DESC, created_at ASC, id ASC",
        Some(SortBy::Name) => " ORDER BY lower(name) ASC, created_at ASC, id ASC",
        None => " ORDER BY created_at ASC, id ASC",
    });

    query
}

#[async_trait]
impl ProductStore for PgStore {
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products
                (id, name, description, price, category, sub_category, bestseller, images, sizes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(ProductId::generate())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(&product.sub_category)
        .bind(product.bestseller)
        .bind(&product.images)
        .bind(&product.sizes)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.search_products(&ProductFilter::default()).await
    }

    async fn search_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut query = search_query(filter);
        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
