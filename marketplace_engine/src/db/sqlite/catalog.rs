use std::collections::HashMap;

use log::debug;
use marketplace_common::Rate;
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Commission, NewListing, NewProduct, NewSeller, Product, ProductListing, Seller},
    traits::MarketplaceError,
};

pub async fn insert_seller(seller: NewSeller, conn: &mut SqliteConnection) -> Result<Seller, MarketplaceError> {
    let seller: Seller =
        sqlx::query_as("INSERT INTO sellers (name, address, payout_account_id) VALUES ($1, $2, $3) RETURNING *")
            .bind(seller.name)
            .bind(Json(seller.address))
            .bind(seller.payout_account_id)
            .fetch_one(conn)
            .await?;
    debug!("🗃️ Seller '{}' saved with id {}", seller.name, seller.id);
    Ok(seller)
}

pub async fn fetch_seller(id: i64, conn: &mut SqliteConnection) -> Result<Option<Seller>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM sellers WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn insert_listing(
    listing: NewListing,
    conn: &mut SqliteConnection,
) -> Result<ProductListing, MarketplaceError> {
    if listing.stock < 0 {
        return Err(MarketplaceError::ValidationError("Listing stock cannot be negative".into()));
    }
    let listing =
        sqlx::query_as("INSERT INTO product_listings (seller_id, title, stock) VALUES ($1, $2, $3) RETURNING *")
            .bind(listing.seller_id)
            .bind(listing.title)
            .bind(listing.stock)
            .fetch_one(conn)
            .await?;
    Ok(listing)
}

pub async fn fetch_listing(id: i64, conn: &mut SqliteConnection) -> Result<Option<ProductListing>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM product_listings WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    if product.quantity < 0 || product.price.is_negative() || product.retip_price.is_negative() {
        return Err(MarketplaceError::ValidationError(format!(
            "Product '{}' has a negative price or quantity",
            product.title
        )));
    }
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (
                seller_id,
                listing_id,
                title,
                category,
                price,
                retip_price,
                requires_retipping,
                quantity,
                weight,
                length,
                width,
                height
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(product.seller_id)
    .bind(product.listing_id)
    .bind(product.title)
    .bind(product.category)
    .bind(product.price)
    .bind(product.retip_price)
    .bind(product.requires_retipping)
    .bind(product.quantity)
    .bind(product.package.weight)
    .bind(product.package.length)
    .bind(product.package.width)
    .bind(product.package.height)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product '{}' saved with id {} and {} units in stock", product.title, product.id, product.quantity);
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_products(ids: &[i64], conn: &mut SqliteConnection) -> Result<HashMap<i64, Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    builder.push(")");
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

pub async fn set_product_availability(
    id: i64,
    is_active: bool,
    is_archived: bool,
    conn: &mut SqliteConnection,
) -> Result<Product, MarketplaceError> {
    let product: Option<Product> = sqlx::query_as(
        "UPDATE products SET is_active = $1, is_archived = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 \
         RETURNING *",
    )
    .bind(is_active)
    .bind(is_archived)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    product.ok_or(MarketplaceError::ProductNotFound(id))
}

pub async fn upsert_commission(
    category: &str,
    rate: Rate,
    conn: &mut SqliteConnection,
) -> Result<Commission, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO commissions (category, rate_bps) VALUES ($1, $2)
            ON CONFLICT (category) DO UPDATE SET rate_bps = excluded.rate_bps, updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(category)
    .bind(rate)
    .fetch_one(conn)
    .await
}

pub async fn fetch_commission(category: &str, conn: &mut SqliteConnection) -> Result<Option<Commission>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM commissions WHERE category = $1").bind(category).fetch_optional(conn).await
}

pub async fn fetch_commissions(conn: &mut SqliteConnection) -> Result<Vec<Commission>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM commissions ORDER BY category").fetch_all(conn).await
}
