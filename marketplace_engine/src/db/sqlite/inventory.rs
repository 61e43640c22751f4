//! Product stock movements.
//!
//! Both functions are meant to run inside the same transaction as the order item status change that triggers them.
//! A product's quantity can never go negative: a decrement that would overdraw it fails without changing anything.
//!
//! Listing stock is a coarse counter of in-stock products. It drops by one when a product's quantity reaches exactly
//! zero, and rises by one when a restore brings a product back from zero.
use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::traits::{MarketplaceError, StockChange};

/// Takes `quantity` units of the product out of stock.
pub async fn decrement(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<StockChange, MarketplaceError> {
    if quantity < 1 {
        return Err(MarketplaceError::ValidationError(format!("Cannot decrement stock by {quantity}")));
    }
    let updated: Option<(i64, Option<i64>)> = sqlx::query_as(
        "UPDATE products SET quantity = quantity - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND quantity >= \
         $1 RETURNING quantity, listing_id",
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some((new_quantity, listing_id)) = updated else {
        let available: Option<i64> = sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match available {
            Some(available) => MarketplaceError::InsufficientStock { product_id, requested: quantity, available },
            None => MarketplaceError::ProductNotFound(product_id),
        });
    };
    let mut change = StockChange {
        product_id,
        old_quantity: new_quantity + quantity,
        new_quantity,
        listing_id,
        listing_delta: 0,
    };
    if new_quantity == 0 {
        if let Some(listing_id) = listing_id {
            change.listing_delta = adjust_listing_stock(listing_id, -1, conn).await?;
        }
    }
    debug!("🗃️ Product {product_id} stock {} -> {}", change.old_quantity, change.new_quantity);
    Ok(change)
}

/// Puts `quantity` units of the product back into stock.
pub async fn restore(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<StockChange, MarketplaceError> {
    if quantity < 1 {
        return Err(MarketplaceError::ValidationError(format!("Cannot restore stock by {quantity}")));
    }
    let updated: Option<(i64, Option<i64>)> = sqlx::query_as(
        "UPDATE products SET quantity = quantity + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING \
         quantity, listing_id",
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    let (new_quantity, listing_id) = updated.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    let old_quantity = new_quantity - quantity;
    let mut change = StockChange { product_id, old_quantity, new_quantity, listing_id, listing_delta: 0 };
    if old_quantity == 0 {
        if let Some(listing_id) = listing_id {
            change.listing_delta = adjust_listing_stock(listing_id, 1, conn).await?;
        }
    }
    debug!("🗃️ Product {product_id} stock {old_quantity} -> {new_quantity}");
    Ok(change)
}

/// Moves the listing counter by `delta`, returning the delta actually applied. The counter is never taken below
/// zero.
async fn adjust_listing_stock(listing_id: i64, delta: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM product_listings WHERE id = $1")
        .bind(listing_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(stock) = stock else {
        warn!("🗃️ Listing {listing_id} does not exist. Its stock counter was not adjusted.");
        return Ok(0);
    };
    if stock + delta < 0 {
        warn!("🗃️ Listing {listing_id} stock counter is already {stock}. Not applying {delta}.");
        return Ok(0);
    }
    sqlx::query("UPDATE product_listings SET stock = stock + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(delta)
        .bind(listing_id)
        .execute(conn)
        .await?;
    debug!("🗃️ Listing {listing_id} stock {stock} -> {}", stock + delta);
    Ok(delta)
}
