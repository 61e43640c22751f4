//! Order item persistence.
//!
//! Status updates here are conditional on the status the caller read earlier. If another request changed the item
//! in the meantime, no row matches and [`MarketplaceError::Conflict`] is returned, so the caller's transaction rolls
//! back instead of overwriting the other change.
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrderItem, OrderItem, OrderItemStatus},
    traits::MarketplaceError,
};

pub async fn insert_item(
    order_id: i64,
    item: NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_items (
                order_id,
                product_id,
                seller_id,
                title,
                category,
                quantity,
                unit_price,
                retip_added,
                retip_price
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.seller_id)
    .bind(item.title)
    .bind(item.category)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.retip_added)
    .bind(item.retip_price)
    .fetch_one(conn)
    .await
}

pub async fn fetch_item(id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_items_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_items_for_shipment(
    shipment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE shipment_id = $1 ORDER BY id")
        .bind(shipment_id)
        .fetch_all(conn)
        .await
}

fn conflict(id: i64, expected: OrderItemStatus) -> MarketplaceError {
    MarketplaceError::Conflict(format!("Order item {id} is no longer {expected}"))
}

/// Moves the item from `expected` to `new`.
pub async fn update_status(
    id: i64,
    expected: OrderItemStatus,
    new: OrderItemStatus,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, MarketplaceError> {
    let item: Option<OrderItem> = sqlx::query_as(
        "UPDATE order_items SET order_status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND order_status = $3 \
         RETURNING *",
    )
    .bind(new)
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Order item {id}: {expected} -> {new} ({})", if item.is_some() { "applied" } else { "no match" });
    item.ok_or_else(|| conflict(id, expected))
}

/// Links an approved, unassigned item to a shipment and moves it to `processing`.
pub async fn assign_to_shipment(
    id: i64,
    shipment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, MarketplaceError> {
    let item: Option<OrderItem> = sqlx::query_as(
        "UPDATE order_items SET order_status = $1, shipment_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND \
         order_status = $4 AND shipment_id IS NULL RETURNING *",
    )
    .bind(OrderItemStatus::Processing)
    .bind(shipment_id)
    .bind(id)
    .bind(OrderItemStatus::Approved)
    .fetch_optional(conn)
    .await?;
    item.ok_or_else(|| conflict(id, OrderItemStatus::Approved))
}

/// Unlinks the item from its shipment and hands it back to the seller as `approved`.
pub async fn release_from_shipment(
    id: i64,
    expected: OrderItemStatus,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, MarketplaceError> {
    let item: Option<OrderItem> = sqlx::query_as(
        "UPDATE order_items SET order_status = $1, shipment_id = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         AND order_status = $3 RETURNING *",
    )
    .bind(OrderItemStatus::Approved)
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    item.ok_or_else(|| conflict(id, expected))
}

/// Sets `seller_paid`. Fails with [`MarketplaceError::AlreadyPaid`] if it was already set.
pub async fn mark_seller_paid(id: i64, conn: &mut SqliteConnection) -> Result<OrderItem, MarketplaceError> {
    let item: Option<OrderItem> = sqlx::query_as(
        "UPDATE order_items SET seller_paid = 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND seller_paid = 0 \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    item.ok_or(MarketplaceError::AlreadyPaid(id))
}
