use log::debug;
use sqlx::{types::Json, SqliteConnection};

use super::order_items;
use crate::{
    db_types::{NewOrderRecord, Order, OrderItem},
    traits::MarketplaceError,
};

/// Inserts the order and all its items using the given connection. This is not atomic on its own. Embed the call in
/// a transaction and pass `&mut *tx` as the connection argument if you need atomicity.
pub async fn insert_order(
    order: NewOrderRecord,
    conn: &mut SqliteConnection,
) -> Result<(Order, Vec<OrderItem>), MarketplaceError> {
    if !order.totals.is_balanced() {
        return Err(MarketplaceError::ValidationError(format!(
            "Order totals do not add up: {:?}",
            order.totals
        )));
    }
    let t = order.totals;
    let saved: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                buyer_id,
                subtotal,
                retip_total,
                tax,
                platform_fee,
                shipping_cost,
                total_amount,
                shipping_address
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order.buyer_id)
    .bind(t.subtotal)
    .bind(t.retip_total)
    .bind(t.tax)
    .bind(t.platform_fee)
    .bind(t.shipping_cost)
    .bind(t.total)
    .bind(Json(order.shipping_address))
    .fetch_one(&mut *conn)
    .await?;
    let mut items = Vec::with_capacity(order.items.len());
    for item in order.items {
        items.push(order_items::insert_item(saved.id, item, conn).await?);
    }
    debug!("🗃️ Order {} saved with {} items and a total of {}", saved.id, items.len(), saved.total_amount);
    Ok((saved, items))
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Records the payment intent and flags the order and its items as paid.
pub async fn mark_paid(
    id: i64,
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let order: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_intent_id = $1, payment_completed = 1, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $2 RETURNING *",
    )
    .bind(payment_intent_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let order = order.ok_or(MarketplaceError::OrderNotFound(id))?;
    sqlx::query("UPDATE order_items SET payment_status = 1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(order)
}

/// Stores the most recent carrier references on the order.
pub async fn set_tracking(
    id: i64,
    tracking_number: &str,
    carrier_shipment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET tracking_number = $1, carrier_shipment_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $3",
    )
    .bind(tracking_number)
    .bind(carrier_shipment_id)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}
