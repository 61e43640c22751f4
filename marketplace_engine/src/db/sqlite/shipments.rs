use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewShipment, PickupDetails, Shipment, ShipmentStatus},
    traits::MarketplaceError,
};

pub async fn insert_shipment(shipment: NewShipment, conn: &mut SqliteConnection) -> Result<Shipment, sqlx::Error> {
    let saved: Shipment = sqlx::query_as(
        r#"
            INSERT INTO shipments (
                order_id,
                seller_id,
                carrier_shipment_id,
                tracking_number,
                weight,
                length,
                width,
                height,
                shipper_address,
                shipping_address,
                original_shipment_id,
                return_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(shipment.order_id)
    .bind(shipment.seller_id)
    .bind(shipment.carrier_shipment_id)
    .bind(shipment.tracking_number)
    .bind(shipment.package.weight)
    .bind(shipment.package.length)
    .bind(shipment.package.width)
    .bind(shipment.package.height)
    .bind(Json(shipment.shipper_address))
    .bind(Json(shipment.shipping_address))
    .bind(shipment.original_shipment_id)
    .bind(shipment.return_reason)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Shipment {} saved with tracking number {}", saved.id, saved.tracking_number);
    Ok(saved)
}

pub async fn fetch_shipment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Shipment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shipments WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Shipment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shipments WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

/// Moves the shipment from `expected` to `new`, replacing its pickup booking.
pub async fn update_status(
    id: i64,
    expected: ShipmentStatus,
    new: ShipmentStatus,
    pickup: Option<PickupDetails>,
    conn: &mut SqliteConnection,
) -> Result<Shipment, MarketplaceError> {
    let shipment: Option<Shipment> = sqlx::query_as(
        "UPDATE shipments SET status = $1, pickup = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND status = $4 \
         RETURNING *",
    )
    .bind(new)
    .bind(pickup.map(Json))
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    shipment.ok_or_else(|| MarketplaceError::Conflict(format!("Shipment {id} is no longer {expected}")))
}
