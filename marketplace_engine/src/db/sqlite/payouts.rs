use sqlx::SqliteConnection;

use crate::db_types::{NewPayout, Payout};

/// Stores a payout. The row's `gross_amount` is the item total, so `net = gross - commission - processor fee` holds
/// exactly.
pub async fn insert_payout(payout: NewPayout, conn: &mut SqliteConnection) -> Result<Payout, sqlx::Error> {
    let b = payout.breakdown;
    sqlx::query_as(
        r#"
            INSERT INTO payouts (
                order_item_id,
                seller_id,
                gross_amount,
                commission_amount,
                processor_fee_amount,
                net_amount,
                external_transfer_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(payout.order_item_id)
    .bind(payout.seller_id)
    .bind(b.item_total)
    .bind(b.commission)
    .bind(b.processor_fee)
    .bind(b.net_payout)
    .bind(payout.external_transfer_id)
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_item(item_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE order_item_id = $1 ORDER BY id").bind(item_id).fetch_all(conn).await
}
