use sqlx::SqliteConnection;

use crate::db_types::{NewRefund, Refund};

pub async fn insert_refund(refund: NewRefund, conn: &mut SqliteConnection) -> Result<Refund, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO refunds (order_item_id, external_refund_id, amount, reason, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(refund.order_item_id)
    .bind(refund.external_refund_id)
    .bind(refund.amount)
    .bind(refund.reason)
    .bind(refund.status)
    .bind(refund.notes)
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_item(item_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE order_item_id = $1 ORDER BY id").bind(item_id).fetch_all(conn).await
}
