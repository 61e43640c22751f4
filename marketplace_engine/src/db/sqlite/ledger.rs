use marketplace_common::Cents;
use sqlx::SqliteConnection;

use crate::db_types::{LedgerEntry, TransactionKind};

pub async fn insert_entry(
    order_id: i64,
    order_item_id: i64,
    kind: TransactionKind,
    amount: Cents,
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO transactions (order_id, order_item_id, kind, amount, external_id) VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(order_id)
    .bind(order_item_id)
    .bind(kind)
    .bind(amount)
    .bind(external_id)
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}
