//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions for the marketplace engine.
//!
//! All of them are plain functions (rather than stateful structs) that accept a `&mut SqliteConnection` argument.
//! Callers can obtain a connection from a pool, or open a transaction when several writes must land together, and
//! call through to the functions without any other changes. [`SqliteDatabase`] does the latter for every trait
//! method that mutates state.
mod sqlite_impl;

pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod order_items;
pub mod orders;
pub mod payouts;
pub mod refunds;
pub mod shipments;

use std::env;

use log::info;
pub use sqlite_impl::SqliteDatabase;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";

pub fn db_url() -> String {
    let result = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ MKT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
