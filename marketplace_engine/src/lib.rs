//! Marketplace Engine
//!
//! The fulfilment and settlement core of a multi-vendor marketplace. It prices carts, stores orders, walks each order
//! item through seller approval, shipping and delivery, and settles money in both directions: refunds to buyers and
//! payouts to sellers.
//!
//! The library is divided into these main sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. You should never need to touch the database
//!    directly. The data types stored in it live in [`db_types`] and are public.
//! 2. The backend and collaborator contracts ([`traits`]). A storage backend implements [`MarketplaceDatabase`]; the
//!    payment processor and the shipping carrier are reached through [`traits::PaymentProcessor`] and
//!    [`traits::Carrier`].
//! 3. The public API ([`mod@mkt_api`]): [`CheckoutApi`], [`OrderFlowApi`], [`ShipmentApi`], [`RefundApi`] and
//!    [`PayoutApi`].
//! 4. Pure rules with no I/O: the money [`calculator`] and the status [`lifecycle`].
//!
//! Every successful state change emits an event. Subscribe to them with [`events::EventHooks`].
mod db;

pub mod calculator;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod lifecycle;
mod mkt_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use mkt_api::{
    checkout_api::{CheckoutApi, Quote},
    order_flow_api::OrderFlowApi,
    payout_api::PayoutApi,
    refund_api::RefundApi,
    shipment_api::ShipmentApi,
};
pub use traits::{CatalogManagement, MarketplaceDatabase, MarketplaceError, OrderManagement};
