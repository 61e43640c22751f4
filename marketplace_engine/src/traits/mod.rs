//! # Backend and collaborator contracts
//!
//! This module defines the interfaces the marketplace engine depends on. The engine's APIs are generic over them, so
//! storage and third-party services can be swapped out, and mocked in tests.
//!
//! ## Storage
//! * [`MarketplaceDatabase`] defines every state-changing operation. Each one is a single atomic transaction.
//! * [`OrderManagement`] provides read-only queries for orders, items, shipments, refunds and payouts.
//! * [`CatalogManagement`] manages sellers, listings, products and the commission table.
//!
//! ## External services
//! * [`PaymentProcessor`] refunds charges, checks payment intents and transfers funds to sellers.
//! * [`Carrier`] prints and voids labels, reports tracking status and books pickups.
mod carrier;
mod catalog_management;
mod data_objects;
mod errors;
mod marketplace_database;
mod order_management;
mod payment_processor;

pub use carrier::{
    Carrier,
    CarrierError,
    CarrierShipment,
    PickupRequest,
    ShipmentRequest,
    TrackingActivity,
    TrackingInfo,
};
pub use catalog_management::CatalogManagement;
pub use data_objects::{
    ItemTransition,
    PayoutRecord,
    PlacedOrder,
    RefundRecord,
    ReturnRecord,
    ShipmentUpdate,
    StockChange,
};
pub use errors::{ErrorKind, MarketplaceError};
pub use marketplace_database::MarketplaceDatabase;
pub use order_management::OrderManagement;
pub use payment_processor::{
    PaymentIntent,
    PaymentIntentStatus,
    PaymentProcessor,
    PaymentProcessorError,
    ProcessorRefund,
    ProcessorTransfer,
    RefundRequest,
    TransferRequest,
};
