//! The public API of the marketplace engine.
//!
//! Each API is generic over its storage backend and the external collaborators it calls, so it can run against the
//! SQLite backend in production and mocks in tests.
pub mod checkout_api;
mod external;
pub mod order_flow_api;
pub mod payout_api;
pub mod refund_api;
pub mod shipment_api;
