use std::time::Duration;

use marketplace_common::Cents;
use thiserror::Error;

use crate::{
    db_types::OrderItemStatus,
    traits::{CarrierError, PaymentProcessorError},
};

/// The broad category a [`MarketplaceError`] falls into.
///
/// Callers use the kind to decide whether a retry is safe: `Validation`, `NotFound`, `IllegalState` and
/// `InsufficientStock` errors are raised before any external call is made, and `ExternalService` errors leave local
/// state untouched. A `ReconciliationGap` is the one unsafe class and needs an audit against the external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    IllegalState,
    InsufficientStock,
    ExternalService,
    ReconciliationGap,
    Database,
}

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Invalid input. {0}")]
    ValidationError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested order item {0} does not exist")]
    OrderItemNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested seller {0} does not exist")]
    SellerNotFound(i64),
    #[error("The requested shipment {0} does not exist")]
    ShipmentNotFound(i64),
    #[error("No commission rate is configured for category '{0}'")]
    CommissionNotFound(String),
    #[error("Order items cannot move from {from} to {to}")]
    IllegalTransition { from: OrderItemStatus, to: OrderItemStatus },
    #[error("Order item {0} has already been refunded")]
    AlreadyRefunded(i64),
    #[error("The seller has already been paid for order item {0}")]
    AlreadyPaid(i64),
    #[error("Shipment {0} cannot be voided in its current state ({1})")]
    IllegalVoid(i64, String),
    #[error("Cannot {action} shipment {id} while it is {status}")]
    IllegalShipmentState { id: i64, action: &'static str, status: String },
    #[error("Product {product_id} has {available} units in stock, but {requested} were requested")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("The net payout for order item {0} would be {1}, which is not positive")]
    NonPositivePayout(i64, Cents),
    #[error("Order {0} has no payment reference")]
    MissingPaymentReference(i64),
    #[error("Payment for order {0} has not been completed")]
    PaymentNotCompleted(i64),
    #[error("Order item {0} is {1}, so the seller cannot be paid yet")]
    ItemNotPayable(i64, OrderItemStatus),
    #[error("Seller {0} has no payout account")]
    MissingPayoutAccount(i64),
    #[error("Carrier error. {0}")]
    CarrierError(#[from] CarrierError),
    #[error("Payment processor error. {0}")]
    PaymentProcessorError(#[from] PaymentProcessorError),
    #[error("The call to {0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
    #[error("The record was modified concurrently. {0}")]
    Conflict(String),
    #[error("External side effect {external_id} succeeded, but could not be recorded locally. {reason}")]
    ReconciliationGap { external_id: String, reason: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl MarketplaceError {
    pub fn kind(&self) -> ErrorKind {
        use MarketplaceError::*;
        match self {
            ValidationError(_) => ErrorKind::Validation,
            OrderNotFound(_)
            | OrderItemNotFound(_)
            | ProductNotFound(_)
            | SellerNotFound(_)
            | ShipmentNotFound(_)
            | CommissionNotFound(_) => ErrorKind::NotFound,
            IllegalTransition { .. }
            | AlreadyRefunded(_)
            | AlreadyPaid(_)
            | IllegalVoid(..)
            | IllegalShipmentState { .. }
            | NonPositivePayout(..)
            | MissingPaymentReference(_)
            | PaymentNotCompleted(_)
            | ItemNotPayable(..)
            | MissingPayoutAccount(_)
            | Conflict(_) => ErrorKind::IllegalState,
            InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CarrierError(_) | PaymentProcessorError(_) | Timeout(..) => ErrorKind::ExternalService,
            ReconciliationGap { .. } => ErrorKind::ReconciliationGap,
            DatabaseError(_) => ErrorKind::Database,
        }
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
