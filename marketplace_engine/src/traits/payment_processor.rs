use std::collections::HashMap;

use marketplace_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::RefundStatus;

#[derive(Debug, Clone, Error)]
pub enum PaymentProcessorError {
    #[error("The payment processor declined the request. {0}")]
    Declined(String),
    #[error("The payment processor has no record of {0}")]
    NotFound(String),
    #[error("The payment processor is unavailable. {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    Processing,
    Succeeded,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Cents,
    pub status: PaymentIntentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    pub amount: Cents,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    pub id: String,
    pub status: RefundStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// The seller's connected account
    pub destination_account_id: String,
    pub amount: Cents,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorTransfer {
    pub id: String,
}

/// The card processor that holds buyer charges and moves money out to sellers.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    /// Refunds part of the charge made against a payment intent.
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, PaymentProcessorError>;

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, PaymentProcessorError>;

    /// Transfers funds to a seller's connected account.
    async fn create_transfer(&self, request: TransferRequest) -> Result<ProcessorTransfer, PaymentProcessorError>;
}
