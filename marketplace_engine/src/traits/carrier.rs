use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Address, Package};

#[derive(Debug, Clone, Error)]
pub enum CarrierError {
    #[error("The carrier rejected the request: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("The carrier has no record of {0}")]
    NotFound(String),
    #[error("The carrier service is unavailable. {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub idempotency_key: String,
    pub shipper: Address,
    pub recipient: Address,
    pub package: Package,
    /// A reference printed on the label, e.g. the order id
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierShipment {
    pub shipment_id: String,
    pub tracking_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingActivity {
    pub status_code: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingInfo {
    /// The carrier's code for the current status of the parcel
    pub status_code: String,
    pub activities: Vec<TrackingActivity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    pub idempotency_key: String,
    pub address: Address,
    pub tracking_number: String,
    pub date: NaiveDate,
    pub ready_time: NaiveTime,
    pub close_time: NaiveTime,
}

/// A shipping provider that can print labels, report tracking status and book pickups.
///
/// Implementations talk to the provider's API. The engine wraps every call in a timeout, so implementations do not
/// need to enforce their own.
#[allow(async_fn_in_trait)]
pub trait Carrier: Clone {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<CarrierShipment, CarrierError>;

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingInfo, CarrierError>;

    /// Cancels a label. The carrier will not accept the parcel afterwards.
    async fn void_shipment(&self, shipment_id: &str, tracking_number: &str) -> Result<(), CarrierError>;

    /// Books a pickup, returning the carrier's pickup request number.
    async fn schedule_pickup(&self, request: PickupRequest) -> Result<String, CarrierError>;

    async fn cancel_pickup(&self, pickup_request_number: &str) -> Result<(), CarrierError>;
}
