mod carrier_status;
mod idempotency;

pub use carrier_status::shipment_status_from_carrier_code;
pub use idempotency::{idempotency_key, IdempotencyScope};
