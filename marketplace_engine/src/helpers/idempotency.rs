use std::fmt::Write;

use blake2::{Blake2b512, Digest};

/// The kind of external side effect an idempotency key protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyScope {
    Refund,
    Transfer,
    Shipment,
    ReturnShipment,
    Pickup,
}

impl IdempotencyScope {
    fn domain(&self) -> &'static str {
        match self {
            Self::Refund => "refund",
            Self::Transfer => "transfer",
            Self::Shipment => "shipment",
            Self::ReturnShipment => "return",
            Self::Pickup => "pickup",
        }
    }
}

/// Derives a deterministic idempotency key for an external call from the internal id it acts on.
///
/// Retrying an operation for the same entity yields the same key, so the external system can discard the duplicate.
/// The key has the form `mkt-{scope}-{32 hex chars}`, e.g. `mkt-refund-6d1c...`.
pub fn idempotency_key(scope: IdempotencyScope, entity_id: &str) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(b"marketplace.idempotency.v1:");
    hasher.update(scope.domain().as_bytes());
    hasher.update(b":");
    hasher.update(entity_id.as_bytes());
    let digest = hasher.finalize();
    let mut key = format!("mkt-{}-", scope.domain());
    for byte in &digest[..16] {
        let _ = write!(key, "{byte:02x}");
    }
    key
}
