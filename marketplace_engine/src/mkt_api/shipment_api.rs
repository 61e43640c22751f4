//! The shipment lifecycle: labels, tracking, pickups, voids and returns.
//!
//! The carrier is always called before anything is written locally. If the carrier call fails or times out, local
//! state is untouched and the operation can simply be retried. If the carrier call succeeds but the local write
//! fails, the API tries to undo the carrier side effect (void the label, cancel the pickup). Only when that undo also
//! fails is a [`MarketplaceError::ReconciliationGap`] reported.
use std::{fmt::Debug, time::Duration};

use chrono::{NaiveDate, NaiveTime};
use log::*;

use super::external::call_with_timeout;
use crate::{
    config::EngineConfig,
    db_types::{NewShipment, OrderItem, OrderItemStatus, Package, PickupDetails, Shipment, ShipmentStatus},
    events::{EventProducers, ItemStatusChangedEvent, ShipmentUpdatedEvent},
    helpers::{idempotency_key, shipment_status_from_carrier_code, IdempotencyScope},
    traits::{
        Carrier,
        CarrierShipment,
        ItemTransition,
        MarketplaceDatabase,
        MarketplaceError,
        PickupRequest,
        ReturnRecord,
        ShipmentRequest,
        ShipmentUpdate,
    },
};

pub struct ShipmentApi<B, C> {
    db: B,
    carrier: C,
    timeout: Duration,
    compensate_failures: bool,
    producers: EventProducers,
}

impl<B, C> Debug for ShipmentApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShipmentApi")
    }
}

impl<B, C> ShipmentApi<B, C> {
    pub fn new(db: B, carrier: C, config: &EngineConfig, producers: EventProducers) -> Self {
        Self {
            db,
            carrier,
            timeout: config.carrier_timeout,
            compensate_failures: config.compensate_failed_shipments,
            producers,
        }
    }
}

impl<B, C> ShipmentApi<B, C>
where
    B: MarketplaceDatabase,
    C: Carrier,
{
    /// Ships every approved, unshipped item the seller has in the order as a single parcel.
    ///
    /// The parcel weight is the sum of the item weights (times quantity) and each dimension is the largest of any
    /// item. On success the items move to `processing`.
    pub async fn create_shipment(
        &self,
        order_id: i64,
        seller_id: i64,
    ) -> Result<(Shipment, Vec<ItemTransition>), MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let seller = self.db.fetch_seller(seller_id).await?.ok_or(MarketplaceError::SellerNotFound(seller_id))?;
        let items = self
            .db
            .fetch_order_items(order_id)
            .await?
            .into_iter()
            .filter(|i| {
                i.seller_id == seller_id && i.order_status == OrderItemStatus::Approved && i.shipment_id.is_none()
            })
            .collect::<Vec<OrderItem>>();
        if items.is_empty() {
            return Err(MarketplaceError::ValidationError(format!(
                "Seller {seller_id} has no approved items to ship in order {order_id}"
            )));
        }
        let item_ids = items.iter().map(|i| i.id).collect::<Vec<_>>();
        let products = self.db.fetch_products(&items.iter().map(|i| i.product_id).collect::<Vec<_>>()).await?;
        let package = Package::aggregate(
            items.iter().filter_map(|i| products.get(&i.product_id).map(|p| (p.package(), i.quantity))),
        );
        // A voided label must never be replayed, so every earlier cancelled shipment starts a new attempt
        let attempt = self
            .db
            .fetch_shipments_for_order(order_id)
            .await?
            .iter()
            .filter(|s| s.seller_id == seller_id && s.status == ShipmentStatus::Cancelled && !s.is_return())
            .count();
        let key_source = format!("{order_id}:{seller_id}:{attempt}:{item_ids:?}");
        let request = ShipmentRequest {
            idempotency_key: idempotency_key(IdempotencyScope::Shipment, &key_source),
            shipper: seller.address.0.clone(),
            recipient: order.shipping_address.0.clone(),
            package,
            reference: format!("order-{order_id}"),
        };
        let label = self.create_label(request).await?;
        let new_shipment = NewShipment {
            order_id,
            seller_id,
            carrier_shipment_id: label.shipment_id.clone(),
            tracking_number: label.tracking_number.clone(),
            package,
            shipper_address: seller.address.0,
            shipping_address: order.shipping_address.0,
            original_shipment_id: None,
            return_reason: None,
        };
        let (shipment, transitions) = match self.db.insert_shipment(new_shipment, &item_ids).await {
            Ok(saved) => saved,
            Err(e) => return Err(self.compensate_label(&label, e).await),
        };
        info!(
            "🚚️ Shipment {} created for order {order_id}, seller {seller_id}. Tracking number {}",
            shipment.id, shipment.tracking_number
        );
        self.notify_items(&transitions).await;
        Ok((shipment, transitions))
    }

    /// Polls the carrier for the shipment's tracking status and applies it.
    pub async fn track_and_update(&self, shipment_id: i64) -> Result<ShipmentUpdate, MarketplaceError> {
        let shipment = self.fetch_shipment(shipment_id).await?;
        let tracking = call_with_timeout(
            "carrier.track_shipment",
            self.timeout,
            self.carrier.track_shipment(&shipment.tracking_number),
        )
        .await?;
        trace!("🚚️ Tracking for {}: {} activities", shipment.tracking_number, tracking.activities.len());
        self.apply_carrier_code(shipment, &tracking.status_code).await
    }

    /// Applies a status code pushed by the carrier, e.g. from a webhook.
    pub async fn apply_carrier_status(&self, shipment_id: i64, code: &str) -> Result<ShipmentUpdate, MarketplaceError> {
        let shipment = self.fetch_shipment(shipment_id).await?;
        self.apply_carrier_code(shipment, code).await
    }

    async fn apply_carrier_code(&self, shipment: Shipment, code: &str) -> Result<ShipmentUpdate, MarketplaceError> {
        match shipment_status_from_carrier_code(code) {
            Some(status) => self.apply_status(shipment.id, status).await,
            None => {
                warn!("🚚️ Unknown carrier status code '{code}' for shipment {}. Ignoring it.", shipment.id);
                Ok(ShipmentUpdate { previous: shipment.status, shipment, items: vec![] })
            },
        }
    }

    /// Moves the shipment to `status` if that is forward of where it is now, cascading to its items. Regressions and
    /// duplicates are ignored.
    pub async fn apply_status(
        &self,
        shipment_id: i64,
        status: ShipmentStatus,
    ) -> Result<ShipmentUpdate, MarketplaceError> {
        let update = self.db.apply_shipment_status(shipment_id, status).await?;
        if update.changed() {
            info!("🚚️ Shipment {shipment_id} is now {} (was {})", update.shipment.status, update.previous);
            self.notify_shipment(&update).await;
        } else {
            debug!("🚚️ Shipment {shipment_id} stays {}. The {status} event was not applied.", update.previous);
        }
        Ok(update)
    }

    /// Cancels the shipment's label (and pickup, if one is booked) and hands its items back to the seller as
    /// `approved`. Stock is not touched, since the items are still sold.
    ///
    /// Fails with [`MarketplaceError::IllegalVoid`] once the parcel is moving through the carrier network.
    pub async fn void_shipment(&self, shipment_id: i64) -> Result<ShipmentUpdate, MarketplaceError> {
        let mut shipment = self.fetch_shipment(shipment_id).await?;
        if !shipment.status.is_voidable() {
            return Err(MarketplaceError::IllegalVoid(shipment_id, shipment.status.to_string()));
        }
        if let Some(pickup) = shipment.pickup().cloned() {
            call_with_timeout(
                "carrier.cancel_pickup",
                self.timeout,
                self.carrier.cancel_pickup(&pickup.request_number),
            )
            .await?;
            // The pickup is gone at the carrier, so it must be gone locally before the label is touched
            shipment = self.db.clear_pickup(shipment_id).await.map_err(|e| {
                error!(
                    "🚚️ RECONCILIATION NEEDED. Pickup {} for shipment {shipment_id} was cancelled at the carrier but \
                     is still recorded. {e}",
                    pickup.request_number
                );
                MarketplaceError::ReconciliationGap {
                    external_id: pickup.request_number.clone(),
                    reason: e.to_string(),
                }
            })?;
            debug!("🚚️ Pickup {} for shipment {shipment_id} cancelled", pickup.request_number);
        }
        call_with_timeout(
            "carrier.void_shipment",
            self.timeout,
            self.carrier.void_shipment(&shipment.carrier_shipment_id, &shipment.tracking_number),
        )
        .await?;
        let update = self.db.void_shipment(shipment_id).await.map_err(|e| {
            error!(
                "🚚️ RECONCILIATION NEEDED. Label {} for shipment {shipment_id} was voided at the carrier but the \
                 shipment could not be updated. {e}",
                shipment.carrier_shipment_id
            );
            MarketplaceError::ReconciliationGap {
                external_id: shipment.carrier_shipment_id.clone(),
                reason: e.to_string(),
            }
        })?;
        info!("🚚️ Shipment {shipment_id} voided. {} items returned to the seller", update.items.len());
        self.notify_shipment(&update).await;
        Ok(update)
    }

    /// Books a carrier pickup at the seller's address.
    pub async fn schedule_pickup(
        &self,
        shipment_id: i64,
        date: NaiveDate,
        ready_time: NaiveTime,
        close_time: NaiveTime,
    ) -> Result<Shipment, MarketplaceError> {
        if ready_time >= close_time {
            return Err(MarketplaceError::ValidationError(format!(
                "Pickup window {ready_time}-{close_time} is empty"
            )));
        }
        let shipment = self.fetch_shipment(shipment_id).await?;
        if !matches!(shipment.status, ShipmentStatus::Pending | ShipmentStatus::Created) {
            return Err(MarketplaceError::IllegalShipmentState {
                id: shipment_id,
                action: "schedule a pickup for",
                status: shipment.status.to_string(),
            });
        }
        let request = PickupRequest {
            idempotency_key: idempotency_key(IdempotencyScope::Pickup, &format!("{shipment_id}:{date}")),
            address: shipment.shipper_address.0.clone(),
            tracking_number: shipment.tracking_number.clone(),
            date,
            ready_time,
            close_time,
        };
        let request_number =
            call_with_timeout("carrier.schedule_pickup", self.timeout, self.carrier.schedule_pickup(request)).await?;
        let pickup = PickupDetails { request_number: request_number.clone(), date, ready_time, close_time };
        match self.db.record_pickup(shipment_id, pickup).await {
            Ok(shipment) => {
                info!("🚚️ Pickup {request_number} booked for shipment {shipment_id} on {date}");
                Ok(shipment)
            },
            Err(e) => {
                let undo = call_with_timeout(
                    "carrier.cancel_pickup",
                    self.timeout,
                    self.carrier.cancel_pickup(&request_number),
                )
                .await;
                match undo {
                    Ok(()) => {
                        warn!("🚚️ Pickup {request_number} was cancelled again because it could not be saved. {e}");
                        Err(e)
                    },
                    Err(undo_err) => {
                        error!(
                            "🚚️ RECONCILIATION NEEDED. Pickup {request_number} for shipment {shipment_id} is booked \
                             but not recorded. {e}. Cancelling it failed too: {undo_err}"
                        );
                        Err(MarketplaceError::ReconciliationGap { external_id: request_number, reason: e.to_string() })
                    },
                }
            },
        }
    }

    /// Starts a return for a delivered shipment.
    ///
    /// A new label is created with the buyer as shipper and the seller as recipient, linked to the original via
    /// `original_shipment_id`. The original shipment and its delivered items become `returned`.
    pub async fn handle_return(&self, shipment_id: i64, reason: &str) -> Result<ReturnRecord, MarketplaceError> {
        let original = self.fetch_shipment(shipment_id).await?;
        if original.status != ShipmentStatus::Delivered {
            return Err(MarketplaceError::IllegalShipmentState {
                id: shipment_id,
                action: "return",
                status: original.status.to_string(),
            });
        }
        if original.is_return() {
            return Err(MarketplaceError::ValidationError(format!("Shipment {shipment_id} is already a return")));
        }
        let request = ShipmentRequest {
            idempotency_key: idempotency_key(IdempotencyScope::ReturnShipment, &shipment_id.to_string()),
            shipper: original.shipping_address.0.clone(),
            recipient: original.shipper_address.0.clone(),
            package: original.package(),
            reference: format!("return-{shipment_id}"),
        };
        let label = self.create_label(request).await?;
        let return_shipment = NewShipment {
            order_id: original.order_id,
            seller_id: original.seller_id,
            carrier_shipment_id: label.shipment_id.clone(),
            tracking_number: label.tracking_number.clone(),
            package: original.package(),
            shipper_address: original.shipping_address.0.clone(),
            shipping_address: original.shipper_address.0.clone(),
            original_shipment_id: Some(shipment_id),
            return_reason: Some(reason.to_string()),
        };
        let record = match self.db.record_return(shipment_id, return_shipment).await {
            Ok(record) => record,
            Err(e) => return Err(self.compensate_label(&label, e).await),
        };
        info!(
            "🚚️ Return shipment {} created for shipment {shipment_id} ({reason}). Tracking number {}",
            record.return_shipment.id, record.return_shipment.tracking_number
        );
        let update = ShipmentUpdate {
            previous: ShipmentStatus::Delivered,
            shipment: record.original.clone(),
            items: record.items.clone(),
        };
        self.notify_shipment(&update).await;
        Ok(record)
    }

    async fn create_label(&self, request: ShipmentRequest) -> Result<CarrierShipment, MarketplaceError> {
        call_with_timeout("carrier.create_shipment", self.timeout, self.carrier.create_shipment(request))
            .await
            .map_err(|e| {
                warn!("🚚️ The carrier could not create a label. {e}");
                e
            })
    }

    /// Voids a label whose shipment could not be stored. Returns the error to report to the caller.
    async fn compensate_label(&self, label: &CarrierShipment, cause: MarketplaceError) -> MarketplaceError {
        if !self.compensate_failures {
            error!(
                "🚚️ RECONCILIATION NEEDED. Label {} was created but not recorded. {cause}",
                label.shipment_id
            );
            return MarketplaceError::ReconciliationGap {
                external_id: label.shipment_id.clone(),
                reason: cause.to_string(),
            };
        }
        let undo = call_with_timeout(
            "carrier.void_shipment",
            self.timeout,
            self.carrier.void_shipment(&label.shipment_id, &label.tracking_number),
        )
        .await;
        match undo {
            Ok(()) => {
                warn!(
                    "🚚️ Label {} was voided again because the shipment could not be saved. {cause}",
                    label.shipment_id
                );
                cause
            },
            Err(undo_err) => {
                error!(
                    "🚚️ RECONCILIATION NEEDED. Label {} was created but not recorded. {cause}. Voiding it failed \
                     too: {undo_err}",
                    label.shipment_id
                );
                MarketplaceError::ReconciliationGap {
                    external_id: label.shipment_id.clone(),
                    reason: cause.to_string(),
                }
            },
        }
    }

    async fn fetch_shipment(&self, shipment_id: i64) -> Result<Shipment, MarketplaceError> {
        self.db.fetch_shipment(shipment_id).await?.ok_or(MarketplaceError::ShipmentNotFound(shipment_id))
    }

    async fn notify_items(&self, transitions: &[ItemTransition]) {
        for t in transitions {
            let event = ItemStatusChangedEvent::new(t.old_status, t.item.clone());
            self.producers.publish_item_status_changed(event).await;
        }
    }

    async fn notify_shipment(&self, update: &ShipmentUpdate) {
        let event = ShipmentUpdatedEvent { previous: update.previous, shipment: update.shipment.clone() };
        self.producers.publish_shipment_updated(event).await;
        self.notify_items(&update.items).await;
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
