use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use marketplace_engine::{
    db_types::{CartLine, OrderItemStatus, Package, ShipmentStatus},
    events::EventProducers,
    test_utils::mocks::CarrierOp,
    traits::{CatalogManagement, ErrorKind, ItemTransition, MarketplaceError, OrderManagement},
};

mod support;

use support::{test_config, Marketplace};

/// Two sellers, one paid order, every item approved. Returns (order id, alpine seller id, nordic seller id).
async fn approved_order(mkt: &Marketplace) -> (i64, i64, i64) {
    let alpine = mkt.seller("alpine").await;
    let nordic = mkt.seller("nordic").await;
    let ski = mkt.product(&alpine, "skis", 10_000, 10).await;
    let pole = mkt.product(&alpine, "poles", 4_000, 10).await;
    let other = mkt.product(&nordic, "skis", 30_000, 10).await;
    let placed =
        mkt.paid_order(&[CartLine::new(ski.id, 2), CartLine::new(pole.id, 1), CartLine::new(other.id, 1)]).await;
    for item in &placed.items {
        mkt.flow.confirm_item(item.id).await.unwrap();
    }
    (placed.order.id, alpine.id, nordic.id)
}

/// Cancels the item once the carrier call is under way.
async fn cancel_later(mkt: &Marketplace, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    mkt.flow.cancel_item(item_id).await
}

fn pickup_day() -> (NaiveDate, NaiveTime, NaiveTime) {
    (
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn shipments_are_grouped_by_seller() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, nordic) = approved_order(&mkt).await;

    let (shipment, items) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Created);
    assert_eq!(shipment.seller_id, alpine);
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|t| t.new_status() == OrderItemStatus::Processing));
    assert!(items.iter().all(|t| t.item.shipment_id == Some(shipment.id)));
    // Weights add up, dimensions are the largest of any item
    assert_eq!(shipment.package(), Package::new(12.0, 70.0, 8.0, 4.0));
    let requests = mkt.carrier.shipment_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].shipper.name, "alpine");
    assert_eq!(requests[0].recipient.name, "Buyer");

    let order = mkt.db.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.tracking_number.as_deref(), Some(shipment.tracking_number.as_str()));

    let nordic_items = mkt.db.fetch_order_items(order_id).await.unwrap();
    let nordic_item = nordic_items.iter().find(|i| i.seller_id == nordic).unwrap();
    assert_eq!(nordic_item.order_status, OrderItemStatus::Approved);
    assert!(nordic_item.shipment_id.is_none());

    // Nothing left for alpine to ship
    let err = mkt.shipping.create_shipment(order_id, alpine).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ValidationError(_)));
    assert_eq!(mkt.carrier.labels_created(), 1);
    mkt.tear_down().await;
}

#[tokio::test]
async fn carrier_failure_changes_nothing() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;

    mkt.carrier.fail(CarrierOp::CreateShipment);
    let err = mkt.shipping.create_shipment(order_id, alpine).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::CarrierError(_)));
    assert!(mkt.db.fetch_shipments_for_order(order_id).await.unwrap().is_empty());
    let items = mkt.db.fetch_order_items(order_id).await.unwrap();
    assert!(items.iter().all(|i| i.order_status == OrderItemStatus::Approved && i.shipment_id.is_none()));

    // A carrier that takes too long is treated as failed too
    mkt.carrier.recover(CarrierOp::CreateShipment);
    mkt.carrier.set_delay(Some(Duration::from_secs(2)));
    let err = mkt.shipping.create_shipment(order_id, alpine).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Timeout("carrier.create_shipment", _)));
    assert_eq!(err.kind(), ErrorKind::ExternalService);
    assert!(mkt.db.fetch_shipments_for_order(order_id).await.unwrap().is_empty());

    // Retrying once the carrier is back succeeds
    mkt.carrier.set_delay(None);
    mkt.shipping.create_shipment(order_id, alpine).await.unwrap();
    mkt.tear_down().await;
}

#[tokio::test]
async fn carrier_validation_errors_are_reported() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("alpine").await;
    let weightless = marketplace_engine::db_types::NewProduct::new(
        seller.id,
        "Gift card",
        "skis",
        marketplace_common::Cents::from(5_000),
        10,
    );
    let weightless = mkt.db.insert_product(weightless).await.unwrap();
    let placed = mkt.paid_order(&[CartLine::new(weightless.id, 1)]).await;
    mkt.flow.confirm_item(placed.items[0].id).await.unwrap();
    let err = mkt.shipping.create_shipment(placed.order.id, seller.id).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Package weight must be positive"), "{msg}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn tracking_never_regresses() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();

    let update = mkt.shipping.apply_carrier_status(shipment.id, "I").await.unwrap();
    assert!(update.changed());
    assert_eq!(update.shipment.status, ShipmentStatus::InTransit);
    assert_eq!(update.items.len(), 2);
    assert!(update.items.iter().all(|t| t.new_status() == OrderItemStatus::InTransit));

    let update = mkt.shipping.apply_carrier_status(shipment.id, "D").await.unwrap();
    assert_eq!(update.shipment.status, ShipmentStatus::Delivered);
    assert!(update.items.iter().all(|t| t.new_status() == OrderItemStatus::Delivered));

    let update = mkt.shipping.apply_carrier_status(shipment.id, "I").await.unwrap();
    assert!(!update.changed());
    assert!(update.items.is_empty());

    let stored = mkt.db.fetch_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ShipmentStatus::Delivered);
    let items = mkt.db.fetch_shipment_items(shipment.id).await.unwrap();
    assert!(items.iter().all(|i| i.order_status == OrderItemStatus::Delivered));
    mkt.tear_down().await;
}

#[tokio::test]
async fn polling_the_carrier() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();

    // A fresh label reports "M", which is where a saved shipment already is
    let update = mkt.shipping.track_and_update(shipment.id).await.unwrap();
    assert!(!update.changed());
    assert_eq!(update.shipment.status, ShipmentStatus::Created);
    assert!(update.items.is_empty());

    mkt.carrier.set_tracking_code(&shipment.tracking_number, "OFD");
    let update = mkt.shipping.track_and_update(shipment.id).await.unwrap();
    assert_eq!(update.previous, ShipmentStatus::Created);
    assert_eq!(update.shipment.status, ShipmentStatus::OutForDelivery);
    assert!(update.items.iter().all(|t| t.new_status() == OrderItemStatus::OutForDelivery));

    mkt.carrier.set_tracking_code(&shipment.tracking_number, "ZZ");
    let update = mkt.shipping.track_and_update(shipment.id).await.unwrap();
    assert!(!update.changed());
    assert_eq!(update.shipment.status, ShipmentStatus::OutForDelivery);

    mkt.carrier.set_tracking_code(&shipment.tracking_number, "X");
    let update = mkt.shipping.track_and_update(shipment.id).await.unwrap();
    assert_eq!(update.shipment.status, ShipmentStatus::Exception);
    assert!(update.items.iter().all(|t| t.new_status() == OrderItemStatus::Exception));

    mkt.carrier.set_tracking_code(&shipment.tracking_number, "d");
    let update = mkt.shipping.track_and_update(shipment.id).await.unwrap();
    assert_eq!(update.shipment.status, ShipmentStatus::Delivered);

    let err = mkt.shipping.track_and_update(999).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ShipmentNotFound(999)));
    mkt.tear_down().await;
}

#[tokio::test]
async fn voiding_a_shipment_hands_items_back() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let stock_before = mkt.db.fetch_products(&[1, 2]).await.unwrap();
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();

    let update = mkt.shipping.void_shipment(shipment.id).await.unwrap();
    assert_eq!(update.shipment.status, ShipmentStatus::Cancelled);
    assert_eq!(update.items.len(), 2);
    for t in &update.items {
        assert_eq!(t.old_status, OrderItemStatus::Processing);
        assert_eq!(t.new_status(), OrderItemStatus::Approved);
        assert!(t.item.shipment_id.is_none());
    }
    assert_eq!(mkt.carrier.voided(), vec![shipment.carrier_shipment_id.clone()]);
    // The items are still sold, so no stock comes back
    let stock_after = mkt.db.fetch_products(&[1, 2]).await.unwrap();
    for (id, product) in stock_after {
        assert_eq!(product.quantity, stock_before[&id].quantity);
    }

    let err = mkt.shipping.void_shipment(shipment.id).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::IllegalVoid(..)));

    // The items can be shipped again
    let (again, items) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();
    assert_ne!(again.id, shipment.id);
    // A fresh label, not the voided one
    assert_ne!(again.carrier_shipment_id, shipment.carrier_shipment_id);
    assert_eq!(mkt.carrier.labels_created(), 2);
    assert_eq!(items.len(), 2);
    mkt.tear_down().await;
}

#[tokio::test]
async fn failed_label_void_keeps_the_pickup_cancellation() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();
    let (date, ready, close) = pickup_day();
    mkt.shipping.schedule_pickup(shipment.id, date, ready, close).await.unwrap();

    mkt.carrier.fail(CarrierOp::VoidShipment);
    assert!(mkt.shipping.void_shipment(shipment.id).await.is_err());
    assert_eq!(mkt.carrier.cancelled_pickups(), vec!["PRN0001".to_string()]);
    assert!(mkt.carrier.voided().is_empty());
    let stored = mkt.db.fetch_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ShipmentStatus::Created);
    assert!(stored.pickup().is_none());
    let items = mkt.db.fetch_shipment_items(shipment.id).await.unwrap();
    assert!(items.iter().all(|i| i.order_status == OrderItemStatus::Processing));

    // The retry only has the label left to void
    mkt.carrier.recover(CarrierOp::VoidShipment);
    let update = mkt.shipping.void_shipment(shipment.id).await.unwrap();
    assert_eq!(update.shipment.status, ShipmentStatus::Cancelled);
    assert_eq!(mkt.carrier.cancelled_pickups().len(), 1);
    assert_eq!(mkt.carrier.voided(), vec![shipment.carrier_shipment_id.clone()]);
    mkt.tear_down().await;
}

#[tokio::test]
async fn moving_parcels_cannot_be_voided() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();
    mkt.shipping.apply_status(shipment.id, ShipmentStatus::InTransit).await.unwrap();

    let err = mkt.shipping.void_shipment(shipment.id).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::IllegalVoid(id, _) if id == shipment.id));
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert!(mkt.carrier.voided().is_empty());
    let items = mkt.db.fetch_shipment_items(shipment.id).await.unwrap();
    assert!(items.iter().all(|i| i.order_status == OrderItemStatus::InTransit));
    mkt.tear_down().await;
}

#[tokio::test]
async fn pickups() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();
    let (date, ready, close) = pickup_day();

    let err = mkt.shipping.schedule_pickup(shipment.id, date, close, ready).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ValidationError(_)));
    assert_eq!(mkt.carrier.pickups_booked(), 0);

    let booked = mkt.shipping.schedule_pickup(shipment.id, date, ready, close).await.unwrap();
    assert_eq!(booked.status, ShipmentStatus::PickupScheduled);
    let pickup = booked.pickup().unwrap();
    assert_eq!(pickup.request_number, "PRN0001");
    assert_eq!(pickup.date, date);
    assert_eq!((pickup.ready_time, pickup.close_time), (ready, close));

    // Tracking updates keep the pickup details
    let update = mkt.shipping.apply_carrier_status(shipment.id, "P").await.unwrap();
    assert_eq!(update.shipment.status, ShipmentStatus::Shipped);
    assert_eq!(update.shipment.pickup().map(|p| p.request_number.as_str()), Some("PRN0001"));

    let err = mkt.shipping.schedule_pickup(shipment.id, date, ready, close).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::IllegalShipmentState { .. }));

    // Voiding cancels the pickup first
    mkt.shipping.void_shipment(shipment.id).await.unwrap();
    assert_eq!(mkt.carrier.cancelled_pickups(), vec!["PRN0001".to_string()]);
    let stored = mkt.db.fetch_shipment(shipment.id).await.unwrap().unwrap();
    assert!(stored.pickup().is_none());
    mkt.tear_down().await;
}

#[tokio::test]
async fn returns() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let (shipment, _) = mkt.shipping.create_shipment(order_id, alpine).await.unwrap();

    let err = mkt.shipping.handle_return(shipment.id, "Wrong size").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::IllegalShipmentState { action: "return", .. }));
    assert_eq!(mkt.carrier.labels_created(), 1);

    mkt.shipping.apply_status(shipment.id, ShipmentStatus::Delivered).await.unwrap();
    let stock_before = mkt.db.fetch_products(&[1, 2]).await.unwrap();
    let record = mkt.shipping.handle_return(shipment.id, "Wrong size").await.unwrap();
    assert_eq!(record.original.status, ShipmentStatus::Returned);
    assert_eq!(record.return_shipment.original_shipment_id, Some(shipment.id));
    assert_eq!(record.return_shipment.return_reason.as_deref(), Some("Wrong size"));
    assert!(record.return_shipment.is_return());
    // The buyer ships back to the seller
    assert_eq!(record.return_shipment.shipper_address.0.name, "Buyer");
    assert_eq!(record.return_shipment.shipping_address.0.name, "alpine");
    assert_eq!(record.items.len(), 2);
    assert!(record.items.iter().all(|t| t.new_status() == OrderItemStatus::Returned));
    assert_eq!(mkt.carrier.labels_created(), 2);

    // Returned goods are not restocked
    let stock_after = mkt.db.fetch_products(&[1, 2]).await.unwrap();
    for (id, product) in stock_after {
        assert_eq!(product.quantity, stock_before[&id].quantity);
    }

    let err = mkt.shipping.handle_return(shipment.id, "Again").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::IllegalShipmentState { .. }));
    mkt.tear_down().await;
}

#[tokio::test]
async fn unsaved_labels_are_voided() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let items = mkt.db.fetch_order_items(order_id).await.unwrap();
    let item = items.iter().find(|i| i.seller_id == alpine).unwrap().id;

    // The seller cancels an item while the carrier is printing the label, so the shipment can't be saved
    mkt.carrier.set_delay(Some(Duration::from_millis(300)));
    let (shipped, cancelled) = tokio::join!(mkt.shipping.create_shipment(order_id, alpine), cancel_later(&mkt, item));
    cancelled.unwrap();
    let err = shipped.unwrap_err();
    assert!(matches!(err, MarketplaceError::Conflict(_)), "{err}");
    assert_eq!(mkt.carrier.voided().len(), 1);
    assert!(mkt.db.fetch_shipments_for_order(order_id).await.unwrap().is_empty());
    mkt.tear_down().await;
}

#[tokio::test]
async fn failed_compensation_is_a_reconciliation_gap() {
    let mkt = Marketplace::new().await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let items = mkt.db.fetch_order_items(order_id).await.unwrap();
    let item = items.iter().find(|i| i.seller_id == alpine).unwrap().id;

    mkt.carrier.set_delay(Some(Duration::from_millis(300)));
    mkt.carrier.fail(CarrierOp::VoidShipment);
    let (shipped, cancelled) = tokio::join!(mkt.shipping.create_shipment(order_id, alpine), cancel_later(&mkt, item));
    cancelled.unwrap();
    let err = shipped.unwrap_err();
    assert!(matches!(&err, MarketplaceError::ReconciliationGap { external_id, .. } if external_id == "SHP0001"));
    assert_eq!(err.kind(), ErrorKind::ReconciliationGap);
    mkt.tear_down().await;
}

#[tokio::test]
async fn compensation_can_be_switched_off() {
    let config = marketplace_engine::config::EngineConfig { compensate_failed_shipments: false, ..test_config() };
    let mkt = Marketplace::with_config(config, EventProducers::default()).await;
    let (order_id, alpine, _) = approved_order(&mkt).await;
    let items = mkt.db.fetch_order_items(order_id).await.unwrap();
    let item = items.iter().find(|i| i.seller_id == alpine).unwrap().id;

    mkt.carrier.set_delay(Some(Duration::from_millis(300)));
    let (shipped, cancelled) = tokio::join!(mkt.shipping.create_shipment(order_id, alpine), cancel_later(&mkt, item));
    cancelled.unwrap();
    let err = shipped.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReconciliationGap);
    assert!(mkt.carrier.voided().is_empty());
    mkt.tear_down().await;
}
