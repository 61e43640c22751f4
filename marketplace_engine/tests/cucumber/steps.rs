use cucumber::{then, when};
use log::*;
use marketplace_common::Cents;
use marketplace_engine::{
    db_types::{CartLine, NewOrder, OrderItemStatus, RefundReason, ShipmentStatus},
    traits::{CatalogManagement, OrderManagement, PaymentIntentStatus},
};

use crate::{cucumber::MarketplaceWorld, support::address};

//--------------------------------------        Checkout      ---------------------------------------------------------

#[when(expr = "the buyer orders {int} of '{word}'")]
async fn buyer_orders(world: &mut MarketplaceWorld, quantity: i64, product: String) {
    let line = CartLine::new(world.product(&product).id, quantity);
    place_order(world, line).await;
}

#[when(expr = "the buyer orders {int} of '{word}' with retipping")]
async fn buyer_orders_with_retip(world: &mut MarketplaceWorld, quantity: i64, product: String) {
    let line = CartLine::new(world.product(&product).id, quantity).with_retip();
    place_order(world, line).await;
}

async fn place_order(world: &mut MarketplaceWorld, line: CartLine) {
    let order = NewOrder::new("buyer-1", address("Buyer", "10001")).with_line(line);
    let placed = world.mkt().checkout.place_order(order).await.expect("Error placing order");
    info!("🛒️ Order {} placed for {}", placed.order.id, placed.order.total_amount);
    world.order_id = Some(placed.order.id);
    world.item_id = placed.items.first().map(|i| i.id);
}

#[when("the buyer pays for the order")]
async fn buyer_pays(world: &mut MarketplaceWorld) {
    let order_id = world.order_id();
    let mkt = world.mkt();
    let order = mkt.db.fetch_order(order_id).await.unwrap().expect("Order not found");
    let intent = format!("pi_{order_id}");
    mkt.processor.add_intent(&intent, order.total_amount, PaymentIntentStatus::Succeeded);
    mkt.checkout.confirm_payment(order_id, &intent).await.expect("Error confirming payment");
}

#[then(expr = "the order {word} is {int} cents")]
async fn order_amount(world: &mut MarketplaceWorld, field: String, cents: i64) {
    let order = world.mkt().db.fetch_order(world.order_id()).await.unwrap().expect("Order not found");
    let value = match field.as_str() {
        "subtotal" => order.subtotal,
        "retip_total" => order.retip_total,
        "tax" => order.tax,
        "platform_fee" => order.platform_fee,
        "shipping_cost" => order.shipping_cost,
        "total" => order.total_amount,
        _ => panic!("Unknown order field {field}"),
    };
    assert_eq!(value, Cents::from(cents), "order {field}");
}

#[then("the order total balances")]
async fn order_balances(world: &mut MarketplaceWorld) {
    let order = world.mkt().db.fetch_order(world.order_id()).await.unwrap().expect("Order not found");
    assert!(order.totals().is_balanced(), "{:?} does not balance", order.totals());
}

//--------------------------------------     Seller actions   ---------------------------------------------------------

#[when("the seller confirms the item")]
async fn seller_confirms(world: &mut MarketplaceWorld) {
    let result = world.mkt().flow.confirm_item(world.item_id()).await;
    world.record(result);
}

#[when("the seller rejects the item")]
async fn seller_rejects(world: &mut MarketplaceWorld) {
    let result = world.mkt().flow.reject_item(world.item_id()).await;
    world.record(result);
}

#[when("the seller cancels the item")]
async fn seller_cancels(world: &mut MarketplaceWorld) {
    let result = world.mkt().flow.cancel_item(world.item_id()).await;
    world.record(result);
}

#[then(expr = "the item status is '{word}'")]
async fn item_status(world: &mut MarketplaceWorld, status: String) {
    let expected: OrderItemStatus = status.parse().expect("Invalid item status");
    let item = world.mkt().db.fetch_order_item(world.item_id()).await.unwrap().expect("Item not found");
    assert_eq!(item.order_status, expected);
}

#[then(expr = "'{word}' has {int} in stock")]
async fn product_stock(world: &mut MarketplaceWorld, product: String, stock: i64) {
    let id = world.product(&product).id;
    let product = world.mkt().db.fetch_product(id).await.unwrap().expect("Product not found");
    assert_eq!(product.quantity, stock);
}

//--------------------------------------        Shipping      ---------------------------------------------------------

#[when("the seller ships the order")]
async fn seller_ships(world: &mut MarketplaceWorld) {
    let item = world.mkt().db.fetch_order_item(world.item_id()).await.unwrap().expect("Item not found");
    let result = world.mkt().shipping.create_shipment(item.order_id, item.seller_id).await;
    if let Some((shipment, _)) = world.record(result) {
        world.shipment_id = Some(shipment.id);
    }
}

#[when(expr = "the carrier reports '{word}'")]
async fn carrier_reports(world: &mut MarketplaceWorld, code: String) {
    let result = world.mkt().shipping.apply_carrier_status(world.shipment_id(), &code).await;
    world.record(result);
}

#[when(expr = "the carrier reports these statuses: {word}")]
async fn carrier_reports_sequence(world: &mut MarketplaceWorld, statuses: String) {
    for status in statuses.split(',') {
        let status: ShipmentStatus = status.trim().parse().expect("Invalid shipment status");
        let result = world.mkt().shipping.apply_status(world.shipment_id(), status).await;
        if world.record(result).is_none() {
            break;
        }
    }
}

#[then(expr = "the shipment status is '{word}'")]
async fn shipment_status(world: &mut MarketplaceWorld, status: String) {
    let expected: ShipmentStatus = status.parse().expect("Invalid shipment status");
    let shipment = world.mkt().db.fetch_shipment(world.shipment_id()).await.unwrap().expect("Shipment not found");
    assert_eq!(shipment.status, expected);
}

//--------------------------------------        Refunds       ---------------------------------------------------------

#[when("the item is refunded")]
async fn item_refunded(world: &mut MarketplaceWorld) {
    let result = world.mkt().refunds.refund_item(world.item_id(), RefundReason::RequestedByCustomer, None).await;
    if let Some(record) = world.record(result) {
        info!("💸️ Refund {} issued for {}", record.refund.external_refund_id, record.refund.amount);
    }
}

#[then(expr = "the item has {int} refund(s)")]
async fn refund_count(world: &mut MarketplaceWorld, count: usize) {
    let refunds = world.mkt().db.fetch_refunds_for_item(world.item_id()).await.unwrap();
    assert_eq!(refunds.len(), count);
    assert_eq!(world.mkt().processor.refunds_made(), count);
}

#[then(expr = "the refund amount is {int} cents")]
async fn refund_amount(world: &mut MarketplaceWorld, cents: i64) {
    let refunds = world.mkt().db.fetch_refunds_for_item(world.item_id()).await.unwrap();
    let refund = refunds.first().expect("No refund recorded");
    assert_eq!(refund.amount, Cents::from(cents));
    assert!(!refund.external_refund_id.is_empty());
}

//--------------------------------------        Payouts       ---------------------------------------------------------

#[when("the seller is paid for the item")]
async fn seller_paid(world: &mut MarketplaceWorld) {
    let result = world.mkt().payouts.payout(world.item_id()).await;
    world.record(result);
}

#[then(expr = "the payout {word} is {int} cents")]
async fn payout_amount(world: &mut MarketplaceWorld, field: String, cents: i64) {
    let payouts = world.mkt().db.fetch_payouts_for_item(world.item_id()).await.unwrap();
    let payout = payouts.first().expect("No payout recorded");
    let value = match field.as_str() {
        "gross" => payout.gross_amount,
        "commission" => payout.commission_amount,
        "fee" => payout.processor_fee_amount,
        "net" => payout.net_amount,
        _ => panic!("Unknown payout field {field}"),
    };
    assert_eq!(value, Cents::from(cents), "payout {field}");
}

#[then(expr = "the item has {int} payout(s)")]
async fn payout_count(world: &mut MarketplaceWorld, count: usize) {
    let payouts = world.mkt().db.fetch_payouts_for_item(world.item_id()).await.unwrap();
    assert_eq!(payouts.len(), count);
    assert_eq!(world.mkt().processor.transfers_made(), count);
}

#[then("the seller is marked as paid")]
async fn seller_marked_paid(world: &mut MarketplaceWorld) {
    let item = world.mkt().db.fetch_order_item(world.item_id()).await.unwrap().expect("Item not found");
    assert!(item.seller_paid);
}

//--------------------------------------        Outcomes      ---------------------------------------------------------

#[then("the operation succeeds")]
async fn operation_succeeds(world: &mut MarketplaceWorld) {
    if let Some(e) = &world.last_error {
        panic!("Expected success, but got: {e}");
    }
}

#[then(expr = "the operation fails with {word}")]
async fn operation_fails(world: &mut MarketplaceWorld, error: String) {
    let e = world.last_error.as_ref().expect("Expected the last operation to fail");
    let name = format!("{e:?}");
    assert!(name.starts_with(&error), "Expected {error}, but got {name}");
}
