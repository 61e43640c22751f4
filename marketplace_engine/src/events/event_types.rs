use marketplace_common::Cents;
use serde::Serialize;

use crate::db_types::{Order, OrderItem, OrderItemStatus, Payout, Refund, Shipment, ShipmentStatus};

#[derive(Debug, Clone, Serialize)]
pub struct OrderPlacedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An order item moved from `old_status` to the status in `item`.
#[derive(Debug, Clone, Serialize)]
pub struct ItemStatusChangedEvent {
    pub old_status: OrderItemStatus,
    pub item: OrderItem,
}

impl ItemStatusChangedEvent {
    pub fn new(old_status: OrderItemStatus, item: OrderItem) -> Self {
        Self { old_status, item }
    }

    pub fn new_status(&self) -> OrderItemStatus {
        self.item.order_status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentUpdatedEvent {
    pub previous: ShipmentStatus,
    pub shipment: Shipment,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemRefundedEvent {
    pub item: OrderItem,
    pub refund: Refund,
}

impl ItemRefundedEvent {
    pub fn amount(&self) -> Cents {
        self.refund.amount
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SellerPaidEvent {
    pub item: OrderItem,
    pub payout: Payout,
}
