use serde::Serialize;

use crate::db_types::{Order, OrderItem, OrderItemStatus, Payout, Refund, Shipment, ShipmentStatus};

/// A change to a product's on-hand stock, and the knock-on change to its listing counter, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub product_id: i64,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub listing_id: Option<i64>,
    /// -1, 0 or +1
    pub listing_delta: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemTransition {
    pub old_status: OrderItemStatus,
    /// The item after the transition was applied
    pub item: OrderItem,
    pub stock: Option<StockChange>,
}

impl ItemTransition {
    pub fn new(old_status: OrderItemStatus, item: OrderItem) -> Self {
        Self { old_status, item, stock: None }
    }

    pub fn with_stock(mut self, stock: StockChange) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn new_status(&self) -> OrderItemStatus {
        self.item.order_status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentUpdate {
    pub previous: ShipmentStatus,
    pub shipment: Shipment,
    /// Items whose status moved as a result of the update
    pub items: Vec<ItemTransition>,
}

impl ShipmentUpdate {
    /// False when the update was ignored, e.g. a duplicate or out-of-order carrier event.
    pub fn changed(&self) -> bool {
        self.previous != self.shipment.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnRecord {
    pub original: Shipment,
    pub return_shipment: Shipment,
    pub items: Vec<ItemTransition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRecord {
    pub refund: Refund,
    pub item: ItemTransition,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutRecord {
    pub payout: Payout,
    pub item: OrderItem,
}
