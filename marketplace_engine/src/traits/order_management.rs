use crate::{
    db_types::{LedgerEntry, Order, OrderItem, Payout, Refund, Shipment},
    traits::MarketplaceError,
};

/// Read-only queries over orders and everything that hangs off them.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError>;

    async fn fetch_order_item(&self, item_id: i64) -> Result<Option<OrderItem>, MarketplaceError>;

    async fn fetch_shipment(&self, shipment_id: i64) -> Result<Option<Shipment>, MarketplaceError>;

    async fn fetch_shipments_for_order(&self, order_id: i64) -> Result<Vec<Shipment>, MarketplaceError>;

    /// The items currently assigned to the shipment.
    async fn fetch_shipment_items(&self, shipment_id: i64) -> Result<Vec<OrderItem>, MarketplaceError>;

    async fn fetch_refunds_for_item(&self, item_id: i64) -> Result<Vec<Refund>, MarketplaceError>;

    async fn fetch_payouts_for_item(&self, item_id: i64) -> Result<Vec<Payout>, MarketplaceError>;

    async fn fetch_ledger_for_order(&self, order_id: i64) -> Result<Vec<LedgerEntry>, MarketplaceError>;
}
