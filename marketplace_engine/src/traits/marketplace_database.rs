use crate::{
    db_types::{NewOrderRecord, NewPayout, NewRefund, NewShipment, PickupDetails, Shipment, ShipmentStatus},
    traits::{
        data_objects::{ItemTransition, PayoutRecord, PlacedOrder, RefundRecord, ReturnRecord, ShipmentUpdate},
        CatalogManagement,
        MarketplaceError,
        OrderManagement,
    },
};

/// The mutating behaviour a storage backend must provide for the marketplace engine.
///
/// Every method is atomic. Status changes, inventory movements, listing counters and ledger entries belonging to one
/// operation either all commit or all roll back. Status changes are conditional on the status the caller expects, so
/// a concurrent change between a read and the write is reported as [`MarketplaceError::Conflict`] rather than being
/// silently overwritten.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + OrderManagement + CatalogManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a priced order and its items. All items start in `pending_approval`.
    async fn insert_order(&self, order: NewOrderRecord) -> Result<PlacedOrder, MarketplaceError>;

    /// Records the payment intent against the order and marks the order and all its items as paid.
    async fn mark_order_paid(&self, order_id: i64, payment_intent_id: &str) -> Result<PlacedOrder, MarketplaceError>;

    /// `pending_approval -> approved`. Decrements the product's stock by the item quantity, failing with
    /// [`MarketplaceError::InsufficientStock`] (and changing nothing) if there is not enough.
    async fn confirm_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError>;

    /// `pending_approval -> rejected`. No inventory changes.
    async fn reject_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError>;

    /// `approved -> cancelled`. Restores the stock that was taken when the item was approved.
    async fn cancel_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError>;

    /// Stores a new shipment and moves the given approved items to `processing`, linking them to it.
    async fn insert_shipment(
        &self,
        shipment: NewShipment,
        item_ids: &[i64],
    ) -> Result<(Shipment, Vec<ItemTransition>), MarketplaceError>;

    /// Applies a carrier-reported status. Regressions and duplicates are ignored. Items in the shipment follow the
    /// shipment where their own transition rules allow it.
    async fn apply_shipment_status(
        &self,
        shipment_id: i64,
        status: ShipmentStatus,
    ) -> Result<ShipmentUpdate, MarketplaceError>;

    /// Marks a voidable shipment as cancelled, clears any pickup and returns its items to `approved`.
    async fn void_shipment(&self, shipment_id: i64) -> Result<ShipmentUpdate, MarketplaceError>;

    /// Stores the pickup booking and moves the shipment to `pickup_scheduled`.
    async fn record_pickup(&self, shipment_id: i64, pickup: PickupDetails) -> Result<Shipment, MarketplaceError>;

    /// Forgets a cancelled pickup booking. A `pickup_scheduled` shipment goes back to `created`, any other status is
    /// kept.
    async fn clear_pickup(&self, shipment_id: i64) -> Result<Shipment, MarketplaceError>;

    /// Stores the return shipment, marks the original as returned and moves its delivered items to `returned`.
    async fn record_return(
        &self,
        original_shipment_id: i64,
        return_shipment: NewShipment,
    ) -> Result<ReturnRecord, MarketplaceError>;

    /// Stores the refund and its ledger entry, and moves the item to `refunded`. Fails with
    /// [`MarketplaceError::AlreadyRefunded`] if the item is already refunded.
    async fn record_refund(&self, item_id: i64, refund: NewRefund) -> Result<RefundRecord, MarketplaceError>;

    /// Stores the payout and its ledger entry, and sets `seller_paid` on the item.
    async fn record_payout(&self, payout: NewPayout) -> Result<PayoutRecord, MarketplaceError>;
}
