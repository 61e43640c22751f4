//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every mutating method runs in its own transaction, which is rolled back if any step fails.
use std::{collections::HashMap, fmt::Debug};

use log::*;
use marketplace_common::Rate;
use sqlx::SqlitePool;

use super::{catalog, db_url, inventory, ledger, new_pool, order_items, orders, payouts, refunds, shipments};
use crate::{
    db_types::{
        Commission,
        LedgerEntry,
        NewListing,
        NewOrderRecord,
        NewPayout,
        NewProduct,
        NewRefund,
        NewSeller,
        NewShipment,
        Order,
        OrderItem,
        OrderItemStatus,
        Payout,
        PickupDetails,
        Product,
        ProductListing,
        Refund,
        Seller,
        Shipment,
        ShipmentStatus,
        TransactionKind,
    },
    traits::{
        CatalogManagement,
        ItemTransition,
        MarketplaceDatabase,
        MarketplaceError,
        OrderManagement,
        PayoutRecord,
        PlacedOrder,
        RefundRecord,
        ReturnRecord,
        ShipmentUpdate,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrderRecord) -> Result<PlacedOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let (order, items) = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(PlacedOrder { order, items })
    }

    async fn mark_order_paid(&self, order_id: i64, payment_intent_id: &str) -> Result<PlacedOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let existing = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if let Some(current) = existing.payment_intent_id.as_deref() {
            if current != payment_intent_id {
                return Err(MarketplaceError::Conflict(format!(
                    "Order {order_id} is already linked to payment intent {current}"
                )));
            }
        }
        let order = orders::mark_paid(order_id, payment_intent_id, &mut tx).await?;
        let items = order_items::fetch_items_for_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} marked as paid by {payment_intent_id}");
        Ok(PlacedOrder { order, items })
    }

    async fn confirm_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let item = fetch_item_or_fail(item_id, &mut tx).await?;
        let old_status = item.order_status;
        if old_status != OrderItemStatus::PendingApproval {
            return Err(MarketplaceError::IllegalTransition { from: old_status, to: OrderItemStatus::Approved });
        }
        let updated = order_items::update_status(item_id, old_status, OrderItemStatus::Approved, &mut tx).await?;
        let stock = inventory::decrement(item.product_id, item.quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(ItemTransition::new(old_status, updated).with_stock(stock))
    }

    async fn reject_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let item = fetch_item_or_fail(item_id, &mut tx).await?;
        let old_status = item.order_status;
        if old_status != OrderItemStatus::PendingApproval {
            return Err(MarketplaceError::IllegalTransition { from: old_status, to: OrderItemStatus::Rejected });
        }
        let updated = order_items::update_status(item_id, old_status, OrderItemStatus::Rejected, &mut tx).await?;
        tx.commit().await?;
        Ok(ItemTransition::new(old_status, updated))
    }

    async fn cancel_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let item = fetch_item_or_fail(item_id, &mut tx).await?;
        let old_status = item.order_status;
        if old_status != OrderItemStatus::Approved {
            return Err(MarketplaceError::IllegalTransition { from: old_status, to: OrderItemStatus::Cancelled });
        }
        let updated = order_items::update_status(item_id, old_status, OrderItemStatus::Cancelled, &mut tx).await?;
        let stock = inventory::restore(item.product_id, item.quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(ItemTransition::new(old_status, updated).with_stock(stock))
    }

    async fn insert_shipment(
        &self,
        shipment: NewShipment,
        item_ids: &[i64],
    ) -> Result<(Shipment, Vec<ItemTransition>), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let saved = shipments::insert_shipment(shipment, &mut tx).await?;
        let mut items = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            let item = order_items::assign_to_shipment(*id, saved.id, &mut tx).await?;
            items.push(ItemTransition::new(OrderItemStatus::Approved, item));
        }
        orders::set_tracking(saved.order_id, &saved.tracking_number, &saved.carrier_shipment_id, &mut tx).await?;
        tx.commit().await?;
        Ok((saved, items))
    }

    async fn apply_shipment_status(
        &self,
        shipment_id: i64,
        status: ShipmentStatus,
    ) -> Result<ShipmentUpdate, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let shipment = fetch_shipment_or_fail(shipment_id, &mut tx).await?;
        let previous = shipment.status;
        if !previous.accepts_tracking_update(status) {
            debug!("🗃️ Shipment {shipment_id} is {previous}. Ignoring update to {status}.");
            return Ok(ShipmentUpdate { previous, shipment, items: vec![] });
        }
        let pickup = shipment.pickup().cloned();
        let shipment = shipments::update_status(shipment_id, previous, status, pickup, &mut tx).await?;
        let mut items = vec![];
        if let Some(target) = status.item_status() {
            for item in order_items::fetch_items_for_shipment(shipment_id, &mut tx).await? {
                let old_status = item.order_status;
                if old_status == target || !old_status.can_transition_to(target) {
                    trace!("🗃️ Order item {} stays {old_status} while its shipment moves to {status}", item.id);
                    continue;
                }
                let updated = order_items::update_status(item.id, old_status, target, &mut tx).await?;
                items.push(ItemTransition::new(old_status, updated));
            }
        }
        tx.commit().await?;
        debug!("🗃️ Shipment {shipment_id} {previous} -> {status}. {} items updated", items.len());
        Ok(ShipmentUpdate { previous, shipment, items })
    }

    async fn void_shipment(&self, shipment_id: i64) -> Result<ShipmentUpdate, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let shipment = fetch_shipment_or_fail(shipment_id, &mut tx).await?;
        let previous = shipment.status;
        if !previous.is_voidable() {
            return Err(MarketplaceError::IllegalVoid(shipment_id, previous.to_string()));
        }
        let shipment = shipments::update_status(shipment_id, previous, ShipmentStatus::Cancelled, None, &mut tx).await?;
        let mut items = vec![];
        for item in order_items::fetch_items_for_shipment(shipment_id, &mut tx).await? {
            let old_status = item.order_status;
            if !old_status.is_pre_transit() {
                trace!("🗃️ Order item {} is {old_status} and stays with voided shipment {shipment_id}", item.id);
                continue;
            }
            let updated = order_items::release_from_shipment(item.id, old_status, &mut tx).await?;
            items.push(ItemTransition::new(old_status, updated));
        }
        tx.commit().await?;
        Ok(ShipmentUpdate { previous, shipment, items })
    }

    async fn record_pickup(&self, shipment_id: i64, pickup: PickupDetails) -> Result<Shipment, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let shipment = fetch_shipment_or_fail(shipment_id, &mut tx).await?;
        if !matches!(shipment.status, ShipmentStatus::Pending | ShipmentStatus::Created) {
            return Err(MarketplaceError::IllegalShipmentState {
                id: shipment_id,
                action: "schedule a pickup for",
                status: shipment.status.to_string(),
            });
        }
        let shipment = shipments::update_status(
            shipment_id,
            shipment.status,
            ShipmentStatus::PickupScheduled,
            Some(pickup),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(shipment)
    }

    async fn clear_pickup(&self, shipment_id: i64) -> Result<Shipment, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let shipment = fetch_shipment_or_fail(shipment_id, &mut tx).await?;
        if shipment.pickup.is_none() {
            return Err(MarketplaceError::IllegalShipmentState {
                id: shipment_id,
                action: "clear the pickup for",
                status: shipment.status.to_string(),
            });
        }
        let status = match shipment.status {
            ShipmentStatus::PickupScheduled => ShipmentStatus::Created,
            other => other,
        };
        let shipment = shipments::update_status(shipment_id, shipment.status, status, None, &mut tx).await?;
        tx.commit().await?;
        Ok(shipment)
    }

    async fn record_return(
        &self,
        original_shipment_id: i64,
        return_shipment: NewShipment,
    ) -> Result<ReturnRecord, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let original = fetch_shipment_or_fail(original_shipment_id, &mut tx).await?;
        if original.status != ShipmentStatus::Delivered {
            return Err(MarketplaceError::IllegalShipmentState {
                id: original_shipment_id,
                action: "return",
                status: original.status.to_string(),
            });
        }
        let return_shipment = shipments::insert_shipment(return_shipment, &mut tx).await?;
        let pickup = original.pickup().cloned();
        let original = shipments::update_status(
            original_shipment_id,
            ShipmentStatus::Delivered,
            ShipmentStatus::Returned,
            pickup,
            &mut tx,
        )
        .await?;
        let mut items = vec![];
        for item in order_items::fetch_items_for_shipment(original_shipment_id, &mut tx).await? {
            let old_status = item.order_status;
            if !old_status.can_transition_to(OrderItemStatus::Returned) {
                continue;
            }
            let updated = order_items::update_status(item.id, old_status, OrderItemStatus::Returned, &mut tx).await?;
            items.push(ItemTransition::new(old_status, updated));
        }
        tx.commit().await?;
        Ok(ReturnRecord { original, return_shipment, items })
    }

    async fn record_refund(&self, item_id: i64, refund: NewRefund) -> Result<RefundRecord, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let item = fetch_item_or_fail(item_id, &mut tx).await?;
        let old_status = item.order_status;
        if old_status == OrderItemStatus::Refunded {
            return Err(MarketplaceError::AlreadyRefunded(item_id));
        }
        let updated = order_items::update_status(item_id, old_status, OrderItemStatus::Refunded, &mut tx).await?;
        let refund = refunds::insert_refund(refund, &mut tx).await?;
        ledger::insert_entry(
            item.order_id,
            item_id,
            TransactionKind::Refund,
            refund.amount,
            &refund.external_refund_id,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(RefundRecord { refund, item: ItemTransition::new(old_status, updated) })
    }

    async fn record_payout(&self, payout: NewPayout) -> Result<PayoutRecord, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let item_id = payout.order_item_id;
        let item = order_items::mark_seller_paid(item_id, &mut tx).await?;
        let payout = payouts::insert_payout(payout, &mut tx).await?;
        ledger::insert_entry(
            item.order_id,
            item_id,
            TransactionKind::Payout,
            payout.net_amount,
            &payout.external_transfer_id,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(PayoutRecord { payout, item })
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(order_items::fetch_items_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_order_item(&self, item_id: i64) -> Result<Option<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(order_items::fetch_item(item_id, &mut conn).await?)
    }

    async fn fetch_shipment(&self, shipment_id: i64) -> Result<Option<Shipment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(shipments::fetch_shipment(shipment_id, &mut conn).await?)
    }

    async fn fetch_shipments_for_order(&self, order_id: i64) -> Result<Vec<Shipment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(shipments::fetch_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_shipment_items(&self, shipment_id: i64) -> Result<Vec<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(order_items::fetch_items_for_shipment(shipment_id, &mut conn).await?)
    }

    async fn fetch_refunds_for_item(&self, item_id: i64) -> Result<Vec<Refund>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(refunds::fetch_for_item(item_id, &mut conn).await?)
    }

    async fn fetch_payouts_for_item(&self, item_id: i64) -> Result<Vec<Payout>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_for_item(item_id, &mut conn).await?)
    }

    async fn fetch_ledger_for_order(&self, order_id: i64) -> Result<Vec<LedgerEntry>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_for_order(order_id, &mut conn).await?)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_seller(&self, seller: NewSeller) -> Result<Seller, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let seller = catalog::insert_seller(seller, &mut tx).await?;
        tx.commit().await?;
        Ok(seller)
    }

    async fn fetch_seller(&self, seller_id: i64) -> Result<Option<Seller>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_seller(seller_id, &mut conn).await?)
    }

    async fn insert_listing(&self, listing: NewListing) -> Result<ProductListing, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let listing = catalog::insert_listing(listing, &mut tx).await?;
        tx.commit().await?;
        Ok(listing)
    }

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<ProductListing>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_listing(listing_id, &mut conn).await?)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let product = catalog::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_product(product_id, &mut conn).await?)
    }

    async fn fetch_products(&self, product_ids: &[i64]) -> Result<HashMap<i64, Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_products(product_ids, &mut conn).await?)
    }

    async fn set_product_availability(
        &self,
        product_id: i64,
        is_active: bool,
        is_archived: bool,
    ) -> Result<Product, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let product = catalog::set_product_availability(product_id, is_active, is_archived, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn set_commission(&self, category: &str, rate: Rate) -> Result<Commission, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let commission = catalog::upsert_commission(category, rate, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Commission for '{category}' set to {rate}");
        Ok(commission)
    }

    async fn commission_rate(&self, category: &str) -> Result<Rate, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_commission(category, &mut conn)
            .await?
            .map(|c| c.rate)
            .ok_or_else(|| MarketplaceError::CommissionNotFound(category.to_string()))
    }

    async fn fetch_commissions(&self) -> Result<Vec<Commission>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_commissions(&mut conn).await?)
    }
}

async fn fetch_item_or_fail(
    item_id: i64,
    conn: &mut sqlx::SqliteConnection,
) -> Result<OrderItem, MarketplaceError> {
    order_items::fetch_item(item_id, conn).await?.ok_or(MarketplaceError::OrderItemNotFound(item_id))
}

async fn fetch_shipment_or_fail(
    shipment_id: i64,
    conn: &mut sqlx::SqliteConnection,
) -> Result<Shipment, MarketplaceError> {
    shipments::fetch_shipment(shipment_id, conn).await?.ok_or(MarketplaceError::ShipmentNotFound(shipment_id))
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `MKT_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, MarketplaceError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MarketplaceError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
