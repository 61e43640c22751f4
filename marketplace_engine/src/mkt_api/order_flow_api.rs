use std::fmt::Debug;

use log::*;

use crate::{
    events::{EventProducers, ItemStatusChangedEvent},
    traits::{ItemTransition, MarketplaceDatabase, MarketplaceError},
};

/// `OrderFlowApi` handles the seller's decisions about an order item: approve it, reject it, or cancel it after
/// approval.
///
/// Approving takes stock; cancelling gives it back. If there is not enough stock the approval fails and nothing
/// changes.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// `pending_approval -> approved`, taking the item's quantity out of stock.
    pub async fn confirm_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
        let transition = self.db.confirm_item(item_id).await.map_err(|e| {
            warn!("📦️ Could not approve order item {item_id}. {e}");
            e
        })?;
        if let Some(stock) = &transition.stock {
            debug!(
                "📦️ Order item {item_id} approved. Product {} stock {} -> {}",
                stock.product_id, stock.old_quantity, stock.new_quantity
            );
        }
        self.notify(&transition).await;
        Ok(transition)
    }

    /// `pending_approval -> rejected`.
    pub async fn reject_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
        let transition = self.db.reject_item(item_id).await?;
        info!("📦️ Order item {item_id} rejected by the seller");
        self.notify(&transition).await;
        Ok(transition)
    }

    /// `approved -> cancelled`, putting the item's quantity back into stock.
    pub async fn cancel_item(&self, item_id: i64) -> Result<ItemTransition, MarketplaceError> {
        let transition = self.db.cancel_item(item_id).await?;
        info!("📦️ Order item {item_id} cancelled");
        self.notify(&transition).await;
        Ok(transition)
    }

    async fn notify(&self, transition: &ItemTransition) {
        let event = ItemStatusChangedEvent::new(transition.old_status, transition.item.clone());
        self.producers.publish_item_status_changed(event).await;
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
