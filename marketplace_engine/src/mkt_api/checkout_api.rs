use std::{collections::HashMap, fmt::Debug};

use log::*;

use super::external::call_with_timeout;
use crate::{
    calculator::{calculate_totals, price_cart, OrderTotals, PricedLine},
    config::EngineConfig,
    db_types::{NewOrder, NewOrderRecord},
    events::{EventProducers, OrderPlacedEvent},
    traits::{MarketplaceDatabase, MarketplaceError, PaymentIntentStatus, PaymentProcessor, PlacedOrder},
};

/// A priced cart that has not been stored.
#[derive(Debug, Clone)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub totals: OrderTotals,
}

/// `CheckoutApi` turns a buyer's cart into a stored order and confirms the buyer's payment for it.
pub struct CheckoutApi<B, P> {
    db: B,
    processor: P,
    config: EngineConfig,
    producers: EventProducers,
}

impl<B, P> Debug for CheckoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, P> CheckoutApi<B, P> {
    pub fn new(db: B, processor: P, config: EngineConfig, producers: EventProducers) -> Self {
        Self { db, processor, config, producers }
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Prices the cart without storing anything.
    pub async fn quote(&self, order: &NewOrder) -> Result<Quote, MarketplaceError> {
        let ids = order.lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        let products = self.db.fetch_products(&ids).await?;
        let lines = price_cart(&order.lines, &products)?;
        let mut commissions = HashMap::new();
        for line in &lines {
            if !commissions.contains_key(&line.category) {
                let rate = self.db.commission_rate(&line.category).await?;
                commissions.insert(line.category.clone(), rate);
            }
        }
        let totals = calculate_totals(&lines, &commissions, self.config.tax_rate, order.shipping_cost)?;
        trace!("🛒️ Quote for {}: {totals:?}", order.buyer_id);
        Ok(Quote { lines, totals })
    }

    /// Prices the cart and stores it as a new order. Every item starts out waiting for seller approval.
    pub async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, MarketplaceError> {
        let quote = self.quote(&order).await?;
        let record = NewOrderRecord {
            buyer_id: order.buyer_id,
            totals: quote.totals,
            shipping_address: order.shipping_address,
            items: quote.lines.into_iter().map(Into::into).collect(),
        };
        let placed = self.db.insert_order(record).await?;
        info!(
            "🛒️ Order {} placed by {} for {} ({} items)",
            placed.order.id,
            placed.order.buyer_id,
            placed.order.total_amount,
            placed.items.len()
        );
        let event = OrderPlacedEvent { order: placed.order.clone(), items: placed.items.clone() };
        self.producers.publish_order_placed(event).await;
        Ok(placed)
    }

    /// Confirms with the payment processor that the buyer's payment intent has succeeded, then marks the order and
    /// its items as paid.
    ///
    /// Calling this again for an order that is already paid by the same intent is a no-op.
    pub async fn confirm_payment(
        &self,
        order_id: i64,
        payment_intent_id: &str,
    ) -> Result<PlacedOrder, MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if order.payment_completed && order.payment_intent_id.as_deref() == Some(payment_intent_id) {
            debug!("🛒️ Order {order_id} is already paid by {payment_intent_id}");
            let items = self.db.fetch_order_items(order_id).await?;
            return Ok(PlacedOrder { order, items });
        }
        let intent = call_with_timeout(
            "payment_processor.retrieve_payment_intent",
            self.config.processor_timeout,
            self.processor.retrieve_payment_intent(payment_intent_id),
        )
        .await?;
        if intent.status != PaymentIntentStatus::Succeeded {
            warn!("🛒️ Payment intent {payment_intent_id} for order {order_id} is {:?}", intent.status);
            return Err(MarketplaceError::PaymentNotCompleted(order_id));
        }
        if intent.amount != order.total_amount {
            return Err(MarketplaceError::ValidationError(format!(
                "Payment intent {payment_intent_id} is for {}, but order {order_id} totals {}",
                intent.amount, order.total_amount
            )));
        }
        let paid = self.db.mark_order_paid(order_id, payment_intent_id).await?;
        info!("🛒️ Payment {payment_intent_id} confirmed for order {order_id}");
        Ok(paid)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
