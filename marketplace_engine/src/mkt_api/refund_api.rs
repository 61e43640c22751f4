use std::{collections::HashMap, fmt::Debug, time::Duration};

use log::*;

use super::external::call_with_timeout;
use crate::{
    db_types::{NewRefund, OrderItemStatus, RefundReason, RefundStatus},
    events::{EventProducers, ItemRefundedEvent, ItemStatusChangedEvent},
    helpers::{idempotency_key, IdempotencyScope},
    traits::{
        MarketplaceDatabase,
        MarketplaceError,
        PaymentProcessor,
        PaymentProcessorError,
        RefundRecord,
        RefundRequest,
    },
};

/// `RefundApi` pays a buyer back for a single order item.
///
/// An item can be refunded at most once. All local checks run before the payment processor is called, so a refused
/// refund never moves money.
pub struct RefundApi<B, P> {
    db: B,
    processor: P,
    timeout: Duration,
    producers: EventProducers,
}

impl<B, P> Debug for RefundApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B, P> RefundApi<B, P> {
    pub fn new(db: B, processor: P, timeout: Duration, producers: EventProducers) -> Self {
        Self { db, processor, timeout, producers }
    }
}

impl<B, P> RefundApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Refunds `unit_price * quantity`, plus the retip charge if one was added, against the order's payment intent.
    ///
    /// Fails with
    /// * [`MarketplaceError::OrderItemNotFound`] if the item does not exist,
    /// * [`MarketplaceError::AlreadyRefunded`] if it has already been refunded,
    /// * [`MarketplaceError::MissingPaymentReference`] if the order has no payment intent,
    /// * [`MarketplaceError::PaymentNotCompleted`] if the payment never went through,
    /// * [`MarketplaceError::ReconciliationGap`] if the processor refunded the money but the refund could not be
    ///   recorded locally.
    pub async fn refund_item(
        &self,
        item_id: i64,
        reason: RefundReason,
        notes: Option<String>,
    ) -> Result<RefundRecord, MarketplaceError> {
        let item = self.db.fetch_order_item(item_id).await?.ok_or(MarketplaceError::OrderItemNotFound(item_id))?;
        if item.order_status == OrderItemStatus::Refunded {
            return Err(MarketplaceError::AlreadyRefunded(item_id));
        }
        item.order_status.transition(OrderItemStatus::Refunded)?;
        let order =
            self.db.fetch_order(item.order_id).await?.ok_or(MarketplaceError::OrderNotFound(item.order_id))?;
        let payment_intent_id =
            order.payment_intent_id.clone().ok_or(MarketplaceError::MissingPaymentReference(order.id))?;
        if !order.payment_completed {
            return Err(MarketplaceError::PaymentNotCompleted(order.id));
        }
        let amount = item.refund_amount();
        let request = RefundRequest {
            payment_intent_id,
            amount,
            idempotency_key: idempotency_key(IdempotencyScope::Refund, &item_id.to_string()),
            metadata: HashMap::from([
                ("order_id".to_string(), order.id.to_string()),
                ("order_item_id".to_string(), item_id.to_string()),
                ("reason".to_string(), reason.to_string()),
            ]),
        };
        debug!("💸️ Requesting a refund of {amount} for order item {item_id}");
        let refund =
            call_with_timeout("payment_processor.create_refund", self.timeout, self.processor.create_refund(request))
                .await?;
        if matches!(refund.status, RefundStatus::Failed | RefundStatus::Canceled) {
            warn!("💸️ Refund {} for order item {item_id} was {}", refund.id, refund.status);
            return Err(PaymentProcessorError::Declined(format!("Refund {} is {}", refund.id, refund.status)).into());
        }
        let new_refund = NewRefund {
            order_item_id: item_id,
            external_refund_id: refund.id.clone(),
            amount,
            reason,
            status: refund.status,
            notes,
        };
        let record = match self.db.record_refund(item_id, new_refund).await {
            Ok(record) => record,
            Err(e @ MarketplaceError::AlreadyRefunded(_)) => {
                warn!("💸️ Order item {item_id} was refunded concurrently. Refund {} was deduplicated.", refund.id);
                return Err(e);
            },
            Err(e) => {
                error!(
                    "💸️ RECONCILIATION NEEDED. Refund {} of {amount} for order item {item_id} succeeded at the \
                     payment processor but could not be recorded. {e}",
                    refund.id
                );
                return Err(MarketplaceError::ReconciliationGap { external_id: refund.id, reason: e.to_string() });
            },
        };
        info!("💸️ Order item {item_id} refunded {amount} ({reason}). Refund id {}", record.refund.external_refund_id);
        let status_event = ItemStatusChangedEvent::new(record.item.old_status, record.item.item.clone());
        self.producers.publish_item_status_changed(status_event).await;
        let refund_event = ItemRefundedEvent { item: record.item.item.clone(), refund: record.refund.clone() };
        self.producers.publish_item_refunded(refund_event).await;
        Ok(record)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
