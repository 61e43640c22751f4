use std::{collections::HashMap, fmt::Debug, time::Duration};

use log::*;

use super::external::call_with_timeout;
use crate::{
    calculator::{payout_breakdown, ProcessorFeeModel},
    config::EngineConfig,
    db_types::NewPayout,
    events::{EventProducers, SellerPaidEvent},
    helpers::{idempotency_key, IdempotencyScope},
    traits::{MarketplaceDatabase, MarketplaceError, PaymentProcessor, PayoutRecord, TransferRequest},
};

/// `PayoutApi` settles what the marketplace owes a seller for a shipped item.
///
/// The seller receives the item total less the category commission and the processor's transfer fee. Retip charges
/// stay with the platform. Each item is paid out at most once.
pub struct PayoutApi<B, P> {
    db: B,
    processor: P,
    fees: ProcessorFeeModel,
    timeout: Duration,
    producers: EventProducers,
}

impl<B, P> Debug for PayoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B, P> PayoutApi<B, P> {
    pub fn new(db: B, processor: P, config: &EngineConfig, producers: EventProducers) -> Self {
        Self { db, processor, fees: config.processor_fees, timeout: config.processor_timeout, producers }
    }
}

impl<B, P> PayoutApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Transfers the seller's net payout for the item to their connected account and records it.
    ///
    /// Fails with
    /// * [`MarketplaceError::AlreadyPaid`] if the seller has been paid for this item,
    /// * [`MarketplaceError::PaymentNotCompleted`] if the buyer's payment never went through,
    /// * [`MarketplaceError::ItemNotPayable`] unless the item has shipped and not been returned or refunded,
    /// * [`MarketplaceError::NonPositivePayout`] if fees swallow the whole payout,
    /// * [`MarketplaceError::MissingPayoutAccount`] if the seller has no connected account,
    /// * [`MarketplaceError::ReconciliationGap`] if the transfer went through but could not be recorded.
    pub async fn payout(&self, item_id: i64) -> Result<PayoutRecord, MarketplaceError> {
        let item = self.db.fetch_order_item(item_id).await?.ok_or(MarketplaceError::OrderItemNotFound(item_id))?;
        if item.seller_paid {
            return Err(MarketplaceError::AlreadyPaid(item_id));
        }
        let order =
            self.db.fetch_order(item.order_id).await?.ok_or(MarketplaceError::OrderNotFound(item.order_id))?;
        if !order.payment_completed {
            return Err(MarketplaceError::PaymentNotCompleted(order.id));
        }
        if !item.order_status.is_payable() {
            return Err(MarketplaceError::ItemNotPayable(item_id, item.order_status));
        }
        let rate = self.db.commission_rate(&item.category).await?;
        let breakdown = payout_breakdown(item.item_total(), rate, &self.fees);
        trace!("🏦️ Payout breakdown for order item {item_id}: {breakdown:?}");
        if !breakdown.net_payout.is_positive() {
            return Err(MarketplaceError::NonPositivePayout(item_id, breakdown.net_payout));
        }
        let seller =
            self.db.fetch_seller(item.seller_id).await?.ok_or(MarketplaceError::SellerNotFound(item.seller_id))?;
        let account = seller.payout_account_id.ok_or(MarketplaceError::MissingPayoutAccount(seller.id))?;
        let request = TransferRequest {
            destination_account_id: account,
            amount: breakdown.net_payout,
            idempotency_key: idempotency_key(IdempotencyScope::Transfer, &item_id.to_string()),
            metadata: HashMap::from([
                ("order_id".to_string(), order.id.to_string()),
                ("order_item_id".to_string(), item_id.to_string()),
                ("seller_id".to_string(), seller.id.to_string()),
            ]),
        };
        debug!("🏦️ Transferring {} to seller {} for order item {item_id}", breakdown.net_payout, seller.id);
        let transfer = call_with_timeout(
            "payment_processor.create_transfer",
            self.timeout,
            self.processor.create_transfer(request),
        )
        .await?;
        let new_payout = NewPayout {
            order_item_id: item_id,
            seller_id: seller.id,
            breakdown,
            external_transfer_id: transfer.id.clone(),
        };
        let record = match self.db.record_payout(new_payout).await {
            Ok(record) => record,
            Err(e @ MarketplaceError::AlreadyPaid(_)) => {
                warn!("🏦️ Order item {item_id} was paid out concurrently. Transfer {} was deduplicated.", transfer.id);
                return Err(e);
            },
            Err(e) => {
                error!(
                    "🏦️ RECONCILIATION NEEDED. Transfer {} of {} to seller {} succeeded but could not be recorded. {e}",
                    transfer.id, breakdown.net_payout, seller.id
                );
                return Err(MarketplaceError::ReconciliationGap { external_id: transfer.id, reason: e.to_string() });
            },
        };
        info!(
            "🏦️ Seller {} paid {} for order item {item_id} (commission {}, fees {})",
            seller.id, breakdown.net_payout, breakdown.commission, breakdown.processor_fee
        );
        let event = SellerPaidEvent { item: record.item.clone(), payout: record.payout.clone() };
        self.producers.publish_seller_paid(event).await;
        Ok(record)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
