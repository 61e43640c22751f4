//! Pure money arithmetic for checkout quotes and seller payouts.
//!
//! Nothing in this module touches the database, so it is safe to call speculatively, e.g. to show a quote before the
//! buyer commits. Intermediate products are kept exact (in 1/10000 of a cent) and only rounded once, half-up, at the
//! end of each calculation.
use std::collections::HashMap;

use marketplace_common::{Cents, Rate};
use serde::Serialize;

use crate::{
    db_types::{CartLine, NewOrderItem, Product},
    traits::MarketplaceError,
};

/// A cart line with its prices snapshotted from the product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub seller_id: i64,
    pub title: String,
    pub category: String,
    pub unit_price: Cents,
    pub quantity: i64,
    pub retip_added: bool,
    pub retip_price: Cents,
}

impl PricedLine {
    pub fn subtotal(&self) -> Cents {
        self.unit_price * self.quantity
    }

    pub fn retip_total(&self) -> Cents {
        if self.retip_added {
            self.retip_price * self.quantity
        } else {
            Cents::default()
        }
    }

    fn validate(&self) -> Result<(), MarketplaceError> {
        if self.quantity < 1 {
            return Err(MarketplaceError::ValidationError(format!(
                "Quantity for product {} must be at least 1, but was {}",
                self.product_id, self.quantity
            )));
        }
        if self.unit_price.is_negative() || self.retip_price.is_negative() {
            return Err(MarketplaceError::ValidationError(format!(
                "Prices for product {} cannot be negative",
                self.product_id
            )));
        }
        if self.unit_price.checked_mul(self.quantity).is_none() || self.retip_price.checked_mul(self.quantity).is_none()
        {
            return Err(MarketplaceError::ValidationError(format!(
                "Quantity {} of product {} is too large",
                self.quantity, self.product_id
            )));
        }
        Ok(())
    }
}

impl From<PricedLine> for NewOrderItem {
    fn from(line: PricedLine) -> Self {
        Self {
            product_id: line.product_id,
            seller_id: line.seller_id,
            title: line.title,
            category: line.category,
            quantity: line.quantity,
            unit_price: line.unit_price,
            retip_added: line.retip_added,
            retip_price: line.retip_price,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Cents,
    pub retip_total: Cents,
    pub tax: Cents,
    pub platform_fee: Cents,
    pub shipping_cost: Cents,
    pub total: Cents,
}

impl OrderTotals {
    /// `total == subtotal + retip_total + tax + platform_fee + shipping_cost`
    pub fn is_balanced(&self) -> bool {
        self.total == self.subtotal + self.retip_total + self.tax + self.platform_fee + self.shipping_cost
    }
}

/// Snapshots prices for each cart line from the product catalog.
///
/// Fails with a validation error if a product is unknown, is not for sale, or if retipping is requested for a product
/// that does not offer it.
pub fn price_cart(lines: &[CartLine], products: &HashMap<i64, Product>) -> Result<Vec<PricedLine>, MarketplaceError> {
    if lines.is_empty() {
        return Err(MarketplaceError::ValidationError("An order must contain at least one item".into()));
    }
    let mut seen = Vec::with_capacity(lines.len());
    lines
        .iter()
        .map(|line| {
            if seen.contains(&line.product_id) {
                return Err(MarketplaceError::ValidationError(format!(
                    "Product {} appears more than once in the cart",
                    line.product_id
                )));
            }
            seen.push(line.product_id);
            let product = products.get(&line.product_id).ok_or_else(|| {
                MarketplaceError::ValidationError(format!("Product {} does not exist", line.product_id))
            })?;
            if !product.is_purchasable() {
                return Err(MarketplaceError::ValidationError(format!(
                    "Product {} is not available for purchase",
                    product.id
                )));
            }
            if line.retip_added && !product.requires_retipping {
                return Err(MarketplaceError::ValidationError(format!(
                    "Product {} does not offer retipping",
                    product.id
                )));
            }
            let priced = PricedLine {
                product_id: product.id,
                seller_id: product.seller_id,
                title: product.title.clone(),
                category: product.category.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                retip_added: line.retip_added,
                retip_price: product.retip_price,
            };
            priced.validate()?;
            Ok(priced)
        })
        .collect()
}

/// Computes the order totals for a set of priced lines.
///
/// Tax applies to the item subtotal only (not retipping or shipping). The platform fee is computed per line using
/// that line's category commission rate, summed exactly, and rounded once.
pub fn calculate_totals(
    lines: &[PricedLine],
    commissions: &HashMap<String, Rate>,
    tax_rate: Rate,
    shipping_cost: Cents,
) -> Result<OrderTotals, MarketplaceError> {
    if shipping_cost.is_negative() {
        return Err(MarketplaceError::ValidationError("Shipping cost cannot be negative".into()));
    }
    let mut subtotal = Cents::default();
    let mut retip_total = Cents::default();
    let mut platform_fee_exact = 0i128;
    for line in lines {
        line.validate()?;
        let rate = commissions
            .get(&line.category)
            .ok_or_else(|| MarketplaceError::CommissionNotFound(line.category.clone()))?;
        subtotal = subtotal.checked_add(line.subtotal()).ok_or_else(order_too_large)?;
        retip_total = retip_total.checked_add(line.retip_total()).ok_or_else(order_too_large)?;
        platform_fee_exact += rate.apply_exact(line.subtotal());
    }
    let tax = tax_rate.apply(subtotal);
    let platform_fee = Cents::from_scaled(platform_fee_exact);
    let total = [retip_total, tax, platform_fee, shipping_cost]
        .into_iter()
        .try_fold(subtotal, Cents::checked_add)
        .ok_or_else(order_too_large)?;
    Ok(OrderTotals { subtotal, retip_total, tax, platform_fee, shipping_cost, total })
}

fn order_too_large() -> MarketplaceError {
    MarketplaceError::ValidationError("The order total is too large to represent".into())
}

//--------------------------------------        Payouts       ---------------------------------------------------------

/// The payment processor's charge for moving money to a seller: a percentage of the amount plus a flat fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorFeeModel {
    pub percent: Rate,
    pub flat: Cents,
}

impl ProcessorFeeModel {
    pub fn new(percent: Rate, flat: Cents) -> Self {
        Self { percent, flat }
    }

    /// The amount left after fees, rounded half-up once.
    pub fn net_of_fees(&self, amount: Cents) -> Cents {
        let fee_exact = self.percent.apply_exact(amount) + self.flat.to_scaled();
        Cents::from_scaled(amount.to_scaled() - fee_exact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayoutBreakdown {
    /// `unit_price * quantity`
    pub item_total: Cents,
    pub commission: Cents,
    /// `item_total - commission`
    pub gross_payout: Cents,
    pub processor_fee: Cents,
    /// `gross_payout - processor_fee`
    pub net_payout: Cents,
}

/// Splits an item total into platform commission, processor fees and the seller's net payout.
///
/// The processor fee is taken as whatever remains after rounding the exact net amount, so the parts always add up
/// to `item_total`.
pub fn payout_breakdown(item_total: Cents, commission_rate: Rate, fees: &ProcessorFeeModel) -> PayoutBreakdown {
    let commission = commission_rate.apply(item_total);
    let gross_payout = item_total - commission;
    let net_payout = fees.net_of_fees(gross_payout);
    PayoutBreakdown { item_total, commission, gross_payout, processor_fee: gross_payout - net_payout, net_payout }
}
