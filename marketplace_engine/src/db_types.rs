//! Data types stored in, and returned from, the marketplace database.
//!
//! Purchase-time fields on [`OrderItem`] (price, title, retip price, quantity) are snapshots and never change after
//! the item is created. Only the status fields move, and they move according to the rules in [`crate::lifecycle`].
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::error;
use marketplace_common::{Cents, Rate};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

use crate::calculator::{OrderTotals, PayoutBreakdown};

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(&'static str, String);

/// Generates `Display`, `FromStr` and a lenient `From<String>` for a snake_case status enum.
macro_rules! status_strings {
    ($name:ident, $default:ident, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    s => Err(ConversionError(stringify!($name), s.to_string())),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                value.parse().unwrap_or_else(|_| {
                    error!("Invalid {}: {value}. Defaulting to {}", stringify!($name), Self::$default);
                    Self::$default
                })
            }
        }
    };
}

//--------------------------------------       Address        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

//--------------------------------------       Package        ---------------------------------------------------------
/// Weight (lb) and dimensions (in) of a parcel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub weight: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Package {
    pub fn new(weight: f64, length: f64, width: f64, height: f64) -> Self {
        Self { weight, length, width, height }
    }

    /// Combines the packages of several line items into one parcel: weights (scaled by quantity) are summed and each
    /// dimension is the largest of any item.
    pub fn aggregate<I: IntoIterator<Item = (Package, i64)>>(items: I) -> Self {
        items.into_iter().fold(Package::default(), |acc, (p, qty)| {
            #[allow(clippy::cast_precision_loss)]
            let qty = qty as f64;
            Package {
                weight: acc.weight + p.weight * qty,
                length: acc.length.max(p.length),
                width: acc.width.max(p.width),
                height: acc.height.max(p.height),
            }
        })
    }
}

//--------------------------------------        Seller        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Seller {
    pub id: i64,
    pub name: String,
    pub address: Json<Address>,
    /// The connected account that payouts are transferred to
    pub payout_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSeller {
    pub name: String,
    pub address: Address,
    pub payout_account_id: Option<String>,
}

impl NewSeller {
    pub fn new<S: Into<String>>(name: S, address: Address) -> Self {
        Self { name: name.into(), address, payout_account_id: None }
    }

    pub fn with_payout_account<S: Into<String>>(mut self, account_id: S) -> Self {
        self.payout_account_id = Some(account_id.into());
        self
    }
}

//--------------------------------------      Commission      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Commission {
    pub category: String,
    #[sqlx(rename = "rate_bps")]
    pub rate: Rate,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    ProductListing    ---------------------------------------------------------
/// A group of products. `stock` is a coarse counter of in-stock products, not a sum of product quantities.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductListing {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub seller_id: i64,
    pub title: String,
    pub stock: i64,
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub listing_id: Option<i64>,
    pub title: String,
    pub category: String,
    pub price: Cents,
    pub retip_price: Cents,
    pub requires_retipping: bool,
    /// On-hand stock. Never negative.
    pub quantity: i64,
    pub weight: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub is_active: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn package(&self) -> Package {
        Package::new(self.weight, self.length, self.width, self.height)
    }

    pub fn is_purchasable(&self) -> bool {
        self.is_active && !self.is_archived
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller_id: i64,
    pub listing_id: Option<i64>,
    pub title: String,
    pub category: String,
    pub price: Cents,
    pub retip_price: Cents,
    pub requires_retipping: bool,
    pub quantity: i64,
    pub package: Package,
}

impl NewProduct {
    pub fn new<S: Into<String>>(seller_id: i64, title: S, category: S, price: Cents, quantity: i64) -> Self {
        Self {
            seller_id,
            listing_id: None,
            title: title.into(),
            category: category.into(),
            price,
            retip_price: Cents::default(),
            requires_retipping: false,
            quantity,
            package: Package::default(),
        }
    }

    pub fn in_listing(mut self, listing_id: i64) -> Self {
        self.listing_id = Some(listing_id);
        self
    }

    pub fn with_retipping(mut self, retip_price: Cents) -> Self {
        self.requires_retipping = true;
        self.retip_price = retip_price;
        self
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.package = package;
        self
    }
}

//--------------------------------------   OrderItemStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderItemStatus {
    /// Waiting for the seller to accept or reject the item.
    PendingApproval,
    /// The seller accepted the item and stock has been allocated.
    Approved,
    Rejected,
    /// A carrier shipment has been created for the item.
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    /// The carrier reported a delivery problem.
    Exception,
    Cancelled,
    Refunded,
    Returned,
}

status_strings!(OrderItemStatus, PendingApproval, {
    PendingApproval => "pending_approval",
    Approved => "approved",
    Rejected => "rejected",
    Processing => "processing",
    Shipped => "shipped",
    InTransit => "in_transit",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Exception => "exception",
    Cancelled => "cancelled",
    Refunded => "refunded",
    Returned => "returned",
});

//--------------------------------------      OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub title: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub retip_added: bool,
    pub retip_price: Cents,
    pub order_status: OrderItemStatus,
    pub payment_status: bool,
    pub seller_paid: bool,
    pub shipment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// `unit_price * quantity`
    pub fn item_total(&self) -> Cents {
        self.unit_price * self.quantity
    }

    /// The retip charge for this line, or zero if no retip was added.
    pub fn retip_total(&self) -> Cents {
        if self.retip_added {
            self.retip_price * self.quantity
        } else {
            Cents::default()
        }
    }

    /// The amount the buyer paid for this line, and hence the amount a full refund returns.
    pub fn refund_amount(&self) -> Cents {
        self.item_total() + self.retip_total()
    }
}

/// One line of a buyer's cart. Prices are not supplied by the buyer; they are snapshotted from the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
    pub retip_added: bool,
}

impl CartLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity, retip_added: false }
    }

    pub fn with_retip(mut self) -> Self {
        self.retip_added = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub seller_id: i64,
    pub title: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub retip_added: bool,
    pub retip_price: Cents,
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub buyer_id: String,
    pub subtotal: Cents,
    pub retip_total: Cents,
    pub tax: Cents,
    pub platform_fee: Cents,
    pub shipping_cost: Cents,
    pub total_amount: Cents,
    pub payment_intent_id: Option<String>,
    pub payment_completed: bool,
    pub shipping_address: Json<Address>,
    pub tracking_number: Option<String>,
    pub carrier_shipment_id: Option<String>,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            retip_total: self.retip_total,
            tax: self.tax,
            platform_fee: self.platform_fee,
            shipping_cost: self.shipping_cost,
            total: self.total_amount,
        }
    }
}

/// A checkout request from a buyer.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: String,
    pub lines: Vec<CartLine>,
    pub shipping_address: Address,
    pub shipping_cost: Cents,
}

impl NewOrder {
    pub fn new<S: Into<String>>(buyer_id: S, shipping_address: Address) -> Self {
        Self { buyer_id: buyer_id.into(), lines: Vec::new(), shipping_address, shipping_cost: Cents::default() }
    }

    pub fn with_line(mut self, line: CartLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_shipping_cost(mut self, cost: Cents) -> Self {
        self.shipping_cost = cost;
        self
    }
}

/// A fully priced order, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewOrderRecord {
    pub buyer_id: String,
    pub totals: OrderTotals,
    pub shipping_address: Address,
    pub items: Vec<NewOrderItem>,
}

//--------------------------------------    ShipmentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Created,
    PickupScheduled,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    Returned,
    Cancelled,
}

status_strings!(ShipmentStatus, Pending, {
    Pending => "pending",
    Created => "created",
    PickupScheduled => "pickup_scheduled",
    Shipped => "shipped",
    InTransit => "in_transit",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Exception => "exception",
    Returned => "returned",
    Cancelled => "cancelled",
});

//--------------------------------------       Shipment       ---------------------------------------------------------
/// Carrier pickup booking. Either every field is known, or there is no pickup at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupDetails {
    pub request_number: String,
    pub date: NaiveDate,
    pub ready_time: NaiveTime,
    pub close_time: NaiveTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Shipment {
    pub id: i64,
    pub order_id: i64,
    pub seller_id: i64,
    pub carrier_shipment_id: String,
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub weight: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub shipper_address: Json<Address>,
    pub shipping_address: Json<Address>,
    pub pickup: Option<Json<PickupDetails>>,
    /// Set on return shipments, pointing at the outbound shipment being returned.
    pub original_shipment_id: Option<i64>,
    pub return_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn package(&self) -> Package {
        Package::new(self.weight, self.length, self.width, self.height)
    }

    pub fn pickup(&self) -> Option<&PickupDetails> {
        self.pickup.as_ref().map(|p| &p.0)
    }

    pub fn is_return(&self) -> bool {
        self.original_shipment_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewShipment {
    pub order_id: i64,
    pub seller_id: i64,
    pub carrier_shipment_id: String,
    pub tracking_number: String,
    pub package: Package,
    pub shipper_address: Address,
    pub shipping_address: Address,
    pub original_shipment_id: Option<i64>,
    pub return_reason: Option<String>,
}

//--------------------------------------        Refund        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    RequestedByCustomer,
    Duplicate,
    Fraudulent,
    ItemRejected,
    ItemCancelled,
    ItemReturned,
    Other,
}

status_strings!(RefundReason, Other, {
    RequestedByCustomer => "requested_by_customer",
    Duplicate => "duplicate",
    Fraudulent => "fraudulent",
    ItemRejected => "item_rejected",
    ItemCancelled => "item_cancelled",
    ItemReturned => "item_returned",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

status_strings!(RefundStatus, Pending, {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
    Canceled => "canceled",
});

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Refund {
    pub id: i64,
    pub order_item_id: i64,
    /// The payment processor's refund id. Unique.
    pub external_refund_id: String,
    pub amount: Cents,
    pub reason: RefundReason,
    pub status: RefundStatus,
    pub notes: Option<String>,
    pub processed_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub order_item_id: i64,
    pub external_refund_id: String,
    pub amount: Cents,
    pub reason: RefundReason,
    pub status: RefundStatus,
    pub notes: Option<String>,
}

//--------------------------------------        Payout        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Paid,
    Voided,
}

status_strings!(PayoutStatus, Paid, {
    Paid => "paid",
    Voided => "voided",
});

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payout {
    pub id: i64,
    pub order_item_id: i64,
    pub seller_id: i64,
    /// `unit_price * quantity` of the item
    pub gross_amount: Cents,
    pub commission_amount: Cents,
    pub processor_fee_amount: Cents,
    /// `gross_amount - commission_amount - processor_fee_amount`
    pub net_amount: Cents,
    pub external_transfer_id: String,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayout {
    pub order_item_id: i64,
    pub seller_id: i64,
    pub breakdown: PayoutBreakdown,
    pub external_transfer_id: String,
}

//--------------------------------------    LedgerEntry       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Refund,
    Payout,
}

status_strings!(TransactionKind, Refund, {
    Refund => "refund",
    Payout => "payout",
});

/// A money movement recorded against an order item.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub order_id: i64,
    pub order_item_id: i64,
    pub kind: TransactionKind,
    pub amount: Cents,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}
