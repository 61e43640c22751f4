//! Status transition rules for order items and shipments.
//!
//! Every status change in the engine is checked here first, so the legality rules live in one place rather than
//! being repeated as ad-hoc comparisons at each call site.
//!
//! Order items move along a fulfilment track:
//!
//! ```text
//! pending_approval -> approved -> processing -> shipped -> in_transit -> out_for_delivery -> delivered -> returned
//!        \                 \                \________________________________/
//!         -> rejected       -> cancelled                  |
//!                                                     exception
//! ```
//!
//! Any item that is not already refunded may be refunded. Rejected, cancelled and returned items accept no further
//! fulfilment transitions.
use crate::{
    db_types::{OrderItemStatus, ShipmentStatus},
    traits::MarketplaceError,
};

impl OrderItemStatus {
    /// True for statuses that accept no further fulfilment transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Refunded | Self::Returned)
    }

    /// Position along the carrier-driven track. `None` for statuses off the track.
    fn track_rank(&self) -> Option<u8> {
        match self {
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::InTransit => Some(3),
            Self::OutForDelivery => Some(4),
            Self::Delivered => Some(5),
            _ => None,
        }
    }

    /// Statuses an item can have while its shipment can still be voided.
    pub fn is_pre_transit(&self) -> bool {
        matches!(self, Self::Processing | Self::Shipped | Self::Exception)
    }

    /// Statuses at which the goods have left the seller, so the seller can be paid.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Shipped | Self::InTransit | Self::OutForDelivery | Self::Delivered)
    }

    pub fn can_transition_to(&self, next: OrderItemStatus) -> bool {
        use OrderItemStatus::*;
        match (*self, next) {
            (Refunded, _) => false,
            (_, Refunded) => true,
            (PendingApproval, Approved | Rejected) => true,
            (Approved, Processing | Cancelled) => true,
            // voiding a shipment hands the item back to the seller
            (Processing | Shipped | Exception, Approved) => true,
            (Delivered, Returned) => true,
            (Processing | Shipped | InTransit | OutForDelivery, Exception) => true,
            (Exception, Shipped | InTransit | OutForDelivery | Delivered) => true,
            (from, to) => match (from.track_rank(), to.track_rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }

    /// Validates the move from `self` to `next`, returning `next` if it is legal.
    pub fn transition(self, next: OrderItemStatus) -> Result<OrderItemStatus, MarketplaceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MarketplaceError::IllegalTransition { from: self, to: next })
        }
    }
}

impl ShipmentStatus {
    fn track_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Created => Some(1),
            Self::PickupScheduled => Some(2),
            Self::Shipped => Some(3),
            Self::InTransit => Some(4),
            Self::OutForDelivery => Some(5),
            Self::Delivered => Some(6),
            _ => None,
        }
    }

    /// Delivered, returned and cancelled shipments ignore further carrier events.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned | Self::Cancelled)
    }

    /// A label can be voided until the parcel is moving through the carrier network.
    pub fn is_voidable(&self) -> bool {
        matches!(self, Self::Pending | Self::Created | Self::PickupScheduled | Self::Shipped | Self::Exception)
    }

    /// Whether a carrier-reported status should replace the stored one. Only forward moves are applied, so duplicate
    /// or out-of-order events are dropped.
    pub fn accepts_tracking_update(&self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        if self.is_final() || *self == next {
            return false;
        }
        match (*self, next) {
            (_, Pending | Returned | Cancelled) => false,
            (_, Exception) => true,
            (Exception, n) => n.track_rank() >= Shipped.track_rank(),
            (cur, n) => match (cur.track_rank(), n.track_rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }

    /// The order item status that mirrors this shipment status.
    pub fn item_status(&self) -> Option<OrderItemStatus> {
        match self {
            Self::Pending | Self::Created | Self::PickupScheduled => Some(OrderItemStatus::Processing),
            Self::Shipped => Some(OrderItemStatus::Shipped),
            Self::InTransit => Some(OrderItemStatus::InTransit),
            Self::OutForDelivery => Some(OrderItemStatus::OutForDelivery),
            Self::Delivered => Some(OrderItemStatus::Delivered),
            Self::Exception => Some(OrderItemStatus::Exception),
            Self::Returned => Some(OrderItemStatus::Returned),
            Self::Cancelled => None,
        }
    }
}
