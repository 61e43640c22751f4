use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    ItemRefundedEvent,
    ItemStatusChangedEvent,
    OrderPlacedEvent,
    SellerPaidEvent,
    ShipmentUpdatedEvent,
};

/// The publishing side of the hook system. The APIs hold one of these and publish to every producer in the relevant
/// list.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_placed_producer: Vec<EventProducer<OrderPlacedEvent>>,
    pub item_status_producer: Vec<EventProducer<ItemStatusChangedEvent>>,
    pub shipment_updated_producer: Vec<EventProducer<ShipmentUpdatedEvent>>,
    pub item_refunded_producer: Vec<EventProducer<ItemRefundedEvent>>,
    pub seller_paid_producer: Vec<EventProducer<SellerPaidEvent>>,
}

impl EventProducers {
    pub async fn publish_order_placed(&self, event: OrderPlacedEvent) {
        for emitter in &self.order_placed_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_item_status_changed(&self, event: ItemStatusChangedEvent) {
        for emitter in &self.item_status_producer {
            trace!("📬️ Notifying item status subscribers about item {}", event.item.id);
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_shipment_updated(&self, event: ShipmentUpdatedEvent) {
        for emitter in &self.shipment_updated_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_item_refunded(&self, event: ItemRefundedEvent) {
        for emitter in &self.item_refunded_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_seller_paid(&self, event: SellerPaidEvent) {
        for emitter in &self.seller_paid_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_placed: Option<EventHandler<OrderPlacedEvent>>,
    pub on_item_status_changed: Option<EventHandler<ItemStatusChangedEvent>>,
    pub on_shipment_updated: Option<EventHandler<ShipmentUpdatedEvent>>,
    pub on_item_refunded: Option<EventHandler<ItemRefundedEvent>>,
    pub on_seller_paid: Option<EventHandler<SellerPaidEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_placed: hooks.on_order_placed.map(|f| EventHandler::new(buffer_size, f)),
            on_item_status_changed: hooks.on_item_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_shipment_updated: hooks.on_shipment_updated.map(|f| EventHandler::new(buffer_size, f)),
            on_item_refunded: hooks.on_item_refunded.map(|f| EventHandler::new(buffer_size, f)),
            on_seller_paid: hooks.on_seller_paid.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_placed {
            result.order_placed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_item_status_changed {
            result.item_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_shipment_updated {
            result.shipment_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_item_refunded {
            result.item_refunded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_seller_paid {
            result.seller_paid_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for each registered handler. Each task ends once all producers for it are dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_placed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_item_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_shipment_updated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_item_refunded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_seller_paid {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_placed: Option<Handler<OrderPlacedEvent>>,
    pub on_item_status_changed: Option<Handler<ItemStatusChangedEvent>>,
    pub on_shipment_updated: Option<Handler<ShipmentUpdatedEvent>>,
    pub on_item_refunded: Option<Handler<ItemRefundedEvent>>,
    pub on_seller_paid: Option<Handler<SellerPaidEvent>>,
}

impl EventHooks {
    pub fn on_order_placed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPlacedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_placed = Some(Arc::new(f));
        self
    }

    pub fn on_item_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ItemStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_item_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_shipment_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ShipmentUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_shipment_updated = Some(Arc::new(f));
        self
    }

    pub fn on_item_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ItemRefundedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_item_refunded = Some(Arc::new(f));
        self
    }

    pub fn on_seller_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SellerPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_seller_paid = Some(Arc::new(f));
        self
    }
}
