use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use marketplace_engine::{
    db_types::{Product, Seller},
    traits::MarketplaceError,
};

use crate::support::Marketplace;

#[derive(Default, World)]
pub struct MarketplaceWorld {
    pub system: Option<Marketplace>,
    pub sellers: HashMap<String, Seller>,
    pub products: HashMap<String, Product>,
    pub order_id: Option<i64>,
    pub item_id: Option<i64>,
    pub shipment_id: Option<i64>,
    /// The outcome of the last `When` step that can fail
    pub last_error: Option<MarketplaceError>,
}

impl Debug for MarketplaceWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceWorld")
            .field("sellers", &self.sellers.keys())
            .field("products", &self.products.keys())
            .field("order_id", &self.order_id)
            .field("item_id", &self.item_id)
            .field("shipment_id", &self.shipment_id)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl MarketplaceWorld {
    pub fn mkt(&self) -> &Marketplace {
        self.system.as_ref().expect("Marketplace not initialised. Start the scenario with 'Given a fresh install'")
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("No product called {name}"))
    }

    pub fn seller(&self, name: &str) -> &Seller {
        self.sellers.get(name).unwrap_or_else(|| panic!("No seller called {name}"))
    }

    pub fn order_id(&self) -> i64 {
        self.order_id.expect("No order has been placed")
    }

    pub fn item_id(&self) -> i64 {
        self.item_id.expect("No order has been placed")
    }

    pub fn shipment_id(&self) -> i64 {
        self.shipment_id.expect("Nothing has been shipped")
    }

    /// Records the outcome of a fallible step so a later `Then` can check it.
    pub fn record<T>(&mut self, result: Result<T, MarketplaceError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                self.last_error = Some(e);
                None
            },
        }
    }
}
