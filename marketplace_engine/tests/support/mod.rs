#![allow(dead_code)]
use std::time::Duration;

use marketplace_common::{Cents, Rate};
use marketplace_engine::{
    config::EngineConfig,
    db_types::{
        Address,
        CartLine,
        NewListing,
        NewOrder,
        NewProduct,
        NewSeller,
        Package,
        Product,
        ProductListing,
        Seller,
    },
    events::EventProducers,
    test_utils::{
        mocks::{MockCarrier, MockPaymentProcessor},
        prepare_env::{prepare_test_env, random_db_path, tear_down},
    },
    traits::{CatalogManagement, PaymentIntentStatus, PlacedOrder},
    CheckoutApi,
    OrderFlowApi,
    PayoutApi,
    RefundApi,
    ShipmentApi,
    SqliteDatabase,
};

pub type Db = SqliteDatabase;

/// A migrated database with every API wired to the same mock collaborators.
pub struct Marketplace {
    pub db: Db,
    pub processor: MockPaymentProcessor,
    pub carrier: MockCarrier,
    pub checkout: CheckoutApi<Db, MockPaymentProcessor>,
    pub flow: OrderFlowApi<Db>,
    pub shipping: ShipmentApi<Db, MockCarrier>,
    pub refunds: RefundApi<Db, MockPaymentProcessor>,
    pub payouts: PayoutApi<Db, MockPaymentProcessor>,
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        carrier_timeout: Duration::from_millis(500),
        processor_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    }
}

impl Marketplace {
    pub async fn new() -> Self {
        Self::with_config(test_config(), EventProducers::default()).await
    }

    pub async fn with_config(config: EngineConfig, producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let processor = MockPaymentProcessor::new();
        let carrier = MockCarrier::new();
        let checkout = CheckoutApi::new(db.clone(), processor.clone(), config.clone(), producers.clone());
        let flow = OrderFlowApi::new(db.clone(), producers.clone());
        let shipping = ShipmentApi::new(db.clone(), carrier.clone(), &config, producers.clone());
        let refunds = RefundApi::new(db.clone(), processor.clone(), config.processor_timeout, producers.clone());
        let payouts = PayoutApi::new(db.clone(), processor.clone(), &config, producers);
        db.set_commission("skis", Rate::from_percent(5).unwrap()).await.unwrap();
        db.set_commission("poles", Rate::from_bps(750).unwrap()).await.unwrap();
        Self { db, processor, carrier, checkout, flow, shipping, refunds, payouts }
    }

    pub async fn tear_down(self) {
        tear_down(self.db).await;
    }

    pub async fn seller(&self, name: &str) -> Seller {
        let seller = NewSeller::new(name, address(name, "80401")).with_payout_account(format!("acct_{name}"));
        self.db.insert_seller(seller).await.unwrap()
    }

    pub async fn seller_without_account(&self, name: &str) -> Seller {
        self.db.insert_seller(NewSeller::new(name, address(name, "80401"))).await.unwrap()
    }

    pub async fn listing(&self, seller: &Seller, stock: i64) -> ProductListing {
        let listing = NewListing { seller_id: seller.id, title: format!("{} listing", seller.name), stock };
        self.db.insert_listing(listing).await.unwrap()
    }

    pub async fn product(&self, seller: &Seller, category: &str, price: i64, quantity: i64) -> Product {
        let product = NewProduct::new(seller.id, "Race ski", category, Cents::from(price), quantity)
            .with_package(Package::new(4.0, 70.0, 8.0, 4.0));
        self.db.insert_product(product).await.unwrap()
    }

    pub async fn listed_product(&self, seller: &Seller, listing: &ProductListing, quantity: i64) -> Product {
        let product = NewProduct::new(seller.id, "Touring ski", "skis", Cents::from(50_000), quantity)
            .in_listing(listing.id)
            .with_package(Package::new(5.0, 75.0, 9.0, 4.0));
        self.db.insert_product(product).await.unwrap()
    }

    /// Places an order for the cart and confirms a matching payment for it.
    pub async fn paid_order(&self, lines: &[CartLine]) -> PlacedOrder {
        let placed = self.unpaid_order(lines).await;
        let intent = format!("pi_{}", placed.order.id);
        self.processor.add_intent(&intent, placed.order.total_amount, PaymentIntentStatus::Succeeded);
        self.checkout.confirm_payment(placed.order.id, &intent).await.unwrap()
    }

    pub async fn unpaid_order(&self, lines: &[CartLine]) -> PlacedOrder {
        let order = lines.iter().fold(NewOrder::new("buyer-1", address("Buyer", "10001")), |o, l| o.with_line(*l));
        self.checkout.place_order(order).await.unwrap()
    }
}

pub fn address(name: &str, postal_code: &str) -> Address {
    Address {
        name: name.to_string(),
        line1: "1 Main St".to_string(),
        city: "Golden".to_string(),
        state: "CO".to_string(),
        postal_code: postal_code.to_string(),
        country: "US".to_string(),
        phone: "555-0100".to_string(),
    }
}
