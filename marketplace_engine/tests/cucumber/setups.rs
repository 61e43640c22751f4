use cucumber::given;
use marketplace_common::{Cents, Rate};
use marketplace_engine::{
    db_types::{NewProduct, Package},
    traits::CatalogManagement,
};

use crate::{cucumber::MarketplaceWorld, support::Marketplace};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketplaceWorld) {
    world.system = Some(Marketplace::new().await);
}

#[given(expr = "a seller '{word}'")]
async fn a_seller(world: &mut MarketplaceWorld, name: String) {
    let seller = world.mkt().seller(&name).await;
    world.sellers.insert(name, seller);
}

#[given(expr = "a commission of {int} bps on '{word}'")]
async fn a_commission(world: &mut MarketplaceWorld, bps: i64, category: String) {
    let rate = Rate::from_bps(bps).expect("Invalid commission rate");
    world.mkt().db.set_commission(&category, rate).await.expect("Error setting commission");
}

#[given(expr = "a product '{word}' in '{word}' from '{word}' at {int} cents with {int} in stock")]
async fn a_product(
    world: &mut MarketplaceWorld,
    name: String,
    category: String,
    seller: String,
    price: i64,
    stock: i64,
) {
    add_product(world, name, category, seller, price, stock, None).await;
}

#[given(expr = "a product '{word}' in '{word}' from '{word}' at {int} cents with {int} in stock, retip {int} cents")]
async fn a_retip_product(
    world: &mut MarketplaceWorld,
    name: String,
    category: String,
    seller: String,
    price: i64,
    stock: i64,
    retip: i64,
) {
    add_product(world, name, category, seller, price, stock, Some(retip)).await;
}

async fn add_product(
    world: &mut MarketplaceWorld,
    name: String,
    category: String,
    seller: String,
    price: i64,
    stock: i64,
    retip: Option<i64>,
) {
    let seller_id = world.seller(&seller).id;
    let mut product = NewProduct::new(seller_id, name.clone(), category, Cents::from(price), stock)
        .with_package(Package::new(4.0, 70.0, 8.0, 4.0));
    if let Some(retip) = retip {
        product = product.with_retipping(Cents::from(retip));
    }
    let product = world.mkt().db.insert_product(product).await.expect("Error creating product");
    world.products.insert(name, product);
}
