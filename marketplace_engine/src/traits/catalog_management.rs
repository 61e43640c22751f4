use std::collections::HashMap;

use marketplace_common::Rate;

use crate::{
    db_types::{Commission, NewListing, NewProduct, NewSeller, Product, ProductListing, Seller},
    traits::MarketplaceError,
};

/// Sellers, their products, and the platform's commission table.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_seller(&self, seller: NewSeller) -> Result<Seller, MarketplaceError>;

    async fn fetch_seller(&self, seller_id: i64) -> Result<Option<Seller>, MarketplaceError>;

    async fn insert_listing(&self, listing: NewListing) -> Result<ProductListing, MarketplaceError>;

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<ProductListing>, MarketplaceError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    /// Fetches the given products, keyed by id. Unknown ids are simply absent from the result.
    async fn fetch_products(&self, product_ids: &[i64]) -> Result<HashMap<i64, Product>, MarketplaceError>;

    /// Sets whether a product can be bought.
    async fn set_product_availability(
        &self,
        product_id: i64,
        is_active: bool,
        is_archived: bool,
    ) -> Result<Product, MarketplaceError>;

    /// Creates or replaces the commission rate for a category.
    async fn set_commission(&self, category: &str, rate: Rate) -> Result<Commission, MarketplaceError>;

    /// The commission rate for a category. Fails with [`MarketplaceError::CommissionNotFound`] if none is configured.
    async fn commission_rate(&self, category: &str) -> Result<Rate, MarketplaceError>;

    async fn fetch_commissions(&self) -> Result<Vec<Commission>, MarketplaceError>;
}
