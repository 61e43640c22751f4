mod marketplace_world;
mod setups;
mod steps;

pub use marketplace_world::MarketplaceWorld;
