//! Value types shared by the marketplace crates.
//!
//! * [`Cents`] is the money type. All amounts are whole cents; sub-cent precision only exists transiently inside
//!   [`Rate`] calculations and is rounded half-up before it is stored.
//! * [`Rate`] is a percentage expressed in basis points (1% = 100 bps).
//! * [`Secret`] keeps credentials out of log output.
mod cents;
pub mod helpers;
pub mod op;
mod rate;
mod secret;

pub use cents::{Cents, CentsConversionError};
pub use rate::{Rate, RateError, BPS_SCALE};
pub use secret::Secret;
