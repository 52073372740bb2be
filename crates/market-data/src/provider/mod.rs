//! Price provider abstractions and implementations.
//!
//! This module contains:
//! - The `PriceProvider` trait that all providers implement
//! - Rate limiting configuration
//! - The data.gov.in mandi price provider

mod capabilities;
mod traits;

pub mod data_gov;

// Re-exports
pub use capabilities::RateLimit;
pub use traits::PriceProvider;
