//! Mandi Core - Domain entities, services, and traits.
//!
//! This crate contains the price caching and query logic. It is
//! database-agnostic and defines the `PriceStore` trait that is implemented
//! by the `storage-sqlite` crate.

pub mod errors;
pub mod prices;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
