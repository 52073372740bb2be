//! SQLite storage implementation for daily market prices.

mod model;
mod repository;

pub use model::DailyMarketPriceDB;
pub use repository::PriceRepository;

// Re-export trait from core for convenience
pub use mandi_core::prices::PriceStore;
