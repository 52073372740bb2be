//! SQLite storage implementation for the mandi price service.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the `PriceStore` trait defined in `mandi-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The price repository and its database model
//!
//! # Architecture
//!
//! This crate is the only place in the application where Diesel dependencies exist.
//!
//! ```text
//!        core (domain)
//!              │
//!              ▼
//!   storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod prices;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use prices::PriceRepository;

// Re-export from mandi-core for convenience
pub use mandi_core::errors::{DatabaseError, Error, Result};
