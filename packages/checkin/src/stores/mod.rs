//! Storage backends.
//!
//! - `MemoryStore` - in-memory (always available)
//! - `PostgresStore` - PostgreSQL (requires the `postgres` feature)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
