//! Persistence for message definitions.
//!
//! This crate provides:
//! - `MessageStore` trait: snapshot reads plus CRUD by identifier
//! - `PgMessageStore`: PostgreSQL implementation (sqlx, embedded migrations)
//! - `MemoryStore`: in-process implementation for tests and database-less runs

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgMessageStore;
pub use traits::{MessageStore, StoredMessage};
