//! Store implementations
//!
//! Concrete implementations of the `Store`/`StoreTx` traits defined in
//! fieldbook-core.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
