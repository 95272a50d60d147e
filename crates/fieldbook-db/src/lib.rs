//! Fieldbook Database Layer
//!
//! This crate provides the storage backends behind the `Store` trait:
//!
//! - Connection pool management and embedded migrations with sqlx
//! - `PgStore`, the PostgreSQL implementation used in production
//! - `MemoryStore`, a transactional in-process store for tests and local runs

pub mod pool;
pub mod stores;

pub use pool::{create_pool, run_migrations};
pub use stores::{MemoryStore, PgStore};

// Re-export commonly used types
pub use fieldbook_core::{AppError, AppResult};
pub use sqlx::PgPool;
