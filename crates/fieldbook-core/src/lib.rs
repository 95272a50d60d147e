//! Fieldbook Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Fieldbook reservation and settlement engine. It includes:
//!
//! - Domain models (Booking, Field, AddOn, Place, ledger entries)
//! - Storage and notification traits implemented by the other crates
//! - Unified error handling with HTTP response mapping
//! - Application configuration and the injectable clock

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, BookingConfig};
pub use error::{AppError, ErrorKind};
pub use traits::{Notifier, Store, StoreTx};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
