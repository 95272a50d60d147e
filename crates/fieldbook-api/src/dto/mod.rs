//! Data Transfer Objects (DTOs) for API requests and responses

pub mod balance;
pub mod booking;
pub mod common;

pub use balance::*;
pub use booking::*;
pub use common::*;
