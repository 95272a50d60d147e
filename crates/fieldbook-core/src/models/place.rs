//! Place, field and add-on models
//!
//! A place belongs to an owner and carries the owner's settlement balance.
//! Fields (the bookable resources) and add-ons hang off a place.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Owner-side venue holding a settlement balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Unique identifier
    pub id: i64,

    /// Owning user
    pub owner_id: i64,

    /// Display name
    pub name: String,

    /// Settled revenue not yet withdrawn; never negative
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Bookable resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    pub place_id: i64,
    pub name: String,
    pub price_per_hour: Decimal,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

/// Finite-stock consumable priced per hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: i64,
    pub place_id: i64,
    pub name: String,
    pub price_per_hour: Decimal,
    pub stock: i32,
}

impl AddOn {
    /// Check if the add-on can cover `quantity` units right now
    #[inline]
    pub fn has_stock(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }
}
