//! Upcoming bookings monitor
//!
//! Hourly look-ahead over approved bookings that start soon. Read-only; it
//! only reports what it finds.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fieldbook_core::{AppResult, BookingConfig, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::scheduler::RecurringTask;

pub struct UpcomingBookingsMonitor {
    store: Arc<dyn Store>,
    interval: Duration,
    window: ChronoDuration,
}

impl UpcomingBookingsMonitor {
    pub fn new(store: Arc<dyn Store>, config: &BookingConfig) -> Self {
        Self {
            store,
            interval: Duration::from_secs(config.upcoming_check_interval_secs),
            window: ChronoDuration::minutes(config.upcoming_window_minutes),
        }
    }

    /// Count approved bookings starting within `[now, now + window]`
    #[instrument(skip(self))]
    pub async fn run_check(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut tx = self.store.begin().await?;
        let upcoming = tx.list_upcoming(now, now + self.window).await?;

        for booking in &upcoming {
            debug!(
                booking_id = booking.id,
                field_id = booking.field_id,
                start = %booking.start_time,
                "Booking starts soon"
            );
        }

        info!(
            count = upcoming.len(),
            window_minutes = self.window.num_minutes(),
            "Upcoming bookings checked"
        );

        Ok(upcoming.len())
    }
}

#[async_trait]
impl RecurringTask for UpcomingBookingsMonitor {
    fn name(&self) -> &'static str {
        "upcoming_bookings"
    }

    fn period(&self) -> Duration {
        self.interval
    }

    async fn run(&self, now: DateTime<Utc>) -> AppResult<()> {
        self.run_check(now).await.map(|_| ())
    }
}
