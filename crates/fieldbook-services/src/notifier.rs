//! Notifier that writes booking notices to the log

use async_trait::async_trait;
use fieldbook_core::{models::BookingNotice, AppResult, Notifier};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: &BookingNotice) -> AppResult<()> {
        info!(
            booking_id = notice.booking_id,
            order_id = %notice.order_id,
            renter_id = notice.renter_id,
            from = ?notice.from,
            to = %notice.to,
            "Booking notice"
        );
        Ok(())
    }
}
