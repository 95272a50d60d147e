//! Settlement sweeper
//!
//! Finds approved bookings whose interval is over and completes each one
//! through the state machine. Every booking settles in its own transaction
//! with a conditional status write, so a booking completed by an overlapping
//! sweep or by hand is skipped instead of credited twice. A failing booking is
//! logged and left for the next tick; the rest of the batch still runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldbook_core::{AppResult, BookingConfig, Store};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::scheduler::RecurringTask;
use crate::state_machine::BookingStateMachine;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired approved bookings seen
    pub found: usize,
    /// Moved to completed by this sweep
    pub completed: usize,
    /// Already moved on by someone else
    pub skipped: usize,
    /// Errored; retried next tick
    pub failed: usize,
}

pub struct SettlementSweeper {
    store: Arc<dyn Store>,
    state_machine: Arc<BookingStateMachine>,
    interval: Duration,
    batch_size: i64,
}

impl SettlementSweeper {
    pub fn new(
        store: Arc<dyn Store>,
        state_machine: Arc<BookingStateMachine>,
        config: &BookingConfig,
    ) -> Self {
        Self {
            store,
            state_machine,
            interval: Duration::from_secs(config.sweep_interval_secs),
            batch_size: config.sweep_batch_size.max(1),
        }
    }

    /// Complete every approved booking with `end_time < now`
    #[instrument(skip(self))]
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let expired = {
            let mut tx = self.store.begin().await?;
            tx.list_settleable(now, self.batch_size).await?
        };

        let mut report = SweepReport {
            found: expired.len(),
            ..Default::default()
        };

        if expired.is_empty() {
            debug!("No expired bookings");
            return Ok(report);
        }

        for booking in &expired {
            match self.state_machine.settle(booking.id, now).await {
                Ok(Some(_)) => report.completed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        booking_id = booking.id,
                        transient = e.is_transient(),
                        error = %e,
                        "Failed to settle booking"
                    );
                }
            }
        }

        info!(
            found = report.found,
            completed = report.completed,
            skipped = report.skipped,
            failed = report.failed,
            "Settlement sweep finished"
        );

        Ok(report)
    }
}

#[async_trait]
impl RecurringTask for SettlementSweeper {
    fn name(&self) -> &'static str {
        "settlement_sweep"
    }

    fn period(&self) -> Duration {
        self.interval
    }

    async fn run(&self, now: DateTime<Utc>) -> AppResult<()> {
        self.run_sweep(now).await.map(|_| ())
    }
}
