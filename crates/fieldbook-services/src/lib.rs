//! Business logic services for Fieldbook
//!
//! This crate contains the reservation and settlement engine: availability
//! checks, atomic reservation of a time slot plus add-on stock, the booking
//! state machine, the balance ledger and the background settlement sweep.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service receives its storage, clock and notifier explicitly
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - Every operation runs inside one `StoreTx` and commits or rolls back as a unit
//! - All operations are instrumented with tracing
//!
//! # Services
//!
//! - `AvailabilityChecker` - Half-open interval conflict detection
//! - `ReservationCoordinator` - Booking creation and booking lookups
//! - `BookingStateMachine` - Status transitions and their side effects
//! - `InventoryLedger` - Conditional add-on stock reserve/restore
//! - `BalanceLedger` - Settlement credits, withdrawals and balance summaries
//! - `SettlementSweeper` - Recurring completion of expired bookings
//! - `UpcomingBookingsMonitor` - Recurring look-ahead of bookings about to start
//! - `RefundService` - Refund bookkeeping for cancelled bookings
//! - `Scheduler` - Drives the recurring tasks

pub mod availability;
pub mod balance;
pub mod coordinator;
pub mod inventory;
pub mod notifier;
pub mod pricing;
pub mod refund;
pub mod scheduler;
pub mod state_machine;
pub mod sweeper;
pub mod upcoming;

pub use availability::AvailabilityChecker;
pub use balance::BalanceLedger;
pub use coordinator::ReservationCoordinator;
pub use inventory::InventoryLedger;
pub use notifier::TracingNotifier;
pub use refund::RefundService;
pub use scheduler::{RecurringTask, Scheduler, SchedulerHandle};
pub use state_machine::BookingStateMachine;
pub use sweeper::{SettlementSweeper, SweepReport};
pub use upcoming::UpcomingBookingsMonitor;

use fieldbook_core::{BookingConfig, Clock, Notifier, Store};
use std::sync::Arc;

/// Business logic constants
pub mod constants {
    /// Prefix of every booking order id
    pub const ORDER_ID_PREFIX: &str = "BOOKING";

    /// Length of the random suffix of an order id
    pub const ORDER_ID_SUFFIX_LEN: usize = 8;

    /// Maximum number of distinct add-ons on one booking
    pub const MAX_LINE_ITEMS: usize = 20;

    /// Maximum length of a payment token or evidence reference
    pub const MAX_REFERENCE_LENGTH: usize = 255;
}

/// Every service wired against the same store, clock and notifier
#[derive(Clone)]
pub struct Services {
    pub availability: Arc<AvailabilityChecker>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub state_machine: Arc<BookingStateMachine>,
    pub balance: Arc<BalanceLedger>,
    pub sweeper: Arc<SettlementSweeper>,
    pub upcoming: Arc<UpcomingBookingsMonitor>,
    pub refunds: Arc<RefundService>,
    clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: BookingConfig,
    ) -> Self {
        let availability = Arc::new(AvailabilityChecker::new(store.clone()));
        let coordinator = Arc::new(ReservationCoordinator::new(
            store.clone(),
            clock.clone(),
            notifier.clone(),
            config.clone(),
        ));
        let state_machine = Arc::new(BookingStateMachine::new(
            store.clone(),
            clock.clone(),
            notifier,
            config.max_note_length,
        ));
        let balance = Arc::new(BalanceLedger::new(store.clone(), clock.clone()));
        let sweeper = Arc::new(SettlementSweeper::new(
            store.clone(),
            state_machine.clone(),
            &config,
        ));
        let upcoming = Arc::new(UpcomingBookingsMonitor::new(store.clone(), &config));
        let refunds = Arc::new(RefundService::new(store, clock.clone()));

        Self {
            availability,
            coordinator,
            state_machine,
            balance,
            sweeper,
            upcoming,
            refunds,
            clock,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Scheduler with the settlement sweep and the upcoming bookings check
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.clock.clone())
            .with_task(self.sweeper.clone())
            .with_task(self.upcoming.clone())
    }
}
