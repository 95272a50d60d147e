//! Domain models for Fieldbook
//!
//! This module contains all the core domain models used throughout the application.

pub mod booking;
pub mod ledger;
pub mod place;

pub use booking::{
    Booking, BookingDetails, BookingEvent, BookingNotice, BookingPatch, BookingStatus, Interval,
    LineItem, LineItemRequest, NewBooking, NewLineItem, ReservationRequest, TransitionEffects,
};
pub use ledger::{
    BalanceTransaction, Deduction, NewRefund, NewWithdrawal, OwnerBalanceSummary, PlaceBalance,
    Refund, TransactionType, Withdrawal, WithdrawalReceipt,
};
pub use place::{AddOn, Field, Place};
