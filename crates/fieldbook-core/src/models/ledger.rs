//! Balance ledger, withdrawal and refund models
//!
//! Every balance change writes a [`BalanceTransaction`]; together they form an
//! immutable audit log from which a place's balance can be recomputed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Booking completed; booking total credited to the field's place
    SettlementCredit,
    /// Part of an owner withdrawal taken from this place
    WithdrawalDebit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::SettlementCredit => write!(f, "settlement_credit"),
            TransactionType::WithdrawalDebit => write!(f, "withdrawal_debit"),
        }
    }
}

impl TransactionType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "settlement_credit" => Some(TransactionType::SettlementCredit),
            "withdrawal_debit" => Some(TransactionType::WithdrawalDebit),
            _ => None,
        }
    }
}

/// Balance transaction entity
///
/// Immutable audit log of all balance changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceTransaction {
    /// Unique identifier
    pub id: i64,

    /// Place whose balance changed
    pub place_id: i64,

    /// Signed amount (positive credit, negative debit)
    pub amount: Decimal,

    /// Balance before transaction
    pub previous_balance: Decimal,

    /// Balance after transaction
    pub new_balance: Decimal,

    /// Type of transaction
    pub transaction_type: TransactionType,

    /// Settled booking (credits only)
    pub booking_id: Option<i64>,

    /// Withdrawal this debit belongs to (debits only)
    pub withdrawal_id: Option<i64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl BalanceTransaction {
    /// Settlement credit for `booking_id`
    pub fn settlement(
        place_id: i64,
        amount: Decimal,
        previous_balance: Decimal,
        booking_id: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            place_id,
            amount,
            previous_balance,
            new_balance: previous_balance + amount,
            transaction_type: TransactionType::SettlementCredit,
            booking_id: Some(booking_id),
            withdrawal_id: None,
            created_at: at,
        }
    }

    /// Withdrawal debit; `amount` is the positive sum taken
    pub fn withdrawal(
        place_id: i64,
        amount: Decimal,
        previous_balance: Decimal,
        withdrawal_id: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            place_id,
            amount: -amount,
            previous_balance,
            new_balance: previous_balance - amount,
            transaction_type: TransactionType::WithdrawalDebit,
            booking_id: None,
            withdrawal_id: Some(withdrawal_id),
            created_at: at,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

/// Owner payout record
///
/// Deleting one does not give the money back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub owner_id: i64,
    pub amount: Decimal,
    /// Transfer receipt or other proof supplied by the owner
    pub evidence_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub owner_id: i64,
    pub amount: Decimal,
    pub evidence_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Amount taken from one place by a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub place_id: i64,
    pub amount: Decimal,
}

/// Result of a successful withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub withdrawal: Withdrawal,
    pub deductions: Vec<Deduction>,
}

/// Balance of a single place inside an owner summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBalance {
    pub place_id: i64,
    pub name: String,
    pub balance: Decimal,
}

/// Owner-wide balance overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerBalanceSummary {
    pub owner_id: i64,
    pub total_balance: Decimal,
    pub places: Vec<PlaceBalance>,
    pub withdrawn_total: Decimal,
    pub withdrawal_count: i64,
    pub can_withdraw: bool,
}

/// Refund bookkeeping for a cancelled booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub booking_id: i64,
    pub amount: Decimal,
    pub evidence_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub booking_id: i64,
    pub amount: Decimal,
    pub evidence_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settlement_entry() {
        let tx = BalanceTransaction::settlement(1, dec!(200), dec!(50), 9, Utc::now());

        assert_eq!(tx.new_balance, dec!(250));
        assert_eq!(tx.booking_id, Some(9));
        assert!(tx.is_credit());
    }

    #[test]
    fn test_withdrawal_entry_is_negative() {
        let tx = BalanceTransaction::withdrawal(2, dec!(50), dec!(80), 4, Utc::now());

        assert_eq!(tx.amount, dec!(-50));
        assert_eq!(tx.new_balance, dec!(30));
        assert_eq!(tx.transaction_type, TransactionType::WithdrawalDebit);
        assert!(tx.is_debit());
    }

    #[test]
    fn test_transaction_type_round_trips_through_text() {
        for t in [TransactionType::SettlementCredit, TransactionType::WithdrawalDebit] {
            assert_eq!(TransactionType::from_str(&t.to_string()), Some(t));
        }
    }
}
