//! Withdrawal, balance and refund DTOs

use chrono::{DateTime, Utc};
use fieldbook_core::models::{Deduction, Refund, WithdrawalReceipt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::BusinessRules;

/// Owner withdrawal request
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct WithdrawalRequest {
    #[validate(range(min = 1))]
    pub owner_id: i64,

    pub amount: Decimal,

    /// Bank transfer reference or receipt id
    #[validate(length(max = 255))]
    pub evidence_ref: Option<String>,
}

impl BusinessRules for WithdrawalRequest {
    fn validate_business_rules(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err("amount must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub id: i64,
    pub owner_id: i64,
    pub amount: Decimal,
    pub evidence_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deductions: Vec<Deduction>,
}

impl From<WithdrawalReceipt> for WithdrawalResponse {
    fn from(receipt: WithdrawalReceipt) -> Self {
        Self {
            id: receipt.withdrawal.id,
            owner_id: receipt.withdrawal.owner_id,
            amount: receipt.withdrawal.amount,
            evidence_ref: receipt.withdrawal.evidence_ref,
            created_at: receipt.withdrawal.created_at,
            deductions: receipt.deductions,
        }
    }
}

/// Refund bookkeeping for a cancelled booking
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RefundRequest {
    #[validate(range(min = 1))]
    pub booking_id: i64,

    pub amount: Decimal,

    #[validate(length(max = 255))]
    pub evidence_ref: Option<String>,
}

impl BusinessRules for RefundRequest {
    fn validate_business_rules(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err("amount must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub id: i64,
    pub booking_id: i64,
    pub amount: Decimal,
    pub evidence_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Refund> for RefundResponse {
    fn from(refund: Refund) -> Self {
        Self {
            id: refund.id,
            booking_id: refund.booking_id,
            amount: refund.amount,
            evidence_ref: refund.evidence_ref,
            created_at: refund.created_at,
        }
    }
}
