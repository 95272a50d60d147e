//! Balance ledger
//!
//! Owner revenue lives on their places. Settlement credits a single place;
//! a withdrawal drains the owner's places greedily in ascending id order and
//! either takes the whole amount or nothing.

use fieldbook_core::{
    models::{
        Deduction, NewWithdrawal, OwnerBalanceSummary, Place, PlaceBalance, WithdrawalReceipt,
    },
    AppError, AppResult, Clock, Store,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::constants::MAX_REFERENCE_LENGTH;

/// Split `amount` across `places`, lowest id first
///
/// Fails with `InsufficientBalance` when the places hold less than `amount`
/// in total. Places that end up untouched get no deduction.
pub fn plan_deductions(places: &[Place], amount: Decimal) -> AppResult<Vec<Deduction>> {
    let available: Decimal = places.iter().map(|p| p.balance).sum();
    if available < amount {
        return Err(AppError::InsufficientBalance {
            required: amount.to_string(),
            available: available.to_string(),
        });
    }

    let mut ordered: Vec<&Place> = places.iter().collect();
    ordered.sort_by_key(|p| p.id);

    let mut remaining = amount;
    let mut plan = Vec::new();
    for place in ordered {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = place.balance.min(remaining);
        if take > Decimal::ZERO {
            plan.push(Deduction {
                place_id: place.id,
                amount: take,
            });
            remaining -= take;
        }
    }

    Ok(plan)
}

pub struct BalanceLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Withdraw `amount` from an owner's places
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount
    /// - `OwnerHasNoResources` if the owner has no places
    /// - `InsufficientBalance` if the places hold less than `amount`; nothing is debited
    #[instrument(skip(self, evidence_ref))]
    pub async fn request_withdrawal(
        &self,
        owner_id: i64,
        amount: Decimal,
        evidence_ref: Option<String>,
    ) -> AppResult<WithdrawalReceipt> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Withdrawal amount must be positive".to_string(),
            ));
        }
        if evidence_ref
            .as_ref()
            .is_some_and(|r| r.len() > MAX_REFERENCE_LENGTH)
        {
            return Err(AppError::Validation("Evidence reference is too long".to_string()));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let places = tx.lock_owner_places(owner_id).await?;
        if places.is_empty() {
            return Err(AppError::OwnerHasNoResources(owner_id));
        }

        let plan = plan_deductions(&places, amount).map_err(|e| {
            warn!(owner_id, %amount, "Withdrawal exceeds owner balance");
            e
        })?;

        let withdrawal = tx
            .insert_withdrawal(&NewWithdrawal {
                owner_id,
                amount,
                evidence_ref,
                created_at: now,
            })
            .await?;

        for deduction in &plan {
            let entry = tx
                .debit_place(deduction.place_id, deduction.amount, withdrawal.id, now)
                .await?;

            if entry.is_none() {
                // balance changed under the lock; give up the whole withdrawal
                let available: Decimal = places.iter().map(|p| p.balance).sum();
                return Err(AppError::InsufficientBalance {
                    required: amount.to_string(),
                    available: available.to_string(),
                });
            }
        }

        tx.commit().await?;

        info!(
            owner_id,
            withdrawal_id = withdrawal.id,
            %amount,
            places = plan.len(),
            "Withdrawal completed"
        );

        Ok(WithdrawalReceipt {
            withdrawal,
            deductions: plan,
        })
    }

    /// Delete a withdrawal record
    ///
    /// Balances are not restored; withdrawals are final.
    #[instrument(skip(self))]
    pub async fn delete_withdrawal(&self, withdrawal_id: i64) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        if !tx.delete_withdrawal(withdrawal_id).await? {
            return Err(AppError::WithdrawalNotFound(withdrawal_id));
        }

        tx.commit().await?;
        info!(withdrawal_id, "Withdrawal record deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn owner_summary(&self, owner_id: i64) -> AppResult<OwnerBalanceSummary> {
        let mut tx = self.store.begin().await?;

        let places = tx.list_owner_places(owner_id).await?;
        if places.is_empty() {
            return Err(AppError::OwnerHasNoResources(owner_id));
        }
        let (withdrawn_total, withdrawal_count) = tx.owner_withdrawal_totals(owner_id).await?;

        let total_balance: Decimal = places.iter().map(|p| p.balance).sum();

        Ok(OwnerBalanceSummary {
            owner_id,
            total_balance,
            places: places
                .into_iter()
                .map(|p| PlaceBalance {
                    place_id: p.id,
                    name: p.name,
                    balance: p.balance,
                })
                .collect(),
            withdrawn_total,
            withdrawal_count,
            can_withdraw: total_balance > Decimal::ZERO,
        })
    }
}
