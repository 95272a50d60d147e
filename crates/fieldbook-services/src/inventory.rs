//! Add-on inventory ledger
//!
//! Stock only changes through these two primitives. `reserve` is a
//! conditional decrement; losing the race against another reservation shows
//! up as "no row updated" and is reported as `InsufficientStock`.

use fieldbook_core::{models::LineItem, AppError, AppResult, StoreTx};
use tracing::{debug, warn};

pub struct InventoryLedger;

impl InventoryLedger {
    /// Take `quantity` units of an add-on; returns the remaining stock
    pub async fn reserve(tx: &mut dyn StoreTx, add_on_id: i64, quantity: i32) -> AppResult<i32> {
        if quantity <= 0 {
            return Err(AppError::Validation(format!(
                "Quantity for add-on {} must be positive",
                add_on_id
            )));
        }

        match tx.reserve_stock(add_on_id, quantity).await? {
            Some(remaining) => {
                debug!(add_on_id, quantity, remaining, "Stock reserved");
                Ok(remaining)
            }
            None => {
                let available = tx
                    .find_add_on(add_on_id)
                    .await?
                    .ok_or(AppError::AddOnNotFound(add_on_id))?
                    .stock;

                warn!(add_on_id, quantity, available, "Insufficient stock");
                Err(AppError::InsufficientStock {
                    add_on_id,
                    requested: quantity,
                    available,
                })
            }
        }
    }

    /// Give `quantity` units back; returns the new stock
    pub async fn restore(tx: &mut dyn StoreTx, add_on_id: i64, quantity: i32) -> AppResult<i32> {
        let stock = tx
            .restore_stock(add_on_id, quantity)
            .await?
            .ok_or(AppError::AddOnNotFound(add_on_id))?;

        debug!(add_on_id, quantity, stock, "Stock restored");
        Ok(stock)
    }

    /// Restore every line item of a booking
    pub async fn restore_line_items(tx: &mut dyn StoreTx, items: &[LineItem]) -> AppResult<()> {
        for item in items {
            Self::restore(tx, item.add_on_id, item.quantity).await?;
        }
        Ok(())
    }
}
